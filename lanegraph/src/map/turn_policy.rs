use serde::{Deserialize, Serialize};

/// Decides which departing lanes an arriving lane gets connected to
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPolicy {
    /// Connect lanes back into the road they came from
    pub back_turns: bool,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self { back_turns: false }
    }
}

impl TurnPolicy {
    fn zip(incoming: &[usize], outgoing: &[usize]) -> Vec<(usize, usize)> {
        incoming
            .iter()
            .copied()
            .zip(outgoing.iter().copied())
            .collect()
    }

    fn all(incoming: &[usize], outgoing: &[usize]) -> Vec<(usize, usize)> {
        incoming
            .iter()
            .flat_map(|&src| outgoing.iter().map(move |&dst| (src, dst)))
            .collect()
    }

    /// Lane i goes to lane i when both sides have as many lanes, otherwise every pair is connected
    pub fn zip_on_same_length(incoming: &[usize], outgoing: &[usize]) -> Vec<(usize, usize)> {
        if incoming.len() == outgoing.len() {
            Self::zip(incoming, outgoing)
        } else {
            Self::all(incoming, outgoing)
        }
    }

    /// Departing lanes reached by the arriving lane of rank `rank` out of `n_incoming`
    pub fn targets(rank: usize, n_incoming: usize, outgoing: &[usize]) -> Vec<usize> {
        let incoming: Vec<usize> = (0..n_incoming).collect();
        Self::zip_on_same_length(&incoming, outgoing)
            .into_iter()
            .filter(|&(src, _)| src == rank)
            .map(|(_, dst)| dst)
            .collect()
    }

    pub fn allows(self, from_slot: usize, to_slot: usize) -> bool {
        from_slot != to_slot || self.back_turns
    }
}

#[cfg(test)]
mod tests {
    use super::TurnPolicy;

    #[test]
    fn same_length_zips() {
        assert_eq!(TurnPolicy::targets(1, 2, &[5, 6]), vec![6]);
        assert_eq!(TurnPolicy::targets(0, 2, &[5, 6]), vec![5]);
    }

    #[test]
    fn different_length_fans_out() {
        assert_eq!(TurnPolicy::targets(0, 1, &[3, 4]), vec![3, 4]);
        assert_eq!(TurnPolicy::targets(1, 2, &[7]), vec![7]);
        assert!(TurnPolicy::targets(0, 1, &[]).is_empty());
    }

    #[test]
    fn back_turns() {
        let p = TurnPolicy::default();
        assert!(!p.allows(1, 1));
        assert!(p.allows(0, 1));
        assert!(TurnPolicy { back_turns: true }.allows(1, 1));
    }
}
