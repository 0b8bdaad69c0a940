use crate::map::{JunctionID, VehicleTypeMask};
use geom::{PolyLine3, Vec3};
use serde::{Deserialize, Serialize};
use slotmapd::new_key_type;

new_key_type! {
    pub struct RoadID;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoadKind {
    Road,
    Footpath,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoadEnd {
    Start,
    End,
}

impl RoadEnd {
    pub const BOTH: [RoadEnd; 2] = [RoadEnd::Start, RoadEnd::End];

    pub fn other(self) -> RoadEnd {
        match self {
            RoadEnd::Start => RoadEnd::End,
            RoadEnd::End => RoadEnd::Start,
        }
    }
}

/// Cross-section preset a road is drawn with
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoadType {
    pub name: String,
    pub kind: RoadKind,
    pub width: f32,
    pub lanes_forward: u8,
    pub lanes_backward: u8,
    pub vehicle_types: VehicleTypeMask,
}

impl RoadType {
    pub fn new(
        name: &str,
        kind: RoadKind,
        width: f32,
        lanes_forward: u8,
        lanes_backward: u8,
        vehicle_types: VehicleTypeMask,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            width,
            lanes_forward,
            lanes_backward,
            vehicle_types,
        }
    }

    pub fn n_lanes(&self) -> usize {
        self.lanes_forward as usize + self.lanes_backward as usize
    }
}

/// Where a road end is plugged into a junction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub junction: JunctionID,
    pub slot: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Road {
    pub id: RoadID,
    pub name: String,
    pub kind: RoadKind,

    /// Control markers of the spline, at least two
    pub markers: Vec<Vec3>,
    /// Centerline generated from the markers, always from start to end
    pub points: PolyLine3,
    pub width: f32,

    /// Lanes `0..lanes_forward` go from start to end, the rest go from end to start
    pub lanes_forward: u8,
    pub lanes_backward: u8,
    pub vehicle_types: VehicleTypeMask,

    pub start: Option<SlotRef>,
    pub end: Option<SlotRef>,
}

impl Road {
    pub fn new(
        id: RoadID,
        name: String,
        rtype: &RoadType,
        markers: Vec<Vec3>,
        points: PolyLine3,
    ) -> Self {
        Self {
            id,
            name,
            kind: rtype.kind,
            markers,
            points,
            width: rtype.width,
            lanes_forward: rtype.lanes_forward,
            lanes_backward: rtype.lanes_backward,
            vehicle_types: rtype.vehicle_types,
            start: None,
            end: None,
        }
    }

    /// A copy of this road's cross-section with new markers and no attachments
    pub fn stub(&self, id: RoadID, markers: Vec<Vec3>, points: PolyLine3) -> Self {
        Self {
            id,
            name: self.name.clone(),
            kind: self.kind,
            markers,
            points,
            width: self.width,
            lanes_forward: self.lanes_forward,
            lanes_backward: self.lanes_backward,
            vehicle_types: self.vehicle_types,
            start: None,
            end: None,
        }
    }

    #[inline]
    pub fn n_lanes(&self) -> usize {
        self.lanes_forward as usize + self.lanes_backward as usize
    }

    #[inline]
    pub fn lane_width(&self) -> f32 {
        self.width / self.n_lanes().max(1) as f32
    }

    /// Backward lanes travel from end to start
    #[inline]
    pub fn is_backward(&self, lane: usize) -> bool {
        lane >= self.lanes_forward as usize
    }

    /// Lateral offset of a lane's centerline, positive to the left of start -> end.
    /// In right-hand driving forward lanes sit on the right, lane 0 being the outermost,
    /// and backward lanes mirror them on the left.
    pub fn lane_offset(&self, lane: usize, right_hand_driving: bool) -> f32 {
        let n = self.n_lanes();
        let lw = self.lane_width();
        let slot = if self.is_backward(lane) {
            n - 1 - (lane - self.lanes_forward as usize)
        } else {
            lane
        };
        let from_right = -self.width * 0.5 + lw * (slot as f32 + 0.5);
        if right_hand_driving {
            from_right
        } else {
            -from_right
        }
    }

    /// Lanes travelling towards the given end, ordered from the outermost
    pub fn lanes_arriving_at(&self, end: RoadEnd) -> impl Iterator<Item = usize> {
        let f = self.lanes_forward as usize;
        let n = self.n_lanes();
        match end {
            RoadEnd::End => 0..f,
            RoadEnd::Start => f..n,
        }
    }

    /// Lanes travelling away from the given end, ordered from the outermost
    pub fn lanes_leaving(&self, end: RoadEnd) -> impl Iterator<Item = usize> {
        self.lanes_arriving_at(end.other())
    }

    pub fn attachment(&self, end: RoadEnd) -> Option<SlotRef> {
        match end {
            RoadEnd::Start => self.start,
            RoadEnd::End => self.end,
        }
    }

    pub(crate) fn set_attachment(&mut self, end: RoadEnd, v: Option<SlotRef>) {
        match end {
            RoadEnd::Start => self.start = v,
            RoadEnd::End => self.end = v,
        }
    }

    pub fn end_marker(&self, end: RoadEnd) -> Vec3 {
        match end {
            RoadEnd::Start => self.markers[0],
            RoadEnd::End => self.markers[self.markers.len() - 1],
        }
    }

    pub(crate) fn set_end_marker(&mut self, end: RoadEnd, pos: Vec3) {
        let idx = match end {
            RoadEnd::Start => 0,
            RoadEnd::End => self.markers.len() - 1,
        };
        self.markers[idx] = pos;
    }

    pub fn is_free(&self, end: RoadEnd) -> bool {
        self.attachment(end).is_none()
    }

    pub fn junctions(&self) -> impl Iterator<Item = JunctionID> {
        self.start
            .into_iter()
            .chain(self.end)
            .map(|s| s.junction)
    }
}
