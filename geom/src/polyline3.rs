use crate::{vec2, Vec3};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::ops::{Index, Range};
use std::slice::Iter;

/// An ordered list of at least one point forming a broken line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine3 {
    points: Vec<Vec3>,
    l: f32,
}

impl From<Vec<Vec3>> for PolyLine3 {
    fn from(x: Vec<Vec3>) -> Self {
        Self::new(x)
    }
}

impl PolyLine3 {
    #[inline]
    pub fn new(x: Vec<Vec3>) -> Self {
        if x.is_empty() {
            panic!("Vec must have at least one point")
        }
        Self {
            l: length(&x),
            points: x,
        }
    }

    /// Returns None when the vector is empty
    pub fn try_new(x: Vec<Vec3>) -> Option<Self> {
        if x.is_empty() {
            return None;
        }
        Some(Self::new(x))
    }

    /// Ramer-Douglas-Peucker: removes interior points so that every removed point
    /// lies within `tolerance` of the segment replacing it.
    /// The first and last points are always kept.
    pub fn decimate(&mut self, tolerance: f32) {
        let n = self.points.len();
        if n <= 2 {
            return;
        }
        let mut keep = vec![false; n];
        keep[0] = true;
        keep[n - 1] = true;

        let mut stack = vec![(0, n - 1)];
        while let Some((a, b)) = stack.pop() {
            let (pa, pb) = (self.points[a], self.points[b]);
            let Some((i, d)) = (a + 1..b)
                .map(|i| (i, segment_distance(pa, pb, self.points[i])))
                .max_by_key(|&(_, d)| OrderedFloat(d))
            else {
                continue;
            };
            if d > tolerance {
                keep[i] = true;
                stack.push((a, i));
                stack.push((i, b));
            }
        }

        let mut k = keep.into_iter();
        self.points.retain(|_| k.next().unwrap_or(true));
        self.l = length(&self.points);
    }

    pub fn extend<T>(&mut self, s: T)
    where
        T: IntoIterator<Item = Vec3>,
    {
        let old_l = self.points.len();
        self.points.extend(s);
        self.l += length(&self.points[old_l - 1..]);
    }

    #[inline]
    pub fn push(&mut self, item: Vec3) {
        self.l += (self.last() - item).mag();
        self.points.push(item);
    }

    pub fn reverse(&mut self) {
        self.points.reverse()
    }

    pub fn reversed(&self) -> Self {
        let mut c = self.clone();
        c.reverse();
        c
    }

    pub fn into_vec(self) -> Vec<Vec3> {
        self.points
    }

    /// Closest point to p on the polyline using xy distance
    pub fn project(&self, p: Vec3) -> Vec3 {
        self.project_segment(p).0
    }

    /// Horizontal distance from the projection to p
    pub fn project_dist(&self, p: Vec3) -> f32 {
        let proj = self.project(p);
        proj.horizontal_distance(p)
    }

    /// Returns the id of the point right after the projection along with the projection
    pub fn project_segment(&self, p: Vec3) -> (Vec3, usize) {
        match *self.points {
            [p] => (p, 0),
            [src, dst] => (src + (dst - src) * project_t_xy(src, dst, p), 1),
            _ => self
                .array_windows::<2>()
                .enumerate()
                .map(|(i, &[a, b])| (a + (b - a) * project_t_xy(a, b, p), i + 1))
                .min_by_key(|&(proj, _)| OrderedFloat((p - proj).xy().mag()))
                .unwrap_or((self.first(), 0)),
        }
    }

    /// Index of the point closest to p
    pub fn nearest_point(&self, p: Vec3) -> usize {
        self.points
            .iter()
            .enumerate()
            .min_by_key(|(_, x)| OrderedFloat(x.distance2(p)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn segment_vec(&self, id: usize) -> Option<Vec3> {
        Some(*self.get(id + 1)? - *self.get(id)?)
    }

    #[inline]
    /// Gives the direction pointing inward the polyline at the first point
    pub fn first_dir(&self) -> Option<Vec3> {
        if self.points.len() >= 2 {
            (self[1] - self[0]).try_normalize()
        } else {
            None
        }
    }

    #[inline]
    /// Gives the direction pointing outward the polyline at the last point
    pub fn last_dir(&self) -> Option<Vec3> {
        let l = self.points.len();
        if l >= 2 {
            (self[l - 1] - self[l - 2]).try_normalize()
        } else {
            None
        }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.l
    }

    /// Inverse of `point_along`
    /// proj needs to be on the polyline for the result to be accurate
    pub fn length_at_proj(&self, proj: Vec3) -> f32 {
        match self.n_points() {
            1 => 0.0,
            2 => self[0].distance(proj),
            _ => {
                let mut partial = 0.0;
                for &[a, b] in self.array_windows::<2>() {
                    let d = a.distance2(b);
                    let d2 = a.distance2(proj);

                    if d2 < d {
                        return partial + d2.sqrt();
                    }

                    partial += d.sqrt();
                }
                partial
            }
        }
    }

    pub fn point_along(&self, l: f32) -> Vec3 {
        let mut partial = 0.0;
        for &[a, b] in self.array_windows::<2>() {
            let d = a.distance(b);
            if partial + d >= l && d > 0.0 {
                return a + (b - a) * ((l - partial) / d);
            }
            partial += d;
        }
        self.last()
    }

    /// Splits at point index `idx`, which ends up in both halves
    /// ([first ... idx], [idx ... last])
    pub fn split_at_index(&self, idx: usize) -> Option<(Self, Self)> {
        if idx == 0 || idx + 1 >= self.points.len() {
            return None;
        }
        Some((
            Self::new(self.points[..=idx].to_vec()),
            Self::new(self.points[idx..].to_vec()),
        ))
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Vec3> {
        self.points.get(index)
    }

    #[inline]
    pub fn first(&self) -> Vec3 {
        self.points[0]
    }

    #[inline]
    pub fn last(&self) -> Vec3 {
        self.points[self.points.len() - 1]
    }

    pub fn as_slice(&self) -> &[Vec3] {
        self.points.as_slice()
    }

    pub fn iter(&self) -> Iter<'_, Vec3> {
        self.points.iter()
    }

    pub fn array_windows<const N: usize>(&self) -> impl Iterator<Item = &[Vec3; N]> + '_ {
        self.points.windows(N).filter_map(|x| x.try_into().ok())
    }
}

impl Index<Range<usize>> for PolyLine3 {
    type Output = [Vec3];

    fn index(&self, r: Range<usize>) -> &[Vec3] {
        &self.points[r]
    }
}

impl Index<usize> for PolyLine3 {
    type Output = Vec3;

    fn index(&self, index: usize) -> &Vec3 {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PolyLine3 {
    type Item = &'a Vec3;
    type IntoIter = Iter<'a, Vec3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

fn length(v: &[Vec3]) -> f32 {
    v.windows(2).map(|x| (x[1] - x[0]).mag()).sum()
}

/// Parameter in [0; 1] of the xy projection of p on [a; b]
fn project_t_xy(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    let diff = vec2(b.x - a.x, b.y - a.y);
    let m2 = diff.mag2();
    if m2 <= 0.0 {
        return 0.0;
    }
    (diff.dot(p.xy() - a.xy()) / m2).clamp(0.0, 1.0)
}

/// Distance from p to the segment [a; b]
fn segment_distance(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    let diff = b - a;
    let m2 = diff.mag2();
    if m2 <= 0.0 {
        return a.distance(p);
    }
    let t = (diff.dot(p - a) / m2).clamp(0.0, 1.0);
    (a + diff * t).distance(p)
}
