// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::math::{Vec3, EPSILON};

/// Axis-aligned bounding box in world coordinates.
///
/// Used by [`crate::SimpleWorld`] as a line-of-sight blocker.
///
/// Invariants:
/// - `min` components are less than or equal to `max` components.
/// - Values are `f32` and represent meters in world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    /// Constructs an AABB from two opposite corners, ordering components so
    /// the invariant holds regardless of argument order.
    #[must_use]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        let a = a.to_array();
        let b = b.to_array();
        Self {
            min: Vec3::new(a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])),
            max: Vec3::new(a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])),
        }
    }

    /// Returns the minimum corner.
    #[must_use]
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Returns the maximum corner.
    #[must_use]
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// Builds an AABB centered at `center` with half-extents `hx, hy, hz`.
    #[must_use]
    pub fn from_center_half_extents(center: Vec3, hx: f32, hy: f32, hz: f32) -> Self {
        let he = Vec3::new(hx.abs(), hy.abs(), hz.abs());
        Self::new(center.sub(&he), center.add(&he))
    }

    /// Returns `true` if `point` lies inside or on the box.
    #[must_use]
    pub fn contains(&self, point: &Vec3) -> bool {
        let p = point.to_array();
        let lo = self.min.to_array();
        let hi = self.max.to_array();
        (0..3).all(|axis| p[axis] >= lo[axis] && p[axis] <= hi[axis])
    }

    /// Returns `true` if the segment `from → to` touches the box.
    ///
    /// Slab test over the three axes; a zero-length segment degenerates to
    /// [`Aabb::contains`].
    #[must_use]
    pub fn intersects_segment(&self, from: &Vec3, to: &Vec3) -> bool {
        let origin = from.to_array();
        let delta = to.sub(from).to_array();
        let lo = self.min.to_array();
        let hi = self.max.to_array();

        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;
        for axis in 0..3 {
            if delta[axis].abs() <= EPSILON {
                if origin[axis] < lo[axis] || origin[axis] > hi[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / delta[axis];
            let mut t0 = (lo[axis] - origin[axis]) * inv;
            let mut t1 = (hi[axis] - origin[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}
