// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic math helpers used by generators and tests: points and
//! directions, axis-aligned blockers, and a seedable pseudo-random source.
//!
//! All operations stay in `f32` so scores round the same way on every run.

mod aabb;
mod prng;
mod vec3;

pub use aabb::Aabb;
pub(crate) use prng::hashed_unit_f32;
pub use prng::Prng;
pub use vec3::Vec3;

/// Global epsilon used by math routines when detecting degenerate values.
pub const EPSILON: f32 = 1e-6;

/// Clamps `value` to the inclusive `[min, max]` range.
///
/// When `min > max` the bounds are swapped instead of panicking; scoring
/// code feeds user-configured clamp values through here.
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    value.max(lo).min(hi)
}
