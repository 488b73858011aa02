// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use serde::{Deserialize, Serialize};

use super::{ItemView, TestEnv, TestKernel};
use crate::context::ContextRef;
use crate::math::Vec3;
use crate::scoring::{ItemScoreSink, ValueKind};

/// Axis selection for [`DistanceTest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    /// Euclidean distance.
    #[default]
    ThreeD,
    /// Distance ignoring height.
    TwoD,
    /// Signed height difference, item minus context.
    Z,
    /// Unsigned height difference.
    AbsoluteZ,
}

impl DistanceMode {
    fn measure(self, item: &Vec3, context: &Vec3) -> f32 {
        match self {
            Self::ThreeD => item.distance(context),
            Self::TwoD => item.sub(context).length_2d(),
            Self::Z => item.z() - context.z(),
            Self::AbsoluteZ => (item.z() - context.z()).abs(),
        }
    }
}

/// Distance from each item to every location of a context.
#[derive(Debug, Clone)]
pub struct DistanceTest {
    /// Measured-from context.
    pub context: ContextRef,
    /// Axis selection.
    pub mode: DistanceMode,
}

impl TestKernel for DistanceTest {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Float
    }

    fn contexts(&self) -> Vec<ContextRef> {
        vec![self.context.clone()]
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        let Some(location) = item.location else {
            sink.skip();
            return;
        };
        for point in env.contexts.locations(self.context.as_ref()) {
            sink.push_float(self.mode.measure(&location, point));
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn modes_measure_expected_axes() {
        let item = Vec3::new(3.0, 4.0, 10.0);
        let ctx = Vec3::new(0.0, 0.0, 12.0);
        assert_eq!(DistanceMode::TwoD.measure(&item, &ctx), 5.0);
        assert_eq!(DistanceMode::Z.measure(&item, &ctx), -2.0);
        assert_eq!(DistanceMode::AbsoluteZ.measure(&item, &ctx), 2.0);
        let flat = Vec3::new(3.0, 4.0, 12.0);
        assert_eq!(DistanceMode::ThreeD.measure(&flat, &ctx), 5.0);
    }
}
