// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{ItemView, TestEnv, TestKernel};
use crate::math::hashed_unit_f32;
use crate::scoring::{ItemScoreSink, ValueKind};

/// Uniform reading in `[0, 1)` keyed by instance seed and item offset.
///
/// The reading depends only on `(seed, data_offset)`, so it is the same no
/// matter how the pass is split across steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTest;

impl TestKernel for RandomTest {
    fn name(&self) -> &'static str {
        "random"
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Float
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        sink.push_float(hashed_unit_f32(env.seed, u64::from(item.data_offset.unsigned_abs())));
    }
}
