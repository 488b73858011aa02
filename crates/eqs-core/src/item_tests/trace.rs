// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{ItemView, TestEnv, TestKernel};
use crate::context::ContextRef;
use crate::math::Vec3;
use crate::scoring::{ItemScoreSink, ValueKind};

/// Line of sight between each context location and the item.
#[derive(Debug, Clone)]
pub struct TraceTest {
    /// Trace origin.
    pub context: ContextRef,
    /// Added to both ends (eye height).
    pub offset: Vec3,
}

impl TestKernel for TraceTest {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn contexts(&self) -> Vec<ContextRef> {
        vec![self.context.clone()]
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        let Some(location) = item.location else {
            sink.skip();
            return;
        };
        let to = location.add(&self.offset);
        for origin in env.contexts.locations(self.context.as_ref()) {
            let from = origin.add(&self.offset);
            sink.push_bool(env.world.has_line_of_sight(&from, &to));
        }
    }
}
