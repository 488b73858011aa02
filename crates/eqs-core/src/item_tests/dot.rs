// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{ItemView, TestEnv, TestKernel};
use crate::context::ContextRef;
use crate::math::Vec3;
use crate::scoring::{ItemScoreSink, ValueKind};

/// Cosine between a fixed facing and the direction from each context
/// location to the item.
///
/// Readings lie in `[-1, 1]` (`[0, 1]` with `absolute`). Items sitting on a
/// context location have no direction and are skipped for that entry.
#[derive(Debug, Clone)]
pub struct DotTest {
    /// Origin of the direction.
    pub context: ContextRef,
    /// Reference direction; normalized on use.
    pub facing: Vec3,
    /// Project both directions onto the ground plane first.
    pub two_d: bool,
    /// Report `|cos|`.
    pub absolute: bool,
}

impl DotTest {
    fn flatten(&self, v: Vec3) -> Vec3 {
        if self.two_d {
            Vec3::new(v.x(), v.y(), 0.0)
        } else {
            v
        }
    }
}

impl TestKernel for DotTest {
    fn name(&self) -> &'static str {
        "dot"
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
        let facing = self.flatten(self.facing).normalize();
        for origin in env.contexts.locations(self.context.as_ref()) {
            let dir = self.flatten(location.sub(origin));
            if dir.length() <= crate::math::EPSILON {
                continue;
            }
            let cos = dir.normalize().dot(&facing);
            sink.push_float(if self.absolute { cos.abs() } else { cos });
        }
    }
}
