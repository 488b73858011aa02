// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{ItemView, TestEnv, TestKernel};
use crate::item::ItemType;
use crate::scoring::{ItemScoreSink, ValueKind};

/// Whether an actor item carries a tag.
#[derive(Debug, Clone)]
pub struct HasTagTest {
    /// Tag to look for.
    pub tag: String,
}

impl TestKernel for HasTagTest {
    fn name(&self) -> &'static str {
        "has_tag"
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Bool
    }

    fn valid_item_type(&self) -> ItemType {
        ItemType::Actor
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        match item.actor {
            Some(actor) => sink.push_bool(env.world.actor_has_tag(actor, &self.tag)),
            None => sink.skip(),
        }
    }
}
