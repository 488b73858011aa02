// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use std::f32::consts::TAU;

use super::{capped_total, GenerateError, GenerationEnv, Generator, MAX_GENERATED_ITEMS};
use crate::context::ContextRef;
use crate::item::{ItemStore, ItemType};
use crate::math::Vec3;
use crate::params::FloatParam;

/// `count` points evenly spaced on a horizontal circle around every
/// location of a context, starting on the +X axis.
#[derive(Debug, Clone)]
pub struct OnCircleGenerator {
    /// Circle centres.
    pub context: ContextRef,
    /// Circle radius.
    pub radius: FloatParam,
    /// Points per circle.
    pub count: usize,
}

impl Generator for OnCircleGenerator {
    fn name(&self) -> &'static str {
        "on_circle"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Point
    }

    fn contexts(&self) -> Vec<ContextRef> {
        vec![self.context.clone()]
    }

    fn required_params(&self) -> Vec<&str> {
        self.radius.param_name().into_iter().collect()
    }

    fn generate(&self, env: &GenerationEnv<'_>, store: &mut ItemStore) -> Result<(), GenerateError> {
        let radius = env.float(&self.radius)?;
        let centres = env.locations(self.context.as_ref())?;
        let Some(total) = capped_total(self.count, centres.len()) else {
            tracing::warn!(
                count = self.count,
                centres = centres.len(),
                cap = MAX_GENERATED_ITEMS,
                "circle would exceed the item cap; no items"
            );
            return Ok(());
        };
        store.reserve(total);
        let step = TAU / self.count.max(1) as f32;
        for centre in centres {
            for i in 0..self.count {
                let angle = step * i as f32;
                let offset = Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0);
                store.add_item_data(&centre.add(&offset))?;
            }
        }
        Ok(())
    }
}
