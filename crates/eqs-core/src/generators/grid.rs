// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{capped_total, GenerateError, GenerationEnv, Generator, MAX_GENERATED_ITEMS};
use crate::context::ContextRef;
use crate::item::{ItemStore, ItemType};
use crate::math::Vec3;
use crate::params::FloatParam;

/// Square grid of points centred on every location of a context.
///
/// Each axis holds `floor(2 * half_size / spacing) + 1` points starting at
/// `centre - half_size`; the grid lies in the centre's horizontal plane.
#[derive(Debug, Clone)]
pub struct SimpleGridGenerator {
    /// Grid centres.
    pub context: ContextRef,
    /// Half of the grid's side length.
    pub half_size: FloatParam,
    /// Distance between neighbouring points.
    pub spacing: FloatParam,
}

impl Generator for SimpleGridGenerator {
    fn name(&self) -> &'static str {
        "simple_grid"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Point
    }

    fn contexts(&self) -> Vec<ContextRef> {
        vec![self.context.clone()]
    }

    fn required_params(&self) -> Vec<&str> {
        self.half_size
            .param_name()
            .into_iter()
            .chain(self.spacing.param_name())
            .collect()
    }

    fn generate(&self, env: &GenerationEnv<'_>, store: &mut ItemStore) -> Result<(), GenerateError> {
        let half_size = env.float(&self.half_size)?;
        let spacing = env.float(&self.spacing)?;
        let centres = env.locations(self.context.as_ref())?;
        if spacing.is_nan() || spacing <= 0.0 || !half_size.is_finite() || half_size < 0.0 {
            tracing::warn!(half_size, spacing, "grid generator needs positive spacing; no items");
            return Ok(());
        }
        let steps = (f64::from(half_size) * 2.0 / f64::from(spacing)).floor();
        let total = if steps < MAX_GENERATED_ITEMS as f64 {
            let per_axis = steps as usize + 1;
            per_axis
                .checked_mul(per_axis)
                .and_then(|per_centre| capped_total(per_centre, centres.len()))
                .map(|total| (per_axis, total))
        } else {
            None
        };
        let Some((per_axis, total)) = total else {
            tracing::warn!(
                half_size,
                spacing,
                centres = centres.len(),
                cap = MAX_GENERATED_ITEMS,
                "grid would exceed the item cap; no items"
            );
            return Ok(());
        };
        store.reserve(total);
        for centre in centres {
            for ix in 0..per_axis {
                for iy in 0..per_axis {
                    let point = Vec3::new(
                        centre.x() - half_size + ix as f32 * spacing,
                        centre.y() - half_size + iy as f32 * spacing,
                        centre.z(),
                    );
                    store.add_item_data(&point)?;
                }
            }
        }
        Ok(())
    }
}
