// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{GenerateError, GenerationEnv, Generator};
use crate::context::ContextRef;
use crate::item::{ItemStore, ItemType};

/// One point item per location of a context.
#[derive(Debug, Clone)]
pub struct CurrentLocationGenerator {
    /// Source context.
    pub context: ContextRef,
}

impl Generator for CurrentLocationGenerator {
    fn name(&self) -> &'static str {
        "current_location"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Point
    }

    fn contexts(&self) -> Vec<ContextRef> {
        vec![self.context.clone()]
    }

    fn generate(&self, env: &GenerationEnv<'_>, store: &mut ItemStore) -> Result<(), GenerateError> {
        let locations = env.locations(self.context.as_ref())?;
        store.add_item_data_list(locations)?;
        Ok(())
    }
}
