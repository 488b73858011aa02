// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use super::{GenerateError, GenerationEnv, Generator};
use crate::context::ContextRef;
use crate::ident::ActorHandle;
use crate::item::{ItemStore, ItemType};
use crate::params::FloatParam;

/// Tagged actors within `radius` of any location of a context, ascending by
/// handle. A negative radius disables the distance check.
#[derive(Debug, Clone)]
pub struct ActorsWithTagGenerator {
    /// Tag to collect.
    pub tag: String,
    /// Search centres.
    pub context: ContextRef,
    /// Search radius.
    pub radius: FloatParam,
}

impl Generator for ActorsWithTagGenerator {
    fn name(&self) -> &'static str {
        "actors_with_tag"
    }

    fn item_type(&self) -> ItemType {
        ItemType::Actor
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
        let found: Vec<ActorHandle> = env
            .world
            .actors_with_tag(&self.tag)
            .into_iter()
            .filter(|actor| {
                radius < 0.0
                    || env.world.actor_location(*actor).is_some_and(|location| {
                        centres.iter().any(|centre| centre.distance(&location) <= radius)
                    })
            })
            .collect();
        store.add_item_data_list(&found)?;
        Ok(())
    }
}
