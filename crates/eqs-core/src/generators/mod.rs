// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generators: produce the initial item set for one option.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::{ContextCache, ContextError, ContextRef, EnvContext};
use crate::ident::ActorHandle;
use crate::item::{ItemStore, ItemStoreError, ItemType};
use crate::math::Vec3;
use crate::params::{FloatParam, MissingParam, QueryParams};
use crate::world::World;

mod actors;
mod circle;
mod current_location;
mod grid;

pub use actors::ActorsWithTagGenerator;
pub use circle::OnCircleGenerator;
pub use current_location::CurrentLocationGenerator;
pub use grid::SimpleGridGenerator;

/// Most items a built-in generator emits for one option. Larger requests
/// generate nothing and log a warning.
pub const MAX_GENERATED_ITEMS: usize = 1 << 20;

/// `per_centre * centres` when it stays within [`MAX_GENERATED_ITEMS`].
pub(crate) fn capped_total(per_centre: usize, centres: usize) -> Option<usize> {
    per_centre
        .checked_mul(centres)
        .filter(|&total| total <= MAX_GENERATED_ITEMS)
}

/// Why generation could not produce items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// A named parameter the generator reads was absent.
    #[error(transparent)]
    MissingParam(#[from] MissingParam),
    /// A context the generator requires failed to resolve.
    #[error("required context `{context}` failed: {source}")]
    Context {
        /// Label of the failed context.
        context: String,
        /// Resolution failure.
        #[source]
        source: ContextError,
    },
    /// The generator wrote data that does not fit the store.
    #[error(transparent)]
    Store(#[from] ItemStoreError),
}

/// Read-only state available during generation.
#[derive(Clone, Copy)]
pub struct GenerationEnv<'a> {
    /// Actor that issued the query.
    pub owner: ActorHandle,
    /// World the query runs against.
    pub world: &'a dyn World,
    /// Request parameters.
    pub params: &'a QueryParams,
    /// Contexts resolved for this instance.
    pub contexts: &'a ContextCache,
}

impl GenerationEnv<'_> {
    /// Locations of a required context; a failed resolution is an error.
    ///
    /// Contexts listed by [`Generator::contexts`] are resolved before
    /// [`Generator::generate`] runs.
    pub fn locations(&self, context: &dyn EnvContext) -> Result<&[Vec3], GenerateError> {
        match self.contexts.get(context.id()) {
            Some(resolved) => match &resolved.error {
                Some(err) => Err(GenerateError::Context {
                    context: context.label(),
                    source: err.clone(),
                }),
                None => Ok(&resolved.locations),
            },
            None => Ok(&[]),
        }
    }

    /// Resolves a float property.
    pub fn float(&self, value: &FloatParam) -> Result<f32, MissingParam> {
        value.resolve(self.params)
    }
}

/// Item source for one option. Runs once per option, atomically.
pub trait Generator: Send + Sync + fmt::Debug {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Type of every item this generator adds.
    fn item_type(&self) -> ItemType;

    /// Contexts that must resolve before generation.
    fn contexts(&self) -> Vec<ContextRef> {
        Vec::new()
    }

    /// Named request parameters read by the generator.
    fn required_params(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Appends items to `store`, whose item type is already set.
    fn generate(&self, env: &GenerationEnv<'_>, store: &mut ItemStore) -> Result<(), GenerateError>;
}

/// Shared handle to a generator.
pub type GeneratorRef = Arc<dyn Generator>;

/// Every named parameter a generator reads, its contexts included.
pub fn generator_params(generator: &dyn Generator) -> Vec<String> {
    let mut names: Vec<String> = generator
        .required_params()
        .into_iter()
        .map(str::to_owned)
        .collect();
    for context in generator.contexts() {
        names.extend(context.required_params().into_iter().map(str::to_owned));
    }
    names
}
