// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Contexts: named sources of locations/actors ("the querier", "all actors
//! tagged `enemy`") resolved lazily and cached once per query instance.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ident::{make_context_id, ActorHandle, ContextId};
use crate::item::{decode_actor, ItemType, ItemValue};
use crate::math::Vec3;
use crate::params::{MissingParam, QueryParams};
use crate::world::World;

/// Resolved context values: `num_values` fixed-size records of `value_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextData {
    /// Record type of every value.
    pub value_type: ItemType,
    /// Number of records in `raw`.
    pub num_values: usize,
    /// Concatenated records, same encoding as the item store.
    pub raw: Bytes,
}

impl ContextData {
    /// No values.
    pub fn empty(value_type: ItemType) -> Self {
        Self {
            value_type,
            num_values: 0,
            raw: Bytes::new(),
        }
    }

    /// Encodes a list of points.
    pub fn from_locations(locations: &[Vec3]) -> Self {
        Self::encode(locations)
    }

    /// Encodes a list of actors.
    pub fn from_actors(actors: &[ActorHandle]) -> Self {
        Self::encode(actors)
    }

    fn encode<V: ItemValue>(values: &[V]) -> Self {
        let mut buf = Vec::with_capacity(values.len() * V::ITEM_TYPE.value_size());
        for value in values {
            value.write_bytes(&mut buf);
        }
        Self {
            value_type: V::ITEM_TYPE,
            num_values: values.len(),
            raw: Bytes::from(buf),
        }
    }

    /// `true` when there are no values.
    pub fn is_empty(&self) -> bool {
        self.num_values == 0
    }

    /// Actor handles, empty for point contexts.
    pub fn actors(&self) -> Vec<ActorHandle> {
        match self.value_type {
            ItemType::Actor => self
                .raw
                .chunks_exact(ItemType::Actor.value_size())
                .filter_map(decode_actor)
                .collect(),
            ItemType::Point => Vec::new(),
        }
    }

    /// Locations; actors that no longer exist in `world` are dropped.
    pub fn locations(&self, world: &dyn World) -> Vec<Vec3> {
        match self.value_type {
            ItemType::Point => self
                .raw
                .chunks_exact(ItemType::Point.value_size())
                .filter_map(Vec3::from_le_bytes)
                .collect(),
            ItemType::Actor => self
                .actors()
                .into_iter()
                .filter_map(|actor| world.actor_location(actor))
                .collect(),
        }
    }
}

/// Why a context could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The query owner no longer exists.
    #[error("query owner {0} is not available")]
    OwnerUnavailable(ActorHandle),
    /// The context refers to a named parameter that was not supplied.
    #[error(transparent)]
    MissingParam(#[from] MissingParam),
}

/// Everything a context provider may read.
#[derive(Clone, Copy)]
pub struct ContextEnv<'a> {
    /// Actor that issued the query.
    pub owner: ActorHandle,
    /// World the query runs against.
    pub world: &'a dyn World,
    /// Request parameters.
    pub params: &'a QueryParams,
}

/// A context provider.
pub trait EnvContext: Send + Sync + fmt::Debug {
    /// Stable label; equal labels mean equal values within one instance.
    fn label(&self) -> String;

    /// Cache key derived from [`EnvContext::label`].
    fn id(&self) -> ContextId {
        make_context_id(&self.label())
    }

    /// Computes the context's values.
    fn provide(&self, env: &ContextEnv<'_>) -> Result<ContextData, ContextError>;

    /// Named parameters read by [`EnvContext::provide`].
    fn required_params(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Shared handle to a context provider.
pub type ContextRef = Arc<dyn EnvContext>;

/// Cached outcome of resolving one context.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    /// Values (empty on failure).
    pub data: ContextData,
    /// Pre-decoded locations of `data`.
    pub locations: Vec<Vec3>,
    /// Failure, if resolution did not succeed.
    pub error: Option<ContextError>,
}

/// Per-instance context cache. Never shared across instances.
#[derive(Debug, Default)]
pub struct ContextCache {
    entries: FxHashMap<ContextId, ResolvedContext>,
}

impl ContextCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached resolution, providing and caching it on first use.
    pub fn resolve(&mut self, context: &dyn EnvContext, env: &ContextEnv<'_>) -> &ResolvedContext {
        self.entries.entry(context.id()).or_insert_with(|| {
            match context.provide(env) {
                Ok(data) => {
                    let locations = data.locations(env.world);
                    ResolvedContext {
                        data,
                        locations,
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::debug!(context = %context.label(), error = %err, "context resolved empty");
                    ResolvedContext {
                        data: ContextData::empty(ItemType::Point),
                        locations: Vec::new(),
                        error: Some(err),
                    }
                }
            }
        })
    }

    /// Cached resolution, if the context has been resolved already.
    pub fn get(&self, id: ContextId) -> Option<&ResolvedContext> {
        self.entries.get(&id)
    }

    /// Cached locations for `context`, empty if unresolved or failed.
    pub fn locations(&self, context: &dyn EnvContext) -> &[Vec3] {
        self.get(context.id())
            .map_or(&[], |resolved| resolved.locations.as_slice())
    }

    /// Number of cached contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The actor that issued the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerierContext;

impl EnvContext for QuerierContext {
    fn label(&self) -> String {
        "querier".to_owned()
    }

    fn provide(&self, env: &ContextEnv<'_>) -> Result<ContextData, ContextError> {
        if !env.world.is_alive(env.owner) {
            return Err(ContextError::OwnerUnavailable(env.owner));
        }
        Ok(ContextData::from_actors(&[env.owner]))
    }
}

/// Every live actor carrying a tag.
#[derive(Debug, Clone)]
pub struct ActorsWithTagContext {
    /// Tag to match.
    pub tag: String,
}

impl ActorsWithTagContext {
    /// Context over actors tagged `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl EnvContext for ActorsWithTagContext {
    fn label(&self) -> String {
        format!("actors_with_tag:{}", self.tag)
    }

    fn provide(&self, env: &ContextEnv<'_>) -> Result<ContextData, ContextError> {
        Ok(ContextData::from_actors(&env.world.actors_with_tag(&self.tag)))
    }
}

/// Constant locations baked into the template.
#[derive(Debug, Clone)]
pub struct FixedLocationsContext {
    /// The locations, in order.
    pub locations: Vec<Vec3>,
}

impl EnvContext for FixedLocationsContext {
    fn label(&self) -> String {
        let bits: Vec<[u32; 3]> = self
            .locations
            .iter()
            .map(|v| v.to_array().map(f32::to_bits))
            .collect();
        format!("fixed_locations:{bits:?}")
    }

    fn provide(&self, _env: &ContextEnv<'_>) -> Result<ContextData, ContextError> {
        Ok(ContextData::from_locations(&self.locations))
    }
}

/// A single point assembled from three named request parameters.
#[derive(Debug, Clone)]
pub struct NamedLocationContext {
    /// Parameter names for x, y, z.
    pub params: [String; 3],
}

impl NamedLocationContext {
    /// Point read from parameters `x`, `y`, `z`.
    pub fn new(x: impl Into<String>, y: impl Into<String>, z: impl Into<String>) -> Self {
        Self {
            params: [x.into(), y.into(), z.into()],
        }
    }
}

impl EnvContext for NamedLocationContext {
    fn label(&self) -> String {
        format!("named_location:{}", self.params.join(","))
    }

    fn provide(&self, env: &ContextEnv<'_>) -> Result<ContextData, ContextError> {
        let mut coords = [0.0f32; 3];
        for (slot, name) in coords.iter_mut().zip(&self.params) {
            *slot = env
                .params
                .get(name)
                .ok_or_else(|| MissingParam(name.clone()))?;
        }
        Ok(ContextData::from_locations(&[Vec3::from(coords)]))
    }

    fn required_params(&self) -> Vec<&str> {
        self.params.iter().map(String::as_str).collect()
    }
}
