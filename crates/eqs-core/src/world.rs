// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! World port: the read-only view of actors and geometry that generators,
//! contexts, and tests consult.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::ident::{ActorHandle, WorldId};
use crate::math::{Aabb, Vec3};

/// Read-only world queries used during query execution.
///
/// Implementations must be deterministic: `actors_with_tag` returns handles in
/// ascending order so generation order (and therefore tie-breaking) is stable.
pub trait World: Send + Sync {
    /// Identifier used by [`crate::QueryManager::on_world_cleanup`].
    fn id(&self) -> WorldId;
    /// `true` while the actor exists.
    fn is_alive(&self, actor: ActorHandle) -> bool;
    /// Current location of a live actor.
    fn actor_location(&self, actor: ActorHandle) -> Option<Vec3>;
    /// All live actors carrying `tag`, ascending by handle.
    fn actors_with_tag(&self, tag: &str) -> Vec<ActorHandle>;
    /// `true` if the live actor carries `tag`.
    fn actor_has_tag(&self, actor: ActorHandle, tag: &str) -> bool;
    /// `true` if nothing blocks the segment `from → to`.
    fn has_line_of_sight(&self, from: &Vec3, to: &Vec3) -> bool;
}

#[derive(Debug, Clone)]
struct ActorRecord {
    location: Vec3,
    tags: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct SimpleWorldState {
    actors: BTreeMap<ActorHandle, ActorRecord>,
    blockers: Vec<Aabb>,
    next_handle: u64,
}

/// In-memory [`World`]: tagged point actors plus box-shaped sight blockers.
///
/// Mutation goes through `&self` so a world shared behind `Arc` can be edited
/// between scheduler ticks (e.g. to kill a querier mid-query).
#[derive(Debug)]
pub struct SimpleWorld {
    id: WorldId,
    state: RwLock<SimpleWorldState>,
}

impl SimpleWorld {
    /// Creates an empty world.
    pub fn new(id: WorldId) -> Self {
        Self {
            id,
            state: RwLock::new(SimpleWorldState {
                next_handle: 1,
                ..SimpleWorldState::default()
            }),
        }
    }

    /// Builds a world from its serialized description.
    pub fn from_desc(desc: &WorldDesc) -> Self {
        let world = Self::new(WorldId(desc.id));
        for actor in &desc.actors {
            let tags: Vec<&str> = actor.tags.iter().map(String::as_str).collect();
            match actor.handle {
                Some(handle) => world.spawn_with_handle(ActorHandle(handle), actor.location.into(), &tags),
                None => {
                    world.spawn(actor.location.into(), &tags);
                }
            }
        }
        for blocker in &desc.blockers {
            world.add_blocker(Aabb::new(blocker.min.into(), blocker.max.into()));
        }
        world
    }

    /// Spawns an actor and returns its fresh handle.
    pub fn spawn(&self, location: Vec3, tags: &[&str]) -> ActorHandle {
        let handle = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let handle = ActorHandle(state.next_handle);
            state.next_handle += 1;
            handle
        };
        self.spawn_with_handle(handle, location, tags);
        handle
    }

    /// Spawns (or replaces) an actor under an explicit handle.
    pub fn spawn_with_handle(&self, handle: ActorHandle, location: Vec3, tags: &[&str]) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.next_handle = state.next_handle.max(handle.0 + 1);
        state.actors.insert(
            handle,
            ActorRecord {
                location,
                tags: tags.iter().map(|t| (*t).to_owned()).collect(),
            },
        );
    }

    /// Removes an actor; returns `false` if it did not exist.
    pub fn despawn(&self, handle: ActorHandle) -> bool {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .remove(&handle)
            .is_some()
    }

    /// Moves a live actor; returns `false` if it does not exist.
    pub fn set_location(&self, handle: ActorHandle, location: Vec3) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.actors.get_mut(&handle) {
            Some(record) => {
                record.location = location;
                true
            }
            None => false,
        }
    }

    /// Adds a box that blocks line of sight.
    pub fn add_blocker(&self, blocker: Aabb) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .blockers
            .push(blocker);
    }

    /// Number of live actors.
    pub fn num_actors(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .len()
    }
}

impl World for SimpleWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn is_alive(&self, actor: ActorHandle) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .contains_key(&actor)
    }

    fn actor_location(&self, actor: ActorHandle) -> Option<Vec3> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .get(&actor)
            .map(|record| record.location)
    }

    fn actors_with_tag(&self, tag: &str) -> Vec<ActorHandle> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .iter()
            .filter(|(_, record)| record.tags.contains(tag))
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn actor_has_tag(&self, actor: ActorHandle, tag: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .actors
            .get(&actor)
            .is_some_and(|record| record.tags.contains(tag))
    }

    fn has_line_of_sight(&self, from: &Vec3, to: &Vec3) -> bool {
        !self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blockers
            .iter()
            .any(|blocker| blocker.intersects_segment(from, to))
    }
}

/// Serialized world description (used by the CLI and fixtures).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldDesc {
    /// World identifier.
    #[serde(default)]
    pub id: u64,
    /// Actors to spawn, in order.
    #[serde(default)]
    pub actors: Vec<ActorDesc>,
    /// Sight blockers.
    #[serde(default)]
    pub blockers: Vec<BlockerDesc>,
}

/// One actor in a [`WorldDesc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDesc {
    /// Explicit handle; assigned sequentially when absent.
    #[serde(default)]
    pub handle: Option<u64>,
    /// World-space location.
    pub location: [f32; 3],
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One blocker box in a [`WorldDesc`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerDesc {
    /// One corner.
    pub min: [f32; 3],
    /// The opposite corner.
    pub max: [f32; 3],
}
