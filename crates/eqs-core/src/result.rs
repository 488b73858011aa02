// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Completion payload handed to query callbacks.
use bytes::Bytes;

use crate::ident::{ActorHandle, QueryId};
use crate::instance::QueryStatus;
use crate::item::{decode_actor, ItemType};
use crate::math::Vec3;
use crate::world::World;

/// One selected item: its final score and a copy of its raw record.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    /// Accumulated weighted score.
    pub score: f32,
    /// Raw record in item-store encoding.
    pub data: Bytes,
}

impl ResultItem {
    /// Decodes the record as an actor handle.
    pub fn actor(&self) -> Option<ActorHandle> {
        decode_actor(&self.data)
    }

    /// Decodes the record as a point, or looks the actor up in `world`.
    pub fn location(&self, item_type: ItemType, world: &dyn World) -> Option<Vec3> {
        match item_type {
            ItemType::Point => Vec3::from_le_bytes(&self.data),
            ItemType::Actor => world.actor_location(self.actor()?),
        }
    }
}

/// Outcome of a finished query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Terminal status.
    pub status: QueryStatus,
    /// Item type of the option that produced `items`.
    pub item_type: Option<ItemType>,
    /// Selected items, best first.
    pub items: Vec<ResultItem>,
    /// Option that produced `items`.
    pub option_index: Option<usize>,
    /// Request id.
    pub query_id: QueryId,
    /// Requesting actor.
    pub owner: ActorHandle,
}

impl QueryResult {
    /// `true` when the query succeeded.
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Highest ranked item.
    pub fn best(&self) -> Option<&ResultItem> {
        self.items.first()
    }

    /// Scores in rank order.
    pub fn scores(&self) -> Vec<f32> {
        self.items.iter().map(|item| item.score).collect()
    }

    /// Locations in rank order; unresolvable items are dropped.
    pub fn locations(&self, world: &dyn World) -> Vec<Vec3> {
        let Some(item_type) = self.item_type else {
            return Vec::new();
        };
        self.items
            .iter()
            .filter_map(|item| item.location(item_type, world))
            .collect()
    }

    /// Actor handles in rank order, for actor results.
    pub fn actors(&self) -> Vec<ActorHandle> {
        if self.item_type != Some(ItemType::Actor) {
            return Vec::new();
        }
        self.items.iter().filter_map(ResultItem::actor).collect()
    }
}
