// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Item storage: one untyped byte buffer plus a uniform `(score, offset,
//! discarded)` index over it.
//!
//! Layout (little-endian, fixed per option):
//! - [`ItemType::Point`]: 12 bytes, `[x, y, z]` as 3 × `f32`
//! - [`ItemType::Actor`]: 8 bytes, actor handle as `u64`
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::ActorHandle;
use crate::math::Vec3;
use crate::world::World;

/// Raw test value marking an item that was force-excluded from a test pass.
///
/// Skipped readings contribute no weighted score and are ignored when the
/// test scans for its normalization bounds.
pub const SKIPPED_ITEM_VALUE: f32 = -f32::MAX;

/// Concrete value type produced by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A bare world-space location.
    Point,
    /// An actor handle; actors also expose a location, so `Actor` is a
    /// subtype of `Point`.
    Actor,
}

impl ItemType {
    /// Byte size of one record of this type.
    pub const fn value_size(self) -> usize {
        match self {
            Self::Point => 12,
            Self::Actor => 8,
        }
    }

    /// Returns `true` when items of this type can be used wherever `base`
    /// items are expected.
    pub const fn is_a(self, base: Self) -> bool {
        matches!(
            (self, base),
            (Self::Point, Self::Point) | (Self::Actor, Self::Point | Self::Actor)
        )
    }
}

/// A value that can be appended to an [`ItemStore`].
pub trait ItemValue {
    /// Item type this value encodes as.
    const ITEM_TYPE: ItemType;

    /// Appends the canonical byte encoding of `self` to `out`.
    fn write_bytes(&self, out: &mut Vec<u8>);
}

impl ItemValue for Vec3 {
    const ITEM_TYPE: ItemType = ItemType::Point;

    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl ItemValue for ActorHandle {
    const ITEM_TYPE: ItemType = ItemType::Actor;

    fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0.to_le_bytes());
    }
}

/// Decodes an actor record; `None` on a wrong length.
pub fn decode_actor(bytes: &[u8]) -> Option<ActorHandle> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some(ActorHandle(u64::from_le_bytes(raw)))
}

/// Lightweight index entry for one generated item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    /// Accumulated weighted score.
    pub score: f32,
    /// Byte offset of the item's record in the store buffer.
    pub data_offset: i32,
    /// Set once the item fails a filtering test; never cleared.
    pub discarded: bool,
}

impl Item {
    fn new(data_offset: i32) -> Self {
        Self {
            score: 0.0,
            data_offset,
            discarded: false,
        }
    }

    /// `data_offset >= 0 && !discarded`.
    pub fn is_valid(&self) -> bool {
        self.data_offset >= 0 && !self.discarded
    }

    /// Permanently removes the item from later tests.
    pub fn discard(&mut self) {
        self.discarded = true;
    }
}

/// Per-item, per-test raw and weighted results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemDetails {
    /// Raw (pre-normalization) value per test, or [`SKIPPED_ITEM_VALUE`].
    pub test_results: Vec<f32>,
    /// Weighted contribution per test after normalization.
    pub test_weighted_scores: Vec<f32>,
}

impl ItemDetails {
    /// Zeroed details for `num_tests` tests.
    pub fn new(num_tests: usize) -> Self {
        Self {
            test_results: vec![0.0; num_tests],
            test_weighted_scores: vec![0.0; num_tests],
        }
    }
}

/// Errors raised while appending item data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemStoreError {
    /// The value's encoded size differs from the store's per-item size.
    #[error("item size mismatch: store expects {expected} bytes, value has {actual}")]
    SizeMismatch {
        /// Per-item size fixed for the current option.
        expected: usize,
        /// Size of the rejected value.
        actual: usize,
    },
    /// Data was added before the generator declared an item type.
    #[error("item type not set before adding data")]
    NoItemType,
    /// The buffer would grow past what an `i32` offset can address.
    #[error("item buffer exceeds addressable size")]
    Overflow,
}

/// Growable byte buffer plus the item index over it.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    item_type: Option<ItemType>,
    raw: Vec<u8>,
    items: Vec<Item>,
}

impl ItemStore {
    /// Creates an empty store with no item type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all items and the item type (used when moving to the next option).
    pub fn reset(&mut self) {
        self.item_type = None;
        self.raw.clear();
        self.items.clear();
    }

    /// Fixes the item type (and so the record size) for subsequent adds.
    pub fn set_item_type(&mut self, item_type: ItemType) {
        self.item_type = Some(item_type);
    }

    /// Item type of the current option, if generation declared one.
    pub fn item_type(&self) -> Option<ItemType> {
        self.item_type
    }

    /// Per-item record size, or 0 before an item type is set.
    pub fn value_size(&self) -> usize {
        self.item_type.map_or(0, ItemType::value_size)
    }

    /// Reserves room for `additional` more items.
    pub fn reserve(&mut self, additional: usize) {
        self.raw.reserve(additional * self.value_size());
        self.items.reserve(additional);
    }

    /// Appends one typed value.
    pub fn add_item_data<V: ItemValue>(&mut self, value: &V) -> Result<(), ItemStoreError> {
        self.check_size(V::ITEM_TYPE.value_size())?;
        let offset = self.next_offset()?;
        value.write_bytes(&mut self.raw);
        self.items.push(Item::new(offset));
        Ok(())
    }

    /// Appends one record per value.
    pub fn add_item_data_list<V: ItemValue>(&mut self, values: &[V]) -> Result<(), ItemStoreError> {
        self.check_size(V::ITEM_TYPE.value_size())?;
        self.reserve(values.len());
        for value in values {
            let offset = self.next_offset()?;
            value.write_bytes(&mut self.raw);
            self.items.push(Item::new(offset));
        }
        Ok(())
    }

    /// Appends one pre-encoded record.
    pub fn add_raw(&mut self, bytes: &[u8]) -> Result<(), ItemStoreError> {
        self.check_size(bytes.len())?;
        let offset = self.next_offset()?;
        self.raw.extend_from_slice(bytes);
        self.items.push(Item::new(offset));
        Ok(())
    }

    fn check_size(&self, actual: usize) -> Result<(), ItemStoreError> {
        let Some(item_type) = self.item_type else {
            return Err(ItemStoreError::NoItemType);
        };
        let expected = item_type.value_size();
        if actual == expected {
            Ok(())
        } else {
            Err(ItemStoreError::SizeMismatch { expected, actual })
        }
    }

    fn next_offset(&self) -> Result<i32, ItemStoreError> {
        i32::try_from(self.raw.len()).map_err(|_| ItemStoreError::Overflow)
    }

    /// Item index entries.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    /// Number of generated items (valid or not).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` when no items were generated.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items that are still valid.
    pub fn num_valid_items(&self) -> usize {
        self.items.iter().filter(|item| item.is_valid()).count()
    }

    /// Raw record of the item at `index`.
    pub fn item_data(&self, index: usize) -> Option<&[u8]> {
        let item = self.items.get(index)?;
        self.data_at(item.data_offset)
    }

    /// Raw record starting at `offset`.
    pub fn data_at(&self, offset: i32) -> Option<&[u8]> {
        let start = usize::try_from(offset).ok()?;
        self.raw.get(start..start + self.value_size())
    }

    /// Location of the item at `index`; actor items are looked up in `world`.
    pub fn location(&self, index: usize, world: &dyn World) -> Option<Vec3> {
        let data = self.item_data(index)?;
        match self.item_type? {
            ItemType::Point => Vec3::from_le_bytes(data),
            ItemType::Actor => world.actor_location(decode_actor(data)?),
        }
    }

    /// Actor handle of the item at `index`, for actor items only.
    pub fn actor(&self, index: usize) -> Option<ActorHandle> {
        match self.item_type? {
            ItemType::Actor => decode_actor(self.item_data(index)?),
            ItemType::Point => None,
        }
    }
}
