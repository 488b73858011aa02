// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types shared across the runtime.
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Canonical 256-bit hash used for context identifiers.
pub type Hash = [u8; 32];

/// Opaque identifier handed back by [`crate::QueryManager::run_query`].
///
/// Ids are assigned from a per-manager counter and never reused while the
/// manager lives.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// Handle to an actor living in a [`crate::World`].
///
/// Handles are plain integers so they can be stored verbatim as item data.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ActorHandle(pub u64);

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Identifier of a world; used to flush queries when a world is torn down.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct WorldId(pub u64);

/// Stable identifier for a context, derived from its label.
///
/// Two contexts with the same label share a cache slot inside one query
/// instance, so labels must describe the context's full configuration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ContextId(pub Hash);

/// Produces a stable context identifier derived from a label using BLAKE3.
pub fn make_context_id(label: &str) -> ContextId {
    let mut hasher = Hasher::new();
    hasher.update(b"eqs-context:");
    hasher.update(label.as_bytes());
    ContextId(hasher.finalize().into())
}
