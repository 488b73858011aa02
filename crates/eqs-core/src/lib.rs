// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! eqs-core: environment query runtime.
//!
//! A query template lists options; each option has a generator producing
//! candidate items and tests that filter and score them. Queries run
//! incrementally under a per-tick time budget shared by every in-flight
//! query, then return their ranked or selected items through a callback.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Deterministic math helpers (Vec3, Aabb, PRNG).
pub mod math;

/// Built-in generators and the generator capability.
pub mod generators;
/// Built-in test kernels, the kernel capability, and test ordering.
pub mod item_tests;

mod clock;
mod config;
mod context;
mod debug;
mod ident;
mod instance;
mod item;
mod manager;
mod params;
mod registry;
mod result;
mod scoring;
mod template;
mod world;

// Re-exports for stable public API
/// Monotonic time port and per-step budgets.
pub use clock::{Clock, StepBudget, SystemClock};
/// Manager configuration and its storage port.
pub use config::{ConfigError, ConfigService, ConfigStore, ManagerConfig};
/// Context providers and the per-instance cache.
pub use context::{
    ActorsWithTagContext, ContextCache, ContextData, ContextEnv, ContextError, ContextRef,
    EnvContext, FixedLocationsContext, NamedLocationContext, QuerierContext, ResolvedContext,
};
/// Debug snapshots and sinks.
pub use debug::{
    capture_query, capture_test_step, DebugItem, DebugQuery, DebugSink, QueryRecord,
    RecordingDebugSink, TestStepRecord,
};
/// Identifier types.
pub use ident::{make_context_id, ActorHandle, ContextId, Hash, QueryId, WorldId};
/// Query instance state machine.
pub use instance::{
    Cursor, InstanceTiming, QueryInstance, QueryStatus, RunMode, StepEvent, DEFAULT_QUERY_SEED,
};
/// Item storage.
pub use item::{
    decode_actor, Item, ItemDetails, ItemStore, ItemStoreError, ItemType, ItemValue,
    SKIPPED_ITEM_VALUE,
};
/// Scheduler.
pub use manager::{QueryCallback, QueryManager, QueryRequest, QueryStats, TickReport};
/// Named request parameters.
pub use params::{FloatParam, MissingParam, QueryParams};
/// Factories and declarative descriptors.
pub use registry::{
    Catalog, ContextDesc, ContextFactory, GeneratorDesc, GeneratorFactory, OptionDesc, Registry,
    RegistryError, Settings, TemplateDesc, TestDesc, TestFactory,
};
/// Completion payload.
pub use result::{QueryResult, ResultItem};
/// Filter/score configuration and normalization.
pub use scoring::{
    normalize_test, score_bounds, BoundTestParams, ClampType, FilterOp, FilterType, ItemOutcome,
    ItemScoreSink, Normalization, ScoreBounds, ScoreEquation, ScoreOp, TestConfig, TestCost,
    TestPurpose, ValueKind,
};
/// Templates.
pub use template::{OptionTemplate, QueryTemplate};
/// World port and the in-memory world.
pub use world::{ActorDesc, BlockerDesc, SimpleWorld, World, WorldDesc};
