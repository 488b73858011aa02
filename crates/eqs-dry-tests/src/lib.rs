// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for the environment query runtime.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`clock`] - Manually advanced clock
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`kernels`] - Counting and costed test/generator wrappers
//! - [`callbacks`] - Completion callback recorder
//! - [`fixtures`] - Worlds, generators, and tests for common scenarios

pub mod callbacks;
pub mod clock;
pub mod config;
pub mod fixtures;
pub mod kernels;

pub use callbacks::CallbackLog;
pub use clock::FakeClock;
pub use config::InMemoryConfigStore;
pub use fixtures::{distance_test, line_generator, manager_for, world_with_querier, LocationXTest};
pub use kernels::{CostedGenerator, CostedTest, CountingTest};
