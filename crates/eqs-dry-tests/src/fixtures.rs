// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Small worlds, generators, and tests used across integration suites.

use std::sync::Arc;

use eqs_core::generators::{CurrentLocationGenerator, GeneratorRef};
use eqs_core::item_tests::{DistanceMode, DistanceTest, ItemView, TestDef, TestEnv, TestKernel};
use eqs_core::math::Vec3;
use eqs_core::{
    ActorHandle, FixedLocationsContext, ItemScoreSink, ManagerConfig, QueryManager, SimpleWorld,
    TestConfig, ValueKind, WorldId,
};

use crate::clock::FakeClock;

/// World 1 with a `querier`-tagged actor at the origin.
pub fn world_with_querier() -> (Arc<SimpleWorld>, ActorHandle) {
    let world = Arc::new(SimpleWorld::new(WorldId(1)));
    let owner = world.spawn(Vec3::ZERO, &["querier"]);
    (world, owner)
}

/// Point generator yielding `(x, 0, 0)` for each `x`, in order.
pub fn line_generator(xs: &[f32]) -> GeneratorRef {
    Arc::new(CurrentLocationGenerator {
        context: Arc::new(FixedLocationsContext {
            locations: xs.iter().map(|x| Vec3::new(*x, 0.0, 0.0)).collect(),
        }),
    })
}

/// 3D distance from the origin with `config`.
pub fn distance_test(config: TestConfig) -> TestDef {
    TestDef::new(
        config,
        Arc::new(DistanceTest {
            context: Arc::new(FixedLocationsContext {
                locations: vec![Vec3::ZERO],
            }),
            mode: DistanceMode::ThreeD,
        }),
    )
}

/// Reads the item's x coordinate; signed, unlike distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationXTest;

impl TestKernel for LocationXTest {
    fn name(&self) -> &'static str {
        "location_x"
    }

    fn value_kind(&self) -> ValueKind {
        ValueKind::Float
    }

    fn evaluate(&self, _env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        if let Some(location) = item.location {
            sink.push_float(location.x());
        }
    }
}

/// Manager over `world` driven by `clock`.
pub fn manager_for(world: Arc<SimpleWorld>, clock: &FakeClock, config: ManagerConfig) -> QueryManager {
    QueryManager::new(config, world, Arc::new(clock.clone()))
}
