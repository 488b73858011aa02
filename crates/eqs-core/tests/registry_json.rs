// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use eqs_core::generators::{CurrentLocationGenerator, GeneratorRef};
use eqs_core::math::Vec3;
use eqs_core::{
    FixedLocationsContext, ManagerConfig, QueryParams, QueryRequest, QueryStatus, Registry,
    RegistryError, RunMode, TemplateDesc,
};
use eqs_dry_tests::{manager_for, world_with_querier, FakeClock};
use serde_json::json;

fn keep_away_desc() -> TemplateDesc {
    serde_json::from_value(json!({
        "name": "keep_away",
        "options": [{
            "generator": { "kind": "simple_grid", "half_size": 10.0, "spacing": 10.0 },
            "tests": [{
                "kind": "distance",
                "context": { "kind": "actors_with_tag", "tag": "enemy" },
                "config": {
                    "purpose": "filter_and_score",
                    "filter_type": "minimum",
                    "float_min": { "param": "min_range" }
                }
            }]
        }]
    }))
    .unwrap()
}

#[test]
fn json_template_runs_through_the_manager() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    world.spawn(Vec3::new(40.0, 0.0, 0.0), &["enemy"]);
    let mut manager = manager_for(world.clone(), &clock, ManagerConfig::default());

    let mut registry = Registry::with_builtins();
    registry.add_template(keep_away_desc());
    assert_eq!(registry.install(&mut manager).unwrap(), 1);

    let all = manager
        .run_instant_query(
            QueryRequest::new("keep_away", owner)
                .with_run_mode(RunMode::AllMatching)
                .with_params(QueryParams::new().with("min_range", 35.0)),
        )
        .unwrap();
    assert_eq!(all.status, QueryStatus::Success);
    assert_eq!(all.items.len(), 6);

    let best = manager
        .run_instant_query(
            QueryRequest::new("keep_away", owner)
                .with_params(QueryParams::new().with("min_range", 35.0)),
        )
        .unwrap();
    assert_eq!(best.locations(world.as_ref()), vec![Vec3::new(-10.0, -10.0, 0.0)]);
}

#[test]
fn missing_json_param_is_reported() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    world.spawn(Vec3::new(40.0, 0.0, 0.0), &["enemy"]);
    let mut manager = manager_for(world, &clock, ManagerConfig::default());
    let mut registry = Registry::with_builtins();
    registry.add_template(keep_away_desc());
    registry.install(&mut manager).unwrap();

    let result = manager
        .run_instant_query(QueryRequest::new("keep_away", owner))
        .unwrap();
    assert_eq!(result.status, QueryStatus::MissingParam);
    assert!(result.items.is_empty());
}

#[test]
fn host_registered_kinds_build_like_builtins() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, ManagerConfig::default());
    let mut registry = Registry::with_builtins();
    registry.register_generator("line", |settings, _| {
        let xs: Vec<f32> = serde_json::from_value(settings.get("xs").cloned().unwrap_or_default())
            .map_err(|source| RegistryError::InvalidSettings {
                kind: "line".to_owned(),
                source,
            })?;
        Ok(Arc::new(CurrentLocationGenerator {
            context: Arc::new(FixedLocationsContext {
                locations: xs.into_iter().map(|x| Vec3::new(x, 0.0, 0.0)).collect(),
            }),
        }) as GeneratorRef)
    });
    registry.add_template(
        serde_json::from_value(json!({
            "name": "custom",
            "options": [{ "generator": { "kind": "line", "xs": [3.0, 1.0, 2.0] },
                          "tests": [{ "kind": "distance", "config": { "purpose": "score" } }] }]
        }))
        .unwrap(),
    );
    assert!(registry.catalog().generators.contains(&"line".to_owned()));
    registry.install(&mut manager).unwrap();
    let result = manager
        .run_instant_query(QueryRequest::new("custom", owner).with_run_mode(RunMode::AllMatching))
        .unwrap();
    assert_eq!(result.items.len(), 3);
    assert!(result.scores().windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn unknown_template_and_broken_refresh_surface_errors() {
    let mut registry = Registry::with_builtins();
    assert!(matches!(
        registry.template("nope"),
        Err(RegistryError::UnknownTemplate(name)) if name == "nope"
    ));
    registry.add_template(
        serde_json::from_value(json!({
            "name": "broken",
            "options": [{ "generator": { "kind": "current_location" },
                          "tests": [{ "kind": "psychic" }] }]
        }))
        .unwrap(),
    );
    assert!(matches!(
        registry.refresh(),
        Err(RegistryError::UnknownTest(kind)) if kind == "psychic"
    ));
}
