// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;

use eqs_core::item_tests::{HasTagTest, TestDef};
use eqs_core::{
    ActorsWithTagContext, ClampType, FilterType, FloatParam, QueryId, QueryInstance, QueryParams,
    QueryResult, QueryStatus, QueryTemplate, RunMode, ScoreEquation, SimpleWorld, SystemClock,
    TestConfig, TestPurpose, DEFAULT_QUERY_SEED,
};
use eqs_core::generators::ActorsWithTagGenerator;
use eqs_core::math::Vec3;
use eqs_dry_tests::{distance_test, line_generator, world_with_querier, LocationXTest};

fn run_all_matching(template: &QueryTemplate) -> (QueryResult, Arc<SimpleWorld>) {
    let (world, owner) = world_with_querier();
    let mut instance = QueryInstance::new(
        QueryId(1),
        template,
        owner,
        world.clone(),
        QueryParams::new(),
        RunMode::AllMatching,
        DEFAULT_QUERY_SEED,
    );
    instance.run_to_completion(&SystemClock::new());
    (instance.result(), world)
}

fn xs(result: &QueryResult, world: &SimpleWorld) -> Vec<f32> {
    result.locations(world).iter().map(Vec3::x).collect()
}

#[test]
fn range_filter_discards_outliers_and_scores_linearly() {
    let config = TestConfig {
        purpose: TestPurpose::FilterAndScore,
        filter_type: FilterType::Range,
        float_min: FloatParam::Value(10.0),
        float_max: FloatParam::Value(50.0),
        equation: ScoreEquation::Linear,
        ..TestConfig::default()
    };
    let template = QueryTemplate::new("range").with_option(
        line_generator(&[5.0, 10.0, 30.0, 50.0, 80.0]),
        vec![distance_test(config)],
    );
    let (result, world) = run_all_matching(&template);
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.scores(), vec![1.0, 0.5, 0.0]);
    assert_eq!(xs(&result, &world), vec![50.0, 30.0, 10.0]);
}

#[test]
fn specified_clamps_bound_normalization() {
    let config = TestConfig {
        clamp_min: ClampType::SpecifiedValue(FloatParam::Value(20.0)),
        clamp_max: ClampType::SpecifiedValue(FloatParam::Value(40.0)),
        ..TestConfig::scoring(ScoreEquation::Linear, 1.0)
    };
    let template = QueryTemplate::new("clamped")
        .with_option(line_generator(&[10.0, 30.0, 50.0]), vec![distance_test(config)]);
    let (result, world) = run_all_matching(&template);
    assert_eq!(result.scores(), vec![1.0, 0.5, 0.0]);
    assert_eq!(xs(&result, &world), vec![50.0, 30.0, 10.0]);
}

#[test]
fn filter_threshold_clamp_uses_the_filter_bounds() {
    let config = TestConfig {
        purpose: TestPurpose::FilterAndScore,
        filter_type: FilterType::Range,
        float_min: FloatParam::Value(0.0),
        float_max: FloatParam::Value(40.0),
        clamp_min: ClampType::FilterThreshold,
        clamp_max: ClampType::FilterThreshold,
        ..TestConfig::default()
    };
    let template = QueryTemplate::new("threshold")
        .with_option(line_generator(&[10.0, 20.0, 50.0]), vec![distance_test(config)]);
    let (result, world) = run_all_matching(&template);
    assert_eq!(result.scores(), vec![0.5, 0.25]);
    assert_eq!(xs(&result, &world), vec![20.0, 10.0]);
}

#[test]
fn identical_readings_leave_scores_untouched() {
    let template = QueryTemplate::new("flat").with_option(
        line_generator(&[7.0, -7.0, 7.0]),
        vec![distance_test(TestConfig::scoring(ScoreEquation::Linear, 3.0))],
    );
    let (result, world) = run_all_matching(&template);
    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(result.scores(), vec![0.0, 0.0, 0.0]);
    // Ties keep generation order.
    assert_eq!(xs(&result, &world), vec![7.0, -7.0, 7.0]);
}

#[test]
fn inverse_linear_with_negative_factor_inverts_twice() {
    let inverse = TestConfig::scoring(ScoreEquation::InverseLinear, -1.0);
    let template = QueryTemplate::new("double")
        .with_option(line_generator(&[10.0, 30.0, 50.0]), vec![distance_test(inverse)]);
    let (result, world) = run_all_matching(&template);
    assert_eq!(result.scores(), vec![0.0, -0.5, -1.0]);

    let linear = QueryTemplate::new("linear").with_option(
        line_generator(&[10.0, 30.0, 50.0]),
        vec![distance_test(TestConfig::scoring(ScoreEquation::Linear, 1.0))],
    );
    let (reference, _) = run_all_matching(&linear);
    assert_eq!(xs(&result, &world), xs(&reference, &world));
}

#[test]
fn scores_from_several_tests_accumulate() {
    let template = QueryTemplate::new("sum").with_option(
        line_generator(&[-10.0, 0.0, 10.0]),
        vec![
            distance_test(TestConfig::scoring(ScoreEquation::Linear, 1.0)),
            TestDef::new(
                TestConfig::scoring(ScoreEquation::Linear, 2.0),
                Arc::new(LocationXTest),
            ),
        ],
    );
    let (result, world) = run_all_matching(&template);
    // distance: 1, 0, 1; x: 0, 1, 2. Ties keep generation order.
    assert_eq!(xs(&result, &world), vec![10.0, -10.0, 0.0]);
    assert_eq!(result.scores(), vec![3.0, 1.0, 1.0]);
}

#[test]
fn boolean_match_filters_actor_items() {
    let (world, owner) = world_with_querier();
    let friend = world.spawn(Vec3::new(1.0, 0.0, 0.0), &["unit", "friendly"]);
    world.spawn(Vec3::new(2.0, 0.0, 0.0), &["unit"]);
    let generator = Arc::new(ActorsWithTagGenerator {
        tag: "unit".to_owned(),
        context: Arc::new(ActorsWithTagContext::new("querier")),
        radius: FloatParam::Value(-1.0),
    });
    let template = QueryTemplate::new("friends").with_option(
        generator,
        vec![TestDef::new(
            TestConfig::matching(true),
            Arc::new(HasTagTest {
                tag: "friendly".to_owned(),
            }),
        )],
    );
    let mut instance = QueryInstance::new(
        QueryId(9),
        &template,
        owner,
        world,
        QueryParams::new(),
        RunMode::AllMatching,
        DEFAULT_QUERY_SEED,
    );
    instance.run_to_completion(&SystemClock::new());
    assert_eq!(instance.result().actors(), vec![friend]);
}

#[test]
fn named_thresholds_read_request_params() {
    let config = TestConfig {
        purpose: TestPurpose::Filter,
        filter_type: FilterType::Maximum,
        float_max: FloatParam::named("max_range"),
        ..TestConfig::default()
    };
    let template = QueryTemplate::new("named")
        .with_option(line_generator(&[5.0, 15.0, 25.0]), vec![distance_test(config)]);
    let (world, owner) = world_with_querier();
    let mut instance = QueryInstance::new(
        QueryId(2),
        &template,
        owner,
        world,
        QueryParams::new().with("max_range", 20.0),
        RunMode::AllMatching,
        DEFAULT_QUERY_SEED,
    );
    instance.run_to_completion(&SystemClock::new());
    assert_eq!(instance.result().items.len(), 2);
}

#[test]
fn missing_named_param_fails_the_query() {
    let config = TestConfig {
        factor: FloatParam::named("weight"),
        ..TestConfig::scoring(ScoreEquation::Linear, 1.0)
    };
    let template = QueryTemplate::new("strict")
        .with_option(line_generator(&[1.0, 2.0]), vec![distance_test(config)]);
    let (world, owner) = world_with_querier();
    let mut instance = QueryInstance::new(
        QueryId(3),
        &template,
        owner,
        world,
        QueryParams::new(),
        RunMode::AllMatching,
        DEFAULT_QUERY_SEED,
    );
    instance.run_to_completion(&SystemClock::new());
    assert_eq!(instance.status(), QueryStatus::MissingParam);
    assert!(instance.failure().unwrap().contains("weight"));
    assert!(instance.result().items.is_empty());
}
