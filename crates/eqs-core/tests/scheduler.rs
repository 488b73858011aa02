// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use eqs_core::item_tests::TestDef;
use eqs_core::math::Vec3;
use eqs_core::{
    ActorHandle, FloatParam, ManagerConfig, QueryRequest, QueryStatus, QueryTemplate,
    RecordingDebugSink, RunMode, ScoreEquation, SimpleWorld, TestConfig, WorldId,
};
use eqs_dry_tests::{
    distance_test, line_generator, manager_for, world_with_querier, CallbackLog, CostedGenerator,
    CostedTest, CountingTest, FakeClock, LocationXTest,
};

const MS: Duration = Duration::from_millis(1);

fn budget(breadth: bool, millis: u64) -> ManagerConfig {
    ManagerConfig {
        max_allowed_testing_time: Duration::from_millis(millis),
        test_queries_using_breadth: breadth,
        ..ManagerConfig::default()
    }
}

fn costed_score(clock: &FakeClock) -> TestDef {
    TestDef::new(
        TestConfig::scoring(ScoreEquation::Linear, 1.0),
        Arc::new(CostedTest::new(Arc::new(LocationXTest), clock.clone(), MS)),
    )
}

/// One item, a 1 ms generator and eight 1 ms tests: nine 1 ms steps.
fn nine_step_template(clock: &FakeClock) -> QueryTemplate {
    let generator = Arc::new(CostedGenerator::new(line_generator(&[1.0]), clock.clone(), MS));
    QueryTemplate::new("nine").with_option(generator, (0..8).map(|_| costed_score(clock)).collect())
}

/// Exhaustive request for [`nine_step_template`]; a lone item would
/// otherwise end single-result search after its first test.
fn nine(owner: ActorHandle) -> QueryRequest {
    QueryRequest::new("nine", owner).with_run_mode(RunMode::AllMatching)
}

/// Ten items scored by one 1 ms-per-item test, counted.
fn slow_scan_template(clock: &FakeClock) -> (QueryTemplate, CountingTest) {
    let counter = CountingTest::new(Arc::new(CostedTest::new(
        Arc::new(LocationXTest),
        clock.clone(),
        MS,
    )));
    let xs: Vec<f32> = (1..=10).map(|i| i as f32).collect();
    let template = QueryTemplate::new("scan").with_option(
        line_generator(&xs),
        vec![TestDef::new(
            TestConfig::scoring(ScoreEquation::Linear, 1.0),
            Arc::new(counter.clone()),
        )],
    );
    (template, counter)
}

#[test]
fn breadth_first_shares_each_tick_evenly() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let ids: Vec<_> = (0..3)
        .map(|_| {
            manager
                .run_query(nine(owner), log.callback())
                .unwrap()
        })
        .collect();

    let mut spent = Duration::ZERO;
    for tick in 1..=9 {
        let report = manager.tick(Duration::from_millis(16));
        assert_eq!(report.steps, 3, "tick {tick}");
        assert_eq!(report.budget_spent, Duration::from_millis(3), "tick {tick}");
        spent += report.budget_spent;
        let expected_finished = if tick == 9 { 3 } else { 0 };
        assert_eq!(report.finished, expected_finished, "tick {tick}");
    }
    assert_eq!(spent, Duration::from_millis(27));
    assert_eq!(manager.num_running(), 0);
    for id in ids {
        assert_eq!(log.count_for(id), 1);
        assert_eq!(log.result_for(id).unwrap().status, QueryStatus::Success);
    }

    let reference = manager
        .run_instant_query(nine(owner))
        .unwrap();
    for result in log.results() {
        assert_eq!(result.items, reference.items);
        assert_eq!(result.option_index, reference.option_index);
    }
}

#[test]
fn depth_first_finishes_queries_one_after_another() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(false, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let ids: Vec<_> = (0..3)
        .map(|_| {
            manager
                .run_query(nine(owner), log.callback())
                .unwrap()
        })
        .collect();

    let mut finished_at = Vec::new();
    for tick in 1..=9 {
        if manager.tick(MS).finished > 0 {
            finished_at.push(tick);
        }
    }
    assert_eq!(finished_at, vec![3, 6, 9]);
    let order: Vec<_> = log.results().iter().map(|result| result.query_id).collect();
    assert_eq!(order, ids);
}

#[test]
fn paused_test_pass_resumes_where_it_stopped() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    let (template, counter) = slow_scan_template(&clock);
    manager.add_template(template);
    let log = CallbackLog::new();
    let id = manager
        .run_query(
            QueryRequest::new("scan", owner).with_run_mode(RunMode::AllMatching),
            log.callback(),
        )
        .unwrap();

    let mut ticks = 0;
    while log.result_for(id).is_none() {
        let report = manager.tick(MS);
        assert!(report.budget_spent <= Duration::from_millis(3));
        ticks += 1;
        assert!(ticks < 10, "query never finished");
    }
    assert_eq!(ticks, 4);
    assert_eq!(counter.calls(), 10);

    let streamed = log.result_for(id).unwrap();
    let instant = manager
        .run_instant_query(QueryRequest::new("scan", owner).with_run_mode(RunMode::AllMatching))
        .unwrap();
    assert_eq!(streamed.items, instant.items);
    assert_eq!(streamed.scores().first(), Some(&1.0));
    assert_eq!(streamed.items.len(), 10);
}

#[test]
fn callbacks_fire_exactly_once() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let id = manager
        .run_query(nine(owner), log.callback())
        .unwrap();
    for _ in 0..20 {
        manager.tick(MS);
    }
    assert_eq!(log.count_for(id), 1);
    assert!(!manager.abort_query(id));
    assert_eq!(log.len(), 1);
}

#[test]
fn abort_notifies_immediately() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let id = manager
        .run_query(nine(owner), log.callback())
        .unwrap();
    manager.tick(MS);
    assert!(manager.abort_query(id));
    let result = log.result_for(id).unwrap();
    assert_eq!(result.status, QueryStatus::Aborted);
    assert!(result.items.is_empty());
    assert!(!manager.abort_query(id));
    manager.tick(MS);
    assert_eq!(manager.num_running(), 0);
    assert_eq!(log.len(), 1);
}

#[test]
fn removing_by_querier_can_stay_silent() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let other = world.spawn(Vec3::new(5.0, 0.0, 0.0), &["querier"]);
    let mut manager = manager_for(world, &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    for _ in 0..2 {
        manager
            .run_query(nine(owner), log.callback())
            .unwrap();
    }
    let survivor = manager
        .run_query(nine(other), log.callback())
        .unwrap();

    assert_eq!(manager.remove_all_queries_by_querier(owner, false), 2);
    assert!(log.is_empty());
    for _ in 0..20 {
        manager.tick(MS);
    }
    assert_eq!(log.len(), 1);
    assert_eq!(log.results()[0].query_id, survivor);
    assert_eq!(manager.remove_all_queries_by_querier(owner, true), 0);
}

#[test]
fn world_cleanup_fails_only_that_world() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let second = Arc::new(SimpleWorld::new(WorldId(2)));
    let second_owner = second.spawn(Vec3::ZERO, &["querier"]);
    let mut manager = manager_for(world, &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let doomed = manager
        .run_query(nine(owner), log.callback())
        .unwrap();
    let kept = manager
        .run_query(
            nine(second_owner).with_world(second),
            log.callback(),
        )
        .unwrap();
    manager.tick(MS);

    assert_eq!(manager.on_world_cleanup(WorldId(1)), 1);
    assert_eq!(log.result_for(doomed).unwrap().status, QueryStatus::Failed);
    assert_eq!(manager.num_running(), 1);
    assert_eq!(manager.status(kept), Some(QueryStatus::Processing));
    assert_eq!(manager.on_world_cleanup(WorldId(1)), 0);
}

#[test]
fn owner_despawned_mid_query_is_reported() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world.clone(), &clock, budget(true, 3));
    let (template, counter) = slow_scan_template(&clock);
    manager.add_template(template);
    let log = CallbackLog::new();
    let id = manager
        .run_query(QueryRequest::new("scan", owner), log.callback())
        .unwrap();
    manager.tick(MS);
    assert_eq!(counter.calls(), 3);

    world.despawn(owner);
    manager.tick(MS);
    let result = log.result_for(id).unwrap();
    assert_eq!(result.status, QueryStatus::OwnerLost);
    assert!(result.items.is_empty());
    assert_eq!(counter.calls(), 3);
}

#[test]
fn unknown_template_or_owner_is_rejected() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world.clone(), &clock, budget(true, 3));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    assert!(manager
        .run_query(QueryRequest::new("missing", owner), log.callback())
        .is_none());
    world.despawn(owner);
    assert!(manager
        .run_query(nine(owner), log.callback())
        .is_none());
    assert!(manager.run_instant_query(nine(owner)).is_none());
    assert!(log.is_empty());
    assert_eq!(manager.num_running(), 0);
}

#[test]
fn query_count_warning_is_rate_limited() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let config = ManagerConfig {
        max_allowed_testing_time: Duration::ZERO,
        query_count_warning_threshold: 2,
        query_count_warning_interval: Duration::from_secs(1),
        ..ManagerConfig::default()
    };
    let mut manager = manager_for(world, &clock, config);
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    for _ in 0..3 {
        manager
            .run_query(nine(owner), log.callback())
            .unwrap();
    }
    let frame = Duration::from_millis(100);
    for _ in 0..10 {
        assert_eq!(manager.tick(frame).steps, 0);
    }
    assert_eq!(manager.query_count_warnings(), 1);
    manager.tick(frame);
    assert_eq!(manager.query_count_warnings(), 2);
}

#[test]
fn debug_sink_and_stats_see_finished_queries() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    let sink = RecordingDebugSink::new(4);
    manager.set_debug_sink(Box::new(sink.clone()));
    let (template, _) = slow_scan_template(&clock);
    manager.add_template(template);
    let log = CallbackLog::new();
    let id = manager
        .run_query(
            QueryRequest::new("scan", owner).with_run_mode(RunMode::AllMatching),
            log.callback(),
        )
        .unwrap();
    for _ in 0..4 {
        manager.tick(MS);
    }

    let debug = sink.find(id).unwrap();
    assert_eq!(debug.record.status, QueryStatus::Success);
    assert_eq!(debug.record.performed_tests, vec!["location_x"]);
    assert_eq!(debug.record.num_results, 10);
    assert_eq!(debug.record.total_execution_time, Duration::from_millis(10));
    assert_eq!(debug.steps.len(), 1);
    assert_eq!(debug.steps[0].items.len(), 10);

    let stats = manager.stats("scan").unwrap();
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.last_status, Some(QueryStatus::Success));
    assert_eq!(stats.max_execution_time, Duration::from_millis(10));
}

#[test]
fn debug_history_installs_a_bounded_recorder() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let config = ManagerConfig {
        debug_history: 2,
        ..ManagerConfig::default()
    };
    let mut manager = manager_for(world, &clock, config);
    manager.add_template(
        QueryTemplate::new("line").with_option(line_generator(&[1.0, 2.0]), Vec::new()),
    );
    let ids: Vec<_> = (0..3)
        .map(|_| {
            manager
                .run_instant_query(QueryRequest::new("line", owner))
                .unwrap()
                .query_id
        })
        .collect();

    let recorder = manager.debug_recorder().unwrap();
    let kept: Vec<_> = recorder.history().iter().map(|q| q.record.query_id).collect();
    assert_eq!(kept, ids[1..]);

    manager.set_debug_sink(Box::new(RecordingDebugSink::new(1)));
    assert!(manager.debug_recorder().is_none());
}

#[test]
fn zero_debug_history_records_nothing() {
    let clock = FakeClock::new();
    let (world, _) = world_with_querier();
    let manager = manager_for(world, &clock, ManagerConfig::default());
    assert!(manager.debug_recorder().is_none());
}

#[test]
fn debug_record_lists_tests_of_the_option_that_stopped() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let config = ManagerConfig {
        debug_history: 1,
        ..ManagerConfig::default()
    };
    let mut manager = manager_for(world, &clock, config);
    let weighted = TestConfig {
        factor: FloatParam::named("weight"),
        ..TestConfig::scoring(ScoreEquation::Linear, 1.0)
    };
    manager.add_template(
        QueryTemplate::new("weighted")
            .with_option(line_generator(&[1.0]), vec![distance_test(weighted)])
            .with_option(
                line_generator(&[2.0]),
                vec![TestDef::new(
                    TestConfig::scoring(ScoreEquation::Linear, 1.0),
                    Arc::new(LocationXTest),
                )],
            ),
    );
    let result = manager
        .run_instant_query(QueryRequest::new("weighted", owner))
        .unwrap();
    assert_eq!(result.status, QueryStatus::MissingParam);

    let debug = manager.debug_recorder().unwrap().last().unwrap();
    assert_eq!(debug.record.option_index, None);
    assert_eq!(debug.record.performed_tests, vec!["distance"]);
}

#[test]
fn sweeping_an_aborted_query_keeps_round_robin_order() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 1));
    manager.add_template(nine_step_template(&clock));
    let log = CallbackLog::new();
    let ids: Vec<_> = (0..3)
        .map(|_| manager.run_query(nine(owner), log.callback()).unwrap())
        .collect();

    assert_eq!(manager.tick(MS).steps, 1);
    assert!(manager.abort_query(ids[0]));

    let mut finished_at = Vec::new();
    for tick in 2..=30 {
        let before = log.len();
        manager.tick(MS);
        if log.len() > before {
            finished_at.push((tick, log.results().last().unwrap().query_id));
        }
        if manager.num_running() == 0 {
            break;
        }
    }
    assert_eq!(finished_at, vec![(18, ids[1]), (19, ids[2])]);
}

#[test]
fn overrunning_step_ends_the_tick() {
    let clock = FakeClock::new();
    let (world, owner) = world_with_querier();
    let mut manager = manager_for(world, &clock, budget(true, 3));
    let slow_generation = 5 * MS;
    let generator = Arc::new(CostedGenerator::new(
        line_generator(&[1.0]),
        clock.clone(),
        slow_generation,
    ));
    manager.add_template(
        QueryTemplate::new("slow").with_option(generator, vec![costed_score(&clock)]),
    );
    let log = CallbackLog::new();
    let first = manager
        .run_query(QueryRequest::new("slow", owner), log.callback())
        .unwrap();
    let second = manager
        .run_query(QueryRequest::new("slow", owner), log.callback())
        .unwrap();

    let report = manager.tick(MS);
    assert_eq!(report.steps, 1);
    assert_eq!(report.budget_spent, slow_generation);
    assert!(report.budget_spent <= Duration::from_millis(3) + slow_generation);
    assert_eq!(manager.status(first), Some(QueryStatus::Processing));

    let report = manager.tick(MS);
    assert_eq!(report.steps, 1);
    assert_eq!(report.budget_spent, slow_generation);

    let report = manager.tick(MS);
    assert_eq!(report.steps, 2);
    assert_eq!(report.finished, 2);
    assert_eq!(report.budget_spent, 2 * MS);
    assert!(log.result_for(first).unwrap().is_success());
    assert!(log.result_for(second).unwrap().is_success());
}
