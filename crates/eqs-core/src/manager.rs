// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cooperative, time-sliced scheduler for many concurrent queries.
//!
//! Every [`QueryManager::tick`] gets the same fixed budget
//! ([`ManagerConfig::max_allowed_testing_time`]). Steps are charged their
//! own duration only: time spent in debug capture and completion callbacks
//! is measured but never subtracted from the budget. The budget is checked
//! between steps, so one step may overrun it.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, StepBudget};
use crate::config::ManagerConfig;
use crate::debug::{capture_query, capture_test_step, DebugSink, RecordingDebugSink};
use crate::ident::{ActorHandle, QueryId, WorldId};
use crate::instance::{QueryInstance, QueryStatus, RunMode, StepEvent, DEFAULT_QUERY_SEED};
use crate::params::QueryParams;
use crate::result::QueryResult;
use crate::template::QueryTemplate;
use crate::world::World;

/// Completion callback; invoked exactly once per accepted request.
pub type QueryCallback = Box<dyn FnOnce(&QueryResult)>;

/// A request to run a registered template.
#[derive(Clone)]
pub struct QueryRequest {
    /// Template name.
    pub template: String,
    /// Requesting actor.
    pub owner: ActorHandle,
    /// World override; the manager's world otherwise.
    pub world: Option<Arc<dyn World>>,
    /// Named parameters.
    pub params: QueryParams,
    /// Result selection.
    pub run_mode: RunMode,
    /// Seed for random selection and random tests.
    pub seed: Option<u64>,
}

impl std::fmt::Debug for QueryRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRequest")
            .field("template", &self.template)
            .field("owner", &self.owner)
            .field("world", &self.world.as_ref().map(|world| world.id()))
            .field("params", &self.params)
            .field("run_mode", &self.run_mode)
            .field("seed", &self.seed)
            .finish()
    }
}

impl QueryRequest {
    /// Single-result request without parameters.
    pub fn new(template: impl Into<String>, owner: ActorHandle) -> Self {
        Self {
            template: template.into(),
            owner,
            world: None,
            params: QueryParams::new(),
            run_mode: RunMode::SingleResult,
            seed: None,
        }
    }

    /// Sets the run mode.
    pub fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    /// Sets the named parameters.
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    /// Runs against `world` instead of the manager's world.
    pub fn with_world(mut self, world: Arc<dyn World>) -> Self {
        self.world = Some(world);
        self
    }

    /// Fixes the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Steps executed.
    pub steps: u32,
    /// Queries that reached a terminal status during the tick.
    pub finished: u32,
    /// Budget charged: step time, excluding callbacks and debug capture.
    pub budget_spent: Duration,
}

/// Aggregates per template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Finished queries.
    pub runs: u64,
    /// Sum of execution times.
    pub total_execution_time: Duration,
    /// Slowest query.
    pub max_execution_time: Duration,
    /// Status of the most recent query.
    pub last_status: Option<QueryStatus>,
}

impl QueryStats {
    fn record(&mut self, instance: &QueryInstance) {
        let spent = instance.timing().total_execution_time;
        self.runs += 1;
        self.total_execution_time += spent;
        self.max_execution_time = self.max_execution_time.max(spent);
        self.last_status = Some(instance.status());
    }
}

/// Statistics and the optional debug sink, fed outside the timed regions.
#[derive(Default)]
struct Observers {
    stats: BTreeMap<String, QueryStats>,
    debug: Option<Box<dyn DebugSink>>,
}

impl Observers {
    fn on_step(&mut self, instance: &QueryInstance) {
        if let (Some(sink), Some(StepEvent::TestCompleted { option, test })) =
            (self.debug.as_mut(), instance.last_event())
        {
            sink.record_test_step(capture_test_step(instance, option, test));
        }
    }

    fn on_finished(&mut self, config: &ManagerConfig, instance: &QueryInstance) {
        let spent = instance.timing().total_execution_time;
        if !config.execution_time_warning.is_zero() && spent > config.execution_time_warning {
            tracing::warn!(
                query = %instance.id(),
                template = instance.template(),
                spent_ms = spent.as_secs_f64() * 1000.0,
                "query exceeded execution time warning"
            );
        }
        self.stats
            .entry(instance.template().to_owned())
            .or_default()
            .record(instance);
        if let Some(sink) = self.debug.as_mut() {
            sink.record_query_finished(capture_query(instance));
        }
    }
}

struct RunningQuery {
    instance: QueryInstance,
    callback: Option<QueryCallback>,
}

/// Owns in-flight queries and interleaves their steps under a per-tick
/// budget.
pub struct QueryManager {
    config: ManagerConfig,
    clock: Arc<dyn Clock>,
    world: Arc<dyn World>,
    templates: BTreeMap<String, Arc<QueryTemplate>>,
    running: Vec<RunningQuery>,
    next_id: u64,
    breadth_cursor: usize,
    pending_removals: usize,
    observers: Observers,
    recorder: Option<RecordingDebugSink>,
    tick_time: Duration,
    last_count_warning: Option<Duration>,
    count_warnings: u32,
}

impl std::fmt::Debug for QueryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryManager")
            .field("config", &self.config)
            .field("world", &self.world.id())
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .field("running", &self.running.len())
            .finish_non_exhaustive()
    }
}

impl QueryManager {
    /// Manager for `world`, timing steps with `clock`.
    pub fn new(config: ManagerConfig, world: Arc<dyn World>, clock: Arc<dyn Clock>) -> Self {
        tracing::info!(
            budget_ms = config.max_allowed_testing_time.as_secs_f64() * 1000.0,
            breadth_first = config.test_queries_using_breadth,
            "query manager created"
        );
        let recorder =
            (config.debug_history > 0).then(|| RecordingDebugSink::new(config.debug_history));
        let observers = Observers {
            debug: recorder
                .clone()
                .map(|sink| Box::new(sink) as Box<dyn DebugSink>),
            ..Observers::default()
        };
        Self {
            config,
            clock,
            world,
            templates: BTreeMap::new(),
            running: Vec::new(),
            next_id: 1,
            breadth_cursor: 0,
            pending_removals: 0,
            observers,
            recorder,
            tick_time: Duration::ZERO,
            last_count_warning: None,
            count_warnings: 0,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Replaces the configuration; takes effect on the next tick.
    pub fn set_config(&mut self, config: ManagerConfig) {
        self.config = config;
    }

    /// Installs a debug sink, replacing the built-in recorder.
    pub fn set_debug_sink(&mut self, sink: Box<dyn DebugSink>) {
        self.recorder = None;
        self.observers.debug = Some(sink);
    }

    /// Recorder installed when [`ManagerConfig::debug_history`] is non-zero.
    pub fn debug_recorder(&self) -> Option<&RecordingDebugSink> {
        self.recorder.as_ref()
    }

    /// Registers (or replaces) a template under its name.
    pub fn add_template(&mut self, template: impl Into<Arc<QueryTemplate>>) {
        let template = template.into();
        self.templates.insert(template.name().to_owned(), template);
    }

    /// Removes every registered template; running queries keep their copies.
    pub fn clear_templates(&mut self) {
        self.templates.clear();
    }

    /// Looks up a template.
    pub fn template(&self, name: &str) -> Option<&Arc<QueryTemplate>> {
        self.templates.get(name)
    }

    /// Queries not yet swept, finished ones included.
    pub fn num_running(&self) -> usize {
        self.running.len()
    }

    /// Statistics for `template`.
    pub fn stats(&self, template: &str) -> Option<&QueryStats> {
        self.observers.stats.get(template)
    }

    /// Query-count warnings emitted so far.
    pub fn query_count_warnings(&self) -> u32 {
        self.count_warnings
    }

    /// Status of a query still held by the manager.
    pub fn status(&self, id: QueryId) -> Option<QueryStatus> {
        self.running
            .iter()
            .find(|query| query.instance.id() == id)
            .map(|query| query.instance.status())
    }

    fn create_instance(&mut self, request: QueryRequest) -> Option<QueryInstance> {
        let Some(template) = self.templates.get(&request.template).cloned() else {
            tracing::warn!(template = request.template.as_str(), "unknown query template");
            return None;
        };
        let world = request.world.unwrap_or_else(|| Arc::clone(&self.world));
        if !world.is_alive(request.owner) {
            tracing::warn!(template = request.template.as_str(), owner = %request.owner, "query owner not found");
            return None;
        }
        let id = QueryId(self.next_id);
        self.next_id += 1;
        Some(QueryInstance::new(
            id,
            &template,
            request.owner,
            world,
            request.params,
            request.run_mode,
            request.seed.unwrap_or(DEFAULT_QUERY_SEED),
        ))
    }

    /// Schedules a query; `None` when the template or owner is unknown.
    pub fn run_query(
        &mut self,
        request: QueryRequest,
        on_finished: impl FnOnce(&QueryResult) + 'static,
    ) -> Option<QueryId> {
        let instance = self.create_instance(request)?;
        let id = instance.id();
        tracing::debug!(query = %id, template = instance.template(), "query scheduled");
        self.running.push(RunningQuery {
            instance,
            callback: Some(Box::new(on_finished)),
        });
        Some(id)
    }

    /// Runs a query to completion right now, ignoring the budget.
    pub fn run_instant_query(&mut self, request: QueryRequest) -> Option<QueryResult> {
        let mut instance = self.create_instance(request)?;
        let clock = Arc::clone(&self.clock);
        while !instance.is_finished() {
            instance.execute_one_step(StepBudget::Unbounded, clock.as_ref());
            self.observers.on_step(&instance);
        }
        self.observers.on_finished(&self.config, &instance);
        Some(instance.result())
    }

    /// Records a finished query and fires its callback, once.
    fn complete(&mut self, index: usize, notify: bool) {
        let query = &mut self.running[index];
        let callback = query.callback.take();
        let result = query.instance.result();
        tracing::debug!(query = %result.query_id, status = ?result.status, "query finished");
        self.observers.on_finished(&self.config, &query.instance);
        self.pending_removals += 1;
        if notify {
            if let Some(callback) = callback {
                callback(&result);
            }
        }
    }

    fn update_count_warning(&mut self, delta: Duration) {
        self.tick_time += delta;
        let threshold = self.config.query_count_warning_threshold;
        if threshold == 0 || self.running.len() <= threshold {
            return;
        }
        let due = self.last_count_warning.is_none_or(|last| {
            self.tick_time.saturating_sub(last) >= self.config.query_count_warning_interval
        });
        if due {
            tracing::warn!(running = self.running.len(), threshold, "too many running queries");
            self.last_count_warning = Some(self.tick_time);
            self.count_warnings += 1;
        }
    }

    fn next_index(&mut self) -> Option<usize> {
        let len = self.running.len();
        if self.config.test_queries_using_breadth {
            for offset in 0..len {
                let index = (self.breadth_cursor + offset) % len;
                if !self.running[index].instance.is_finished() {
                    self.breadth_cursor = (index + 1) % len;
                    return Some(index);
                }
            }
            None
        } else {
            self.running
                .iter()
                .position(|query| !query.instance.is_finished())
        }
    }

    /// Spends up to the configured budget stepping running queries.
    ///
    /// `delta` is the frame time; it feeds the query-count warning interval
    /// only and does not scale the budget.
    pub fn tick(&mut self, delta: Duration) -> TickReport {
        self.update_count_warning(delta);
        let budget = self.config.max_allowed_testing_time;
        let clock = Arc::clone(&self.clock);
        let mut report = TickReport::default();
        while report.budget_spent < budget {
            let Some(index) = self.next_index() else {
                break;
            };
            let remaining = budget.saturating_sub(report.budget_spent);
            let started = clock.now();
            self.running[index]
                .instance
                .execute_one_step(StepBudget::Limited(remaining), clock.as_ref());
            let step_time = clock.now().saturating_sub(started);
            report.budget_spent += step_time;
            report.steps += 1;

            self.observers.on_step(&self.running[index].instance);
            if self.running[index].instance.is_finished() {
                report.finished += 1;
                self.complete(index, true);
            }
        }
        self.sweep();
        report
    }

    /// Drops the `pending_removals` finished entries. Only the tail starting
    /// at the first finished entry is compacted.
    fn sweep(&mut self) {
        let pending = std::mem::take(&mut self.pending_removals);
        if pending == 0 {
            return;
        }
        let Some(first) = self
            .running
            .iter()
            .position(|query| query.instance.is_finished())
        else {
            return;
        };
        let cursor = self.breadth_cursor.min(self.running.len());
        let before_cursor = self.running[first.min(cursor)..cursor]
            .iter()
            .filter(|query| query.instance.is_finished())
            .count();
        let mut tail = self.running.split_off(first);
        let tail_len = tail.len();
        tail.retain(|query| !query.instance.is_finished());
        debug_assert_eq!(tail_len - tail.len(), pending, "finished entries out of sync with removals");
        self.running.append(&mut tail);
        self.breadth_cursor = match self.running.len() {
            0 => 0,
            len => (cursor - before_cursor) % len,
        };
    }

    /// Aborts a running query and fires its callback now. Returns `false`
    /// if no unfinished query has that id.
    pub fn abort_query(&mut self, id: QueryId) -> bool {
        let Some(index) = self
            .running
            .iter()
            .position(|query| query.instance.id() == id && !query.instance.is_finished())
        else {
            return false;
        };
        self.running[index].instance.abort();
        self.complete(index, true);
        true
    }

    /// Aborts every unfinished query of `owner`; callbacks fire only when
    /// `notify` is set. Returns the number aborted.
    pub fn remove_all_queries_by_querier(&mut self, owner: ActorHandle, notify: bool) -> usize {
        let targets: Vec<usize> = self
            .running
            .iter()
            .enumerate()
            .filter(|(_, query)| query.instance.owner() == owner && !query.instance.is_finished())
            .map(|(index, _)| index)
            .collect();
        for &index in &targets {
            self.running[index].instance.abort();
            self.complete(index, notify);
        }
        targets.len()
    }

    /// Fails and flushes every query running against `world_id`.
    pub fn on_world_cleanup(&mut self, world_id: WorldId) -> usize {
        let targets: Vec<usize> = self
            .running
            .iter()
            .enumerate()
            .filter(|(_, query)| {
                query.instance.world_id() == world_id && !query.instance.is_finished()
            })
            .map(|(index, _)| index)
            .collect();
        for &index in &targets {
            self.running[index]
                .instance
                .force_fail(format!("world {} torn down", world_id.0));
            self.complete(index, true);
        }
        if !targets.is_empty() {
            tracing::info!(world = world_id.0, flushed = targets.len(), "queries flushed on world cleanup");
        }
        self.sweep();
        targets.len()
    }
}
