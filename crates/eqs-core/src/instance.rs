// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One running query: a resumable cursor over generation, test passes, and
//! final selection.
//!
//! Each [`QueryInstance::execute_one_step`] call performs exactly one unit of
//! work:
//! - generation for the current option (atomic), or
//! - one test pass, resumable at item granularity when the step's deadline
//!   passes; normalization runs atomically when the pass completes.
//!
//! Finalization (ranking and selection, or moving to the next option) runs
//! at the end of whichever step leaves the cursor at
//! [`Cursor::Finalizing`].
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, StepBudget};
use crate::context::{ContextCache, ContextEnv};
use crate::generators::{generator_params, GenerateError, GenerationEnv, GeneratorRef};
use crate::ident::{ActorHandle, QueryId, WorldId};
use crate::item::{Item, ItemDetails, ItemStore, ItemType, SKIPPED_ITEM_VALUE};
use crate::item_tests::{sort_tests, ItemView, TestDef, TestEnv};
use crate::math::Prng;
use crate::params::QueryParams;
use crate::result::{QueryResult, ResultItem};
use crate::scoring::{normalize_test, BoundTestParams, ItemOutcome, ItemScoreSink, TestPurpose};
use crate::template::QueryTemplate;
use crate::world::World;

/// Seed used when a request does not supply one.
pub const DEFAULT_QUERY_SEED: u64 = 0x0e95_5eed_0e95_5eed;

/// Selection applied to the ranked items of the winning option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Best item only.
    #[default]
    SingleResult,
    /// One item drawn uniformly from those within 5% of the best score.
    RandomBest5Pct,
    /// One item drawn uniformly from those within 25% of the best score.
    RandomBest25Pct,
    /// Every valid item, best first.
    AllMatching,
}

impl RunMode {
    fn random_tolerance(self) -> Option<f32> {
        match self {
            Self::RandomBest5Pct => Some(0.05),
            Self::RandomBest25Pct => Some(0.25),
            Self::SingleResult | Self::AllMatching => None,
        }
    }
}

/// Lifecycle status; every status except `Processing` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    /// Still has work to do.
    Processing,
    /// Finished with at least one item.
    Success,
    /// Finished with no items, or the world went away.
    Failed,
    /// Cancelled by the caller.
    Aborted,
    /// The requesting actor disappeared.
    OwnerLost,
    /// A required named parameter or context was unavailable.
    MissingParam,
}

impl QueryStatus {
    /// `true` for every terminal status.
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Position of an instance in its work.
///
/// Within one option the test index only moves forward; moving to the next
/// option restarts at [`Cursor::Generating`] for that option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Next step generates items for `option`.
    Generating {
        /// Option index.
        option: usize,
    },
    /// Next step continues test `test` at item index `item`.
    Testing {
        /// Option index.
        option: usize,
        /// Index into the sorted tests.
        test: usize,
        /// First item not yet evaluated in this pass.
        item: usize,
    },
    /// The option's tests are done (or it has no items left).
    Finalizing {
        /// Option index.
        option: usize,
    },
    /// Terminal.
    Done,
}

/// Unit of work completed by the most recent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepEvent {
    /// Generation ran for `option`.
    Generated {
        /// Option index.
        option: usize,
        /// Items produced.
        items: usize,
    },
    /// A test pass finished (including normalization).
    TestCompleted {
        /// Option index.
        option: usize,
        /// Index into the sorted tests.
        test: usize,
    },
}

/// Time spent inside one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceTiming {
    /// Sum of every step's duration.
    pub total_execution_time: Duration,
    /// Time spent generating, across options.
    pub generation_time: Duration,
    /// Time per sorted test of the current option.
    pub test_times: Vec<Duration>,
    /// Number of steps executed.
    pub steps: u32,
}

#[derive(Debug, Clone)]
struct OptionState {
    generator: GeneratorRef,
    tests: Vec<TestDef>,
}

/// Mutable state of one query. Owned by the manager (or by an instant run)
/// and never shared.
pub struct QueryInstance {
    id: QueryId,
    template: String,
    owner: ActorHandle,
    world: Arc<dyn World>,
    params: QueryParams,
    run_mode: RunMode,
    seed: u64,
    options: Vec<OptionState>,
    cursor: Cursor,
    status: QueryStatus,
    store: ItemStore,
    details: Vec<ItemDetails>,
    contexts: ContextCache,
    bound: Vec<BoundTestParams>,
    found_single_result: bool,
    any_test_scored: bool,
    selected: Vec<usize>,
    option_used: Option<usize>,
    option_reached: Option<usize>,
    timing: InstanceTiming,
    last_event: Option<StepEvent>,
    failure: Option<String>,
}

impl std::fmt::Debug for QueryInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryInstance")
            .field("id", &self.id)
            .field("template", &self.template)
            .field("owner", &self.owner)
            .field("run_mode", &self.run_mode)
            .field("cursor", &self.cursor)
            .field("status", &self.status)
            .field("items", &self.store.len())
            .finish_non_exhaustive()
    }
}

fn rank(a: &Item, b: &Item) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.data_offset.cmp(&b.data_offset))
}

/// Records an outcome; returns `true` when the item passed.
fn apply_outcome(
    item: &mut Item,
    detail: &mut ItemDetails,
    test: usize,
    purpose: TestPurpose,
    outcome: ItemOutcome,
) -> bool {
    match outcome {
        ItemOutcome::Passed(raw) => {
            detail.test_results[test] = raw;
            true
        }
        ItemOutcome::Skipped => {
            detail.test_results[test] = SKIPPED_ITEM_VALUE;
            false
        }
        ItemOutcome::Failed => {
            detail.test_results[test] = SKIPPED_ITEM_VALUE;
            if purpose.filters() {
                item.discard();
            }
            false
        }
    }
}

impl QueryInstance {
    /// Copies the template's options, dropping tests whose item type the
    /// generator cannot satisfy, and sorts each option's tests for `run_mode`.
    pub fn new(
        id: QueryId,
        template: &QueryTemplate,
        owner: ActorHandle,
        world: Arc<dyn World>,
        params: QueryParams,
        run_mode: RunMode,
        seed: u64,
    ) -> Self {
        let options = template
            .options()
            .iter()
            .map(|option| {
                let produced = option.generator.item_type();
                let mut tests: Vec<TestDef> = option
                    .tests
                    .iter()
                    .filter(|test| {
                        let wanted = test.kernel.valid_item_type();
                        let ok = produced.is_a(wanted);
                        if !ok {
                            tracing::warn!(
                                template = template.name(),
                                test = test.name(),
                                ?produced,
                                ?wanted,
                                "dropping test incompatible with generated item type"
                            );
                        }
                        ok
                    })
                    .map(|test| TestDef {
                        config: test.config.sanitized(test.name(), test.kernel.value_kind()),
                        kernel: Arc::clone(&test.kernel),
                        test_order: test.test_order,
                    })
                    .collect();
                sort_tests(&mut tests, run_mode);
                OptionState {
                    generator: Arc::clone(&option.generator),
                    tests,
                }
            })
            .collect::<Vec<_>>();
        let cursor = if options.is_empty() {
            Cursor::Finalizing { option: 0 }
        } else {
            Cursor::Generating { option: 0 }
        };
        Self {
            id,
            template: template.name().to_owned(),
            owner,
            world,
            params,
            run_mode,
            seed,
            options,
            cursor,
            status: QueryStatus::Processing,
            store: ItemStore::new(),
            details: Vec::new(),
            contexts: ContextCache::new(),
            bound: Vec::new(),
            found_single_result: false,
            any_test_scored: false,
            selected: Vec::new(),
            option_used: None,
            option_reached: None,
            timing: InstanceTiming::default(),
            last_event: None,
            failure: None,
        }
    }

    /// Request id.
    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Template name.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Requesting actor.
    pub fn owner(&self) -> ActorHandle {
        self.owner
    }

    /// World the query runs against.
    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    /// Selection mode.
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Current status.
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// `true` once the status is terminal.
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Current cursor.
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Timing counters.
    pub fn timing(&self) -> &InstanceTiming {
        &self.timing
    }

    /// Items of the current option.
    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Per-item test details of the current option.
    pub fn details(&self) -> &[ItemDetails] {
        &self.details
    }

    /// Number of options.
    pub fn num_options(&self) -> usize {
        self.options.len()
    }

    /// Sorted tests of `option`.
    pub fn option_tests(&self, option: usize) -> &[TestDef] {
        self.options
            .get(option)
            .map_or(&[], |state| state.tests.as_slice())
    }

    /// Option whose generation ran (or was attempted) most recently.
    pub fn option_reached(&self) -> Option<usize> {
        self.option_reached
    }

    /// `true` when single-result search stopped at the first passing item.
    pub fn found_single_result(&self) -> bool {
        self.found_single_result
    }

    /// Work completed by the most recent step.
    pub fn last_event(&self) -> Option<StepEvent> {
        self.last_event
    }

    /// Human-readable reason for a non-success terminal status.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Runs one unit of work.
    ///
    /// The owner is checked first. A test pass stops after the first item
    /// evaluated at or past the budget's deadline and resumes there on the
    /// next call. Stepping a finished instance does nothing.
    pub fn execute_one_step(&mut self, budget: StepBudget, clock: &dyn Clock) {
        debug_assert!(
            !self.status.is_finished(),
            "execute_one_step on finished query {}",
            self.id
        );
        self.last_event = None;
        if self.status.is_finished() {
            return;
        }
        let start = clock.now();
        if self.world.is_alive(self.owner) {
            match self.cursor {
                Cursor::Generating { option } => self.run_generation(option, clock),
                Cursor::Testing { option, test, item } => {
                    self.run_test(option, test, item, budget.deadline(start), clock);
                }
                Cursor::Finalizing { .. } | Cursor::Done => {}
            }
            if let Cursor::Finalizing { option } = self.cursor {
                self.finalize(option);
            }
        } else {
            let reason = format!("owner {} no longer exists", self.owner);
            self.finish(QueryStatus::OwnerLost, Some(reason));
        }
        self.timing.total_execution_time += clock.now().saturating_sub(start);
        self.timing.steps += 1;
    }

    /// Steps without a budget until finished.
    pub fn run_to_completion(&mut self, clock: &dyn Clock) {
        while !self.status.is_finished() {
            self.execute_one_step(StepBudget::Unbounded, clock);
        }
    }

    /// Marks the instance aborted. No-op once finished.
    pub fn abort(&mut self) {
        if !self.status.is_finished() {
            self.finish(QueryStatus::Aborted, Some("aborted".to_owned()));
        }
    }

    /// Marks the instance failed with `reason`. No-op once finished.
    pub fn force_fail(&mut self, reason: impl Into<String>) {
        if !self.status.is_finished() {
            self.finish(QueryStatus::Failed, Some(reason.into()));
        }
    }

    fn finish(&mut self, status: QueryStatus, failure: Option<String>) {
        if let Some(reason) = &failure {
            tracing::debug!(query = %self.id, ?status, reason = reason.as_str(), "query finished");
        }
        self.status = status;
        self.failure = failure;
        self.cursor = Cursor::Done;
    }

    fn first_missing_param(&self, option: &OptionState) -> Option<String> {
        generator_params(option.generator.as_ref())
            .into_iter()
            .chain(option.tests.iter().flat_map(TestDef::required_params))
            .find(|name| self.params.get(name).is_none())
    }

    fn run_generation(&mut self, option: usize, clock: &dyn Clock) {
        let started = clock.now();
        self.option_reached = Some(option);
        let state = self.options[option].clone();
        if let Some(missing) = self.first_missing_param(&state) {
            tracing::warn!(query = %self.id, template = self.template.as_str(), param = missing.as_str(), "missing named parameter");
            self.finish(
                QueryStatus::MissingParam,
                Some(format!("missing named parameter `{missing}`")),
            );
            return;
        }
        let bound: Result<Vec<_>, _> = state
            .tests
            .iter()
            .map(|test| test.config.bind(&self.params))
            .collect();
        self.bound = match bound {
            Ok(bound) => bound,
            Err(missing) => {
                self.finish(QueryStatus::MissingParam, Some(missing.to_string()));
                return;
            }
        };

        let env = ContextEnv {
            owner: self.owner,
            world: self.world.as_ref(),
            params: &self.params,
        };
        for context in state.generator.contexts() {
            self.contexts.resolve(context.as_ref(), &env);
        }

        self.store.reset();
        self.store.set_item_type(state.generator.item_type());
        let gen_env = GenerationEnv {
            owner: self.owner,
            world: self.world.as_ref(),
            params: &self.params,
            contexts: &self.contexts,
        };
        match state.generator.generate(&gen_env, &mut self.store) {
            Ok(()) => {}
            Err(GenerateError::Store(err)) => {
                tracing::warn!(query = %self.id, generator = state.generator.name(), error = %err, "generator produced malformed items; option yields nothing");
                self.store.reset();
            }
            Err(err) => {
                self.finish(QueryStatus::MissingParam, Some(err.to_string()));
                return;
            }
        }

        let num_tests = state.tests.len();
        self.details = vec![ItemDetails::new(num_tests); self.store.len()];
        self.timing.test_times = vec![Duration::ZERO; num_tests];
        self.found_single_result = false;
        self.any_test_scored = false;
        self.selected.clear();
        self.timing.generation_time += clock.now().saturating_sub(started);
        self.last_event = Some(StepEvent::Generated {
            option,
            items: self.store.len(),
        });
        tracing::debug!(query = %self.id, option, items = self.store.len(), "generated");
        self.cursor = if num_tests == 0 || self.store.num_valid_items() == 0 {
            Cursor::Finalizing { option }
        } else {
            Cursor::Testing {
                option,
                test: 0,
                item: 0,
            }
        };
    }

    fn sort_items_by_score(&mut self) {
        let items = std::mem::take(self.store.items_mut());
        let details = std::mem::take(&mut self.details);
        let mut paired: Vec<(Item, ItemDetails)> = items.into_iter().zip(details).collect();
        paired.sort_by(|a, b| rank(&a.0, &b.0));
        let (items, details): (Vec<Item>, Vec<ItemDetails>) = paired.into_iter().unzip();
        *self.store.items_mut() = items;
        self.details = details;
    }

    fn run_test(
        &mut self,
        option: usize,
        test: usize,
        start_item: usize,
        deadline: Option<Duration>,
        clock: &dyn Clock,
    ) {
        let started = clock.now();
        let num_tests = self.options[option].tests.len();
        let def = self.options[option].tests[test].clone();
        let bound = self.bound[test];
        let final_condition = self.run_mode == RunMode::SingleResult
            && test + 1 == num_tests
            && def.can_run_as_final_condition();
        if final_condition && start_item == 0 && self.any_test_scored {
            self.sort_items_by_score();
        }

        let env = ContextEnv {
            owner: self.owner,
            world: self.world.as_ref(),
            params: &self.params,
        };
        for context in def.kernel.contexts() {
            self.contexts.resolve(context.as_ref(), &env);
        }

        let item_type = self.store.item_type().unwrap_or(ItemType::Point);
        let test_env = TestEnv {
            owner: self.owner,
            world: self.world.as_ref(),
            params: &self.params,
            contexts: &self.contexts,
            seed: self.seed,
        };
        let len = self.store.len();
        let mut index = start_item;
        let mut paused = false;
        while index < len {
            let item = self.store.items()[index];
            if !item.is_valid() {
                index += 1;
                continue;
            }
            let outcome = {
                let view = ItemView {
                    index,
                    data_offset: item.data_offset,
                    item_type,
                    data: self.store.data_at(item.data_offset).unwrap_or(&[]),
                    location: self.store.location(index, test_env.world),
                    actor: self.store.actor(index),
                };
                let mut sink = ItemScoreSink::new(&def.config, &bound);
                def.kernel.evaluate(&test_env, &view, &mut sink);
                sink.finish()
            };
            let passed = apply_outcome(
                &mut self.store.items_mut()[index],
                &mut self.details[index],
                test,
                def.config.purpose,
                outcome,
            );
            index += 1;
            if final_condition && passed {
                self.found_single_result = true;
                self.selected = vec![index - 1];
                break;
            }
            if deadline.is_some_and(|deadline| index < len && clock.now() >= deadline) {
                paused = true;
                break;
            }
        }

        if let Some(spent) = self.timing.test_times.get_mut(test) {
            *spent += clock.now().saturating_sub(started);
        }
        if paused {
            tracing::trace!(query = %self.id, option, test, item = index, "test pass paused");
            self.cursor = Cursor::Testing {
                option,
                test,
                item: index,
            };
            return;
        }

        if !final_condition {
            normalize_test(
                &def.config,
                &bound,
                test,
                self.store.items_mut(),
                &mut self.details,
            );
        }
        self.any_test_scored |= def.config.purpose.scores();
        if self.run_mode == RunMode::SingleResult
            && !self.found_single_result
            && test + 1 < num_tests
            && self.store.num_valid_items() == 1
        {
            if let Some(survivor) = self.store.items().iter().position(Item::is_valid) {
                tracing::debug!(query = %self.id, option, test, item = survivor, "single survivor; skipping remaining tests");
                self.found_single_result = true;
                self.selected = vec![survivor];
            }
        }
        self.last_event = Some(StepEvent::TestCompleted { option, test });
        tracing::debug!(query = %self.id, option, test, test_name = def.name(), valid = self.store.num_valid_items(), "test pass complete");
        self.cursor = if self.found_single_result
            || test + 1 >= num_tests
            || self.store.num_valid_items() == 0
        {
            Cursor::Finalizing { option }
        } else {
            Cursor::Testing {
                option,
                test: test + 1,
                item: 0,
            }
        };
    }

    fn finalize(&mut self, option: usize) {
        if self.store.num_valid_items() == 0 {
            if option + 1 < self.options.len() {
                tracing::debug!(query = %self.id, option, "option produced no items; trying next");
                self.store.reset();
                self.details.clear();
                self.cursor = Cursor::Generating { option: option + 1 };
            } else {
                self.finish(QueryStatus::Failed, Some("no items passed".to_owned()));
            }
            return;
        }

        let items = self.store.items();
        let mut ranked: Vec<usize> = (0..items.len()).filter(|&i| items[i].is_valid()).collect();
        ranked.sort_by(|&a, &b| rank(&items[a], &items[b]));
        self.selected = match (self.run_mode, self.run_mode.random_tolerance()) {
            (RunMode::SingleResult, _) if self.found_single_result => self.selected.clone(),
            (RunMode::AllMatching, _) => ranked,
            (_, Some(tolerance)) => {
                let best = items[ranked[0]].score;
                let threshold = best - best.abs() * tolerance;
                let candidates = ranked
                    .iter()
                    .take_while(|&&i| items[i].score >= threshold)
                    .count();
                let mut prng = Prng::from_seed_u64(self.seed);
                vec![ranked[prng.next_index(candidates)]]
            }
            _ => ranked.into_iter().take(1).collect(),
        };
        self.option_used = Some(option);
        self.finish(QueryStatus::Success, None);
    }

    /// Result snapshot; items are empty unless the query succeeded.
    pub fn result(&self) -> QueryResult {
        let items = if self.status == QueryStatus::Success {
            self.selected
                .iter()
                .filter_map(|&index| {
                    let item = self.store.items().get(index)?;
                    let data = self.store.item_data(index)?;
                    Some(ResultItem {
                        score: item.score,
                        data: Bytes::copy_from_slice(data),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        QueryResult {
            status: self.status,
            item_type: self.option_used.and(self.store.item_type()),
            items,
            option_index: self.option_used,
            query_id: self.id,
            owner: self.owner,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::context::FixedLocationsContext;
    use crate::generators::CurrentLocationGenerator;
    use crate::item_tests::{DistanceMode, DistanceTest};
    use crate::math::Vec3;
    use crate::params::FloatParam;
    use crate::scoring::{FilterType, ScoreEquation, TestConfig};
    use crate::world::SimpleWorld;

    fn line(xs: &[f32]) -> GeneratorRef {
        Arc::new(CurrentLocationGenerator {
            context: Arc::new(FixedLocationsContext {
                locations: xs.iter().map(|x| Vec3::new(*x, 0.0, 0.0)).collect(),
            }),
        })
    }

    fn origin_distance(config: TestConfig) -> TestDef {
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

    fn world_with_owner() -> (Arc<SimpleWorld>, ActorHandle) {
        let world = Arc::new(SimpleWorld::new(WorldId(1)));
        let owner = world.spawn(Vec3::ZERO, &["querier"]);
        (world, owner)
    }

    #[test]
    fn range_filter_and_linear_scoring() {
        let (world, owner) = world_with_owner();
        let config = TestConfig {
            purpose: TestPurpose::FilterAndScore,
            filter_type: FilterType::Range,
            float_min: FloatParam::Value(10.0),
            float_max: FloatParam::Value(50.0),
            equation: ScoreEquation::Linear,
            factor: FloatParam::Value(2.0),
            ..TestConfig::default()
        };
        let template = QueryTemplate::new("a")
            .with_option(line(&[5.0, 10.0, 30.0, 50.0, 80.0]), vec![origin_distance(config)]);
        let mut instance = QueryInstance::new(
            QueryId(1),
            &template,
            owner,
            world,
            QueryParams::new(),
            RunMode::AllMatching,
            DEFAULT_QUERY_SEED,
        );
        instance.run_to_completion(&SystemClock::new());
        assert_eq!(instance.status(), QueryStatus::Success);
        let result = instance.result();
        assert_eq!(result.scores(), vec![2.0, 1.0, 0.0]);
        let items = instance.store().items();
        assert!(items[0].discarded);
        assert!(items[4].discarded);
    }

    #[test]
    fn empty_template_fails() {
        let (world, owner) = world_with_owner();
        let template = QueryTemplate::new("empty");
        let mut instance = QueryInstance::new(
            QueryId(2),
            &template,
            owner,
            world,
            QueryParams::new(),
            RunMode::SingleResult,
            DEFAULT_QUERY_SEED,
        );
        instance.run_to_completion(&SystemClock::new());
        assert_eq!(instance.status(), QueryStatus::Failed);
        assert!(instance.result().items.is_empty());
    }

    #[test]
    fn falls_through_to_next_option() {
        let (world, owner) = world_with_owner();
        let template = QueryTemplate::new("fallback")
            .with_option(
                line(&[100.0]),
                vec![origin_distance(TestConfig::filtering(FilterType::Maximum, 0.0, 10.0))],
            )
            .with_option(line(&[1.0, 2.0]), Vec::new());
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
        let result = instance.result();
        assert_eq!(result.option_index, Some(1));
        assert_eq!(result.items.len(), 2);
    }

    #[test]
    fn oversized_generators_yield_nothing() {
        use crate::context::QuerierContext;
        use crate::generators::{OnCircleGenerator, SimpleGridGenerator};

        let (world, owner) = world_with_owner();
        let huge_grid: GeneratorRef = Arc::new(SimpleGridGenerator {
            context: Arc::new(QuerierContext),
            half_size: FloatParam::Value(1e12),
            spacing: FloatParam::Value(1.0),
        });
        let huge_circle: GeneratorRef = Arc::new(OnCircleGenerator {
            context: Arc::new(QuerierContext),
            radius: FloatParam::Value(5.0),
            count: usize::MAX,
        });
        let template = QueryTemplate::new("huge")
            .with_option(huge_grid, Vec::new())
            .with_option(huge_circle, Vec::new())
            .with_option(line(&[4.0]), Vec::new());
        let mut instance = QueryInstance::new(
            QueryId(5),
            &template,
            owner,
            world,
            QueryParams::new(),
            RunMode::AllMatching,
            DEFAULT_QUERY_SEED,
        );
        instance.run_to_completion(&SystemClock::new());
        assert_eq!(instance.status(), QueryStatus::Success);
        let result = instance.result();
        assert_eq!(result.option_index, Some(2));
        assert_eq!(result.items.len(), 1);
    }

    #[test]
    fn dead_owner_is_reported_before_work() {
        let (world, owner) = world_with_owner();
        world.despawn(owner);
        let template = QueryTemplate::new("lost").with_option(line(&[1.0]), Vec::new());
        let mut instance = QueryInstance::new(
            QueryId(4),
            &template,
            owner,
            world,
            QueryParams::new(),
            RunMode::SingleResult,
            DEFAULT_QUERY_SEED,
        );
        instance.execute_one_step(StepBudget::Unbounded, &SystemClock::new());
        assert_eq!(instance.status(), QueryStatus::OwnerLost);
        assert_eq!(instance.cursor(), Cursor::Done);
        assert!(instance.store().is_empty());
    }
}
