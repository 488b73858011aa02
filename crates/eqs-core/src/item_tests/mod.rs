// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Item tests: stateless kernels producing readings, plus the ordering rule
//! applied when an option is assembled.
use std::fmt;
use std::sync::Arc;

use crate::context::{ContextCache, ContextRef};
use crate::ident::ActorHandle;
use crate::instance::RunMode;
use crate::item::ItemType;
use crate::math::Vec3;
use crate::params::QueryParams;
use crate::scoring::{ItemScoreSink, TestConfig, TestPurpose, ValueKind};
use crate::world::World;

mod distance;
mod dot;
mod random;
mod tag;
mod trace;

pub use distance::{DistanceMode, DistanceTest};
pub use dot::DotTest;
pub use random::RandomTest;
pub use tag::HasTagTest;
pub use trace::TraceTest;

/// Read-only state available to a kernel while it evaluates items.
#[derive(Clone, Copy)]
pub struct TestEnv<'a> {
    /// Actor that issued the query.
    pub owner: ActorHandle,
    /// World the query runs against.
    pub world: &'a dyn World,
    /// Request parameters.
    pub params: &'a QueryParams,
    /// Contexts resolved so far for this instance.
    pub contexts: &'a ContextCache,
    /// Instance seed.
    pub seed: u64,
}

/// One item as seen by a kernel.
#[derive(Debug, Clone, Copy)]
pub struct ItemView<'a> {
    /// Index in the item store.
    pub index: usize,
    /// Byte offset of the record; stable identity across sorting.
    pub data_offset: i32,
    /// Item type of the current option.
    pub item_type: ItemType,
    /// Raw record.
    pub data: &'a [u8],
    /// Decoded location, if the item has one right now.
    pub location: Option<Vec3>,
    /// Decoded actor for actor items.
    pub actor: Option<ActorHandle>,
}

/// Evaluation logic of one test kind.
///
/// Kernels hold only their construction-time settings and are shared
/// between instances behind [`TestKernelRef`].
pub trait TestKernel: Send + Sync + fmt::Debug {
    /// Display name.
    fn name(&self) -> &'static str;

    /// Kind of readings pushed into the sink.
    fn value_kind(&self) -> ValueKind;

    /// Item type this kernel understands; subtypes are accepted too.
    fn valid_item_type(&self) -> ItemType {
        ItemType::Point
    }

    /// Contexts resolved before the first item is evaluated.
    fn contexts(&self) -> Vec<ContextRef> {
        Vec::new()
    }

    /// Named request parameters read during evaluation.
    fn required_params(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Pushes readings for one item. Pushing nothing skips the item.
    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>);
}

/// Shared handle to a kernel.
pub type TestKernelRef = Arc<dyn TestKernel>;

/// A test as declared in a template option.
#[derive(Debug, Clone)]
pub struct TestDef {
    /// Filter/score settings.
    pub config: TestConfig,
    /// Evaluation logic.
    pub kernel: TestKernelRef,
    /// Declaration index inside the option; final tie-break when sorting.
    pub test_order: usize,
}

impl TestDef {
    /// Test with `test_order` 0; templates renumber on build.
    pub fn new(config: TestConfig, kernel: TestKernelRef) -> Self {
        Self {
            config,
            kernel,
            test_order: 0,
        }
    }

    /// Kernel name.
    pub fn name(&self) -> &'static str {
        self.kernel.name()
    }

    /// A pure filter may stop at the first passing item in single-result mode.
    pub fn can_run_as_final_condition(&self) -> bool {
        self.config.purpose == TestPurpose::Filter
    }

    /// Every named parameter the test reads.
    pub fn required_params(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .config
            .required_params()
            .into_iter()
            .map(str::to_owned)
            .collect();
        names.extend(self.kernel.required_params().into_iter().map(str::to_owned));
        for context in self.kernel.contexts() {
            names.extend(context.required_params().into_iter().map(str::to_owned));
        }
        names
    }
}

/// Orders tests for execution; a stable sort on `(cost, group, test_order)`.
///
/// Filtering tests (anything but pure scoring) run before scoring tests of
/// the same cost, so expensive scoring sees fewer items. In
/// [`RunMode::SingleResult`] the most expensive cost level flips that rule,
/// putting pure filters last where they can stop at the first passing item.
pub fn sort_tests(tests: &mut [TestDef], run_mode: RunMode) {
    let max_cost = tests.iter().map(|test| test.config.cost).max();
    let group = |test: &TestDef| -> u8 {
        let scoring_only = test.config.purpose == TestPurpose::Score;
        let flip = run_mode == RunMode::SingleResult && Some(test.config.cost) == max_cost;
        u8::from(scoring_only != flip)
    };
    tests.sort_by_key(|test| (test.config.cost, group(test), test.test_order));
}
