// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optional instrumentation: snapshots of test passes and finished queries.
//!
//! Snapshots are taken by the manager after a step's timed region, so
//! recording never changes budget accounting or execution order.
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::ident::{ActorHandle, QueryId};
use crate::instance::{QueryInstance, QueryStatus};

/// Per-item state after a test pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugItem {
    /// Stable item identity.
    pub data_offset: i32,
    /// Accumulated score.
    pub score: f32,
    /// Still valid after the pass.
    pub valid: bool,
    /// Raw value per test (`SKIPPED_ITEM_VALUE` when skipped or failed).
    pub raw: Vec<f32>,
    /// Weighted contribution per test.
    pub weighted: Vec<f32>,
}

/// Snapshot taken when a test pass completes.
#[derive(Debug, Clone, PartialEq)]
pub struct TestStepRecord {
    /// Query id.
    pub query_id: QueryId,
    /// Option index.
    pub option: usize,
    /// Index into the option's sorted tests.
    pub test: usize,
    /// Kernel name.
    pub test_name: &'static str,
    /// Every generated item of the option.
    pub items: Vec<DebugItem>,
}

/// Summary of a finished query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    /// Query id.
    pub query_id: QueryId,
    /// Template name.
    pub template: String,
    /// Requesting actor.
    pub owner: ActorHandle,
    /// Terminal status.
    pub status: QueryStatus,
    /// Option whose items were returned.
    pub option_index: Option<usize>,
    /// Test names, in execution order, of the option the query last reached.
    pub performed_tests: Vec<&'static str>,
    /// Number of items returned.
    pub num_results: usize,
    /// Total time spent in steps.
    pub total_execution_time: Duration,
    /// Number of steps.
    pub steps: u32,
    /// Reason for a non-success status.
    pub failure: Option<String>,
}

/// Receiver of debug snapshots.
pub trait DebugSink {
    /// A test pass finished.
    fn record_test_step(&mut self, record: TestStepRecord);
    /// A query reached a terminal status.
    fn record_query_finished(&mut self, record: QueryRecord);
}

/// Snapshot of test `test` of `option` as it stands now.
pub fn capture_test_step(instance: &QueryInstance, option: usize, test: usize) -> TestStepRecord {
    let items = instance
        .store()
        .items()
        .iter()
        .zip(instance.details())
        .map(|(item, detail)| DebugItem {
            data_offset: item.data_offset,
            score: item.score,
            valid: item.is_valid(),
            raw: detail.test_results.clone(),
            weighted: detail.test_weighted_scores.clone(),
        })
        .collect();
    TestStepRecord {
        query_id: instance.id(),
        option,
        test,
        test_name: instance
            .option_tests(option)
            .get(test)
            .map_or("unknown", |def| def.name()),
        items,
    }
}

/// Summary of a finished instance.
pub fn capture_query(instance: &QueryInstance) -> QueryRecord {
    let result = instance.result();
    let option = result.option_index.or_else(|| instance.option_reached());
    QueryRecord {
        query_id: instance.id(),
        template: instance.template().to_owned(),
        owner: instance.owner(),
        status: instance.status(),
        option_index: result.option_index,
        performed_tests: option
            .map(|option| instance.option_tests(option).iter().map(|def| def.name()).collect())
            .unwrap_or_default(),
        num_results: result.items.len(),
        total_execution_time: instance.timing().total_execution_time,
        steps: instance.timing().steps,
        failure: instance.failure().map(str::to_owned),
    }
}

/// A finished query with the test passes recorded for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugQuery {
    /// Final summary.
    pub record: QueryRecord,
    /// Test passes in completion order.
    pub steps: Vec<TestStepRecord>,
}

#[derive(Debug, Default)]
struct RecordingInner {
    capacity: usize,
    pending: BTreeMap<QueryId, Vec<TestStepRecord>>,
    history: VecDeque<DebugQuery>,
}

/// [`DebugSink`] keeping the most recent `capacity` finished queries.
///
/// Clones share storage, so a test can keep one handle and give another to
/// the manager.
#[derive(Debug, Clone, Default)]
pub struct RecordingDebugSink {
    inner: Arc<Mutex<RecordingInner>>,
}

impl RecordingDebugSink {
    /// Sink remembering up to `capacity` finished queries.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingInner {
                capacity,
                ..RecordingInner::default()
            })),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut RecordingInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    /// Finished queries, oldest first.
    pub fn history(&self) -> Vec<DebugQuery> {
        self.with_inner(|inner| inner.history.iter().cloned().collect())
    }

    /// Most recently finished query.
    pub fn last(&self) -> Option<DebugQuery> {
        self.with_inner(|inner| inner.history.back().cloned())
    }

    /// Recorded query for `id`, if still in history.
    pub fn find(&self, id: QueryId) -> Option<DebugQuery> {
        self.with_inner(|inner| {
            inner
                .history
                .iter()
                .find(|query| query.record.query_id == id)
                .cloned()
        })
    }
}

impl DebugSink for RecordingDebugSink {
    fn record_test_step(&mut self, record: TestStepRecord) {
        self.with_inner(|inner| {
            if inner.capacity > 0 {
                inner.pending.entry(record.query_id).or_default().push(record);
            }
        });
    }

    fn record_query_finished(&mut self, record: QueryRecord) {
        self.with_inner(|inner| {
            let steps = inner.pending.remove(&record.query_id).unwrap_or_default();
            if inner.capacity == 0 {
                return;
            }
            while inner.history.len() >= inner.capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(DebugQuery { record, steps });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> QueryRecord {
        QueryRecord {
            query_id: QueryId(id),
            template: "t".into(),
            owner: ActorHandle(1),
            status: QueryStatus::Success,
            option_index: Some(0),
            performed_tests: vec!["distance"],
            num_results: 1,
            total_execution_time: Duration::ZERO,
            steps: 2,
            failure: None,
        }
    }

    #[test]
    fn keeps_only_the_most_recent_queries() {
        let observer = RecordingDebugSink::new(2);
        let mut sink = observer.clone();
        sink.record_test_step(TestStepRecord {
            query_id: QueryId(1),
            option: 0,
            test: 0,
            test_name: "distance",
            items: Vec::new(),
        });
        for id in 1..=3 {
            sink.record_query_finished(record(id));
        }
        let ids: Vec<u64> = observer
            .history()
            .iter()
            .map(|q| q.record.query_id.0)
            .collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(observer.find(QueryId(1)).is_none());
        assert_eq!(observer.last().map(|q| q.record.query_id), Some(QueryId(3)));
    }
}
