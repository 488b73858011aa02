// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Completion callback recorder.

use std::sync::{Arc, Mutex};

use eqs_core::{QueryId, QueryResult};

/// Records every result delivered through callbacks it hands out.
#[derive(Debug, Clone, Default)]
pub struct CallbackLog {
    results: Arc<Mutex<Vec<QueryResult>>>,
}

impl CallbackLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback appending to this log.
    pub fn callback(&self) -> impl FnOnce(&QueryResult) + 'static {
        let results = Arc::clone(&self.results);
        move |result: &QueryResult| {
            results
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(result.clone());
        }
    }

    /// Every recorded result, in delivery order.
    pub fn results(&self) -> Vec<QueryResult> {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of deliveries for `id`.
    pub fn count_for(&self, id: QueryId) -> usize {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|result| result.query_id == id)
            .count()
    }

    /// Result delivered for `id`, if any.
    pub fn result_for(&self, id: QueryId) -> Option<QueryResult> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|result| result.query_id == id)
            .cloned()
    }

    /// Total deliveries.
    pub fn len(&self) -> usize {
        self.results.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// `true` when nothing was delivered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
