// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wrappers that observe or slow down real kernels and generators.
//!
//! Costed wrappers advance a [`FakeClock`] instead of sleeping, so budget
//! tests are exact and fast.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eqs_core::generators::{GenerateError, GenerationEnv, Generator, GeneratorRef};
use eqs_core::item_tests::{ItemView, TestEnv, TestKernel, TestKernelRef};
use eqs_core::{ContextRef, ItemScoreSink, ItemStore, ItemType, ValueKind};

use crate::clock::FakeClock;

/// Counts evaluations of the wrapped kernel. Clones share the counter.
#[derive(Debug, Clone)]
pub struct CountingTest {
    inner: TestKernelRef,
    calls: Arc<AtomicUsize>,
}

impl CountingTest {
    /// Wraps `inner`.
    pub fn new(inner: TestKernelRef) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Items evaluated so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TestKernel for CountingTest {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn value_kind(&self) -> ValueKind {
        self.inner.value_kind()
    }

    fn valid_item_type(&self) -> ItemType {
        self.inner.valid_item_type()
    }

    fn contexts(&self) -> Vec<ContextRef> {
        self.inner.contexts()
    }

    fn required_params(&self) -> Vec<&str> {
        self.inner.required_params()
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate(env, item, sink);
    }
}

/// Advances a clock by `per_item` for every item the wrapped kernel sees.
#[derive(Debug, Clone)]
pub struct CostedTest {
    inner: TestKernelRef,
    clock: FakeClock,
    per_item: Duration,
}

impl CostedTest {
    /// Wraps `inner`, charging `per_item` on `clock`.
    pub fn new(inner: TestKernelRef, clock: FakeClock, per_item: Duration) -> Self {
        Self {
            inner,
            clock,
            per_item,
        }
    }
}

impl TestKernel for CostedTest {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn value_kind(&self) -> ValueKind {
        self.inner.value_kind()
    }

    fn valid_item_type(&self) -> ItemType {
        self.inner.valid_item_type()
    }

    fn contexts(&self) -> Vec<ContextRef> {
        self.inner.contexts()
    }

    fn required_params(&self) -> Vec<&str> {
        self.inner.required_params()
    }

    fn evaluate(&self, env: &TestEnv<'_>, item: &ItemView<'_>, sink: &mut ItemScoreSink<'_>) {
        self.clock.advance(self.per_item);
        self.inner.evaluate(env, item, sink);
    }
}

/// Advances a clock by a fixed cost each time the wrapped generator runs.
#[derive(Debug, Clone)]
pub struct CostedGenerator {
    inner: GeneratorRef,
    clock: FakeClock,
    cost: Duration,
}

impl CostedGenerator {
    /// Wraps `inner`, charging `cost` on `clock` per generation.
    pub fn new(inner: GeneratorRef, clock: FakeClock, cost: Duration) -> Self {
        Self { inner, clock, cost }
    }
}

impl Generator for CostedGenerator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn item_type(&self) -> ItemType {
        self.inner.item_type()
    }

    fn contexts(&self) -> Vec<ContextRef> {
        self.inner.contexts()
    }

    fn required_params(&self) -> Vec<&str> {
        self.inner.required_params()
    }

    fn generate(&self, env: &GenerationEnv<'_>, store: &mut ItemStore) -> Result<(), GenerateError> {
        self.clock.advance(self.cost);
        self.inner.generate(env, store)
    }
}
