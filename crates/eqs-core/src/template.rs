// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable query templates. Instances copy what they need on creation.
use crate::generators::GeneratorRef;
use crate::item_tests::TestDef;

/// One alternative strategy: a generator plus its tests in declaration order.
#[derive(Debug, Clone)]
pub struct OptionTemplate {
    /// Item source.
    pub generator: GeneratorRef,
    /// Tests with `test_order` equal to their declaration index.
    pub tests: Vec<TestDef>,
}

/// Named, ordered list of options. Later options only run when earlier ones
/// end with no valid items.
#[derive(Debug, Clone)]
pub struct QueryTemplate {
    name: String,
    options: Vec<OptionTemplate>,
}

impl QueryTemplate {
    /// Template with no options.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Appends an option, numbering its tests by position.
    pub fn with_option(mut self, generator: GeneratorRef, tests: Vec<TestDef>) -> Self {
        self.push_option(generator, tests);
        self
    }

    /// Appends an option, numbering its tests by position.
    pub fn push_option(&mut self, generator: GeneratorRef, mut tests: Vec<TestDef>) {
        for (order, test) in tests.iter_mut().enumerate() {
            test.test_order = order;
        }
        self.options.push(OptionTemplate { generator, tests });
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Options in priority order.
    pub fn options(&self) -> &[OptionTemplate] {
        &self.options
    }
}
