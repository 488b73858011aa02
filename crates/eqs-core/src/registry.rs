// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry of generator, test, and context factories, and the declarative
//! descriptors they build from.
//!
//! A [`Registry`] is an explicit value owned by the host. Built templates and
//! the kind catalog are cached; [`Registry::invalidate`] drops both and
//! [`Registry::refresh`] rebuilds every template eagerly.
//!
//! Descriptor JSON looks like:
//!
//! ```json
//! {
//!   "name": "find_cover",
//!   "options": [{
//!     "generator": { "kind": "simple_grid", "context": { "kind": "querier" },
//!                    "half_size": 500, "spacing": 100 },
//!     "tests": [{
//!       "kind": "distance",
//!       "context": { "kind": "actors_with_tag", "tag": "enemy" },
//!       "config": { "purpose": "filter_and_score", "filter_type": "minimum",
//!                   "float_min": { "param": "min_range" } }
//!     }]
//!   }]
//! }
//! ```
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::{
    ActorsWithTagContext, ContextRef, FixedLocationsContext, NamedLocationContext, QuerierContext,
};
use crate::generators::{
    ActorsWithTagGenerator, CurrentLocationGenerator, GeneratorRef, OnCircleGenerator,
    SimpleGridGenerator,
};
use crate::item_tests::{
    DistanceMode, DistanceTest, DotTest, HasTagTest, RandomTest, TestDef, TestKernelRef, TraceTest,
};
use crate::manager::QueryManager;
use crate::math::Vec3;
use crate::params::FloatParam;
use crate::scoring::TestConfig;
use crate::template::QueryTemplate;

/// Kind-specific settings: every descriptor key other than `kind`.
pub type Settings = Map<String, Value>;

/// Builds a context from its settings.
pub type ContextFactory = Arc<dyn Fn(&Settings) -> Result<ContextRef, RegistryError> + Send + Sync>;
/// Builds a generator; nested contexts are built through the registry.
pub type GeneratorFactory =
    Arc<dyn Fn(&Settings, &Registry) -> Result<GeneratorRef, RegistryError> + Send + Sync>;
/// Builds a test kernel; nested contexts are built through the registry.
pub type TestFactory =
    Arc<dyn Fn(&Settings, &Registry) -> Result<TestKernelRef, RegistryError> + Send + Sync>;

/// Registry failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No generator factory for this kind.
    #[error("unknown generator kind `{0}`")]
    UnknownGenerator(String),
    /// No test factory for this kind.
    #[error("unknown test kind `{0}`")]
    UnknownTest(String),
    /// No context factory for this kind.
    #[error("unknown context kind `{0}`")]
    UnknownContext(String),
    /// No template description with this name.
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),
    /// Settings did not match what the kind expects.
    #[error("invalid settings for `{kind}`: {source}")]
    InvalidSettings {
        /// Kind being built.
        kind: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

/// A context reference inside a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDesc {
    /// Registered context kind.
    pub kind: String,
    /// Kind-specific settings.
    #[serde(flatten)]
    pub settings: Settings,
}

impl ContextDesc {
    /// The requesting actor.
    pub fn querier() -> Self {
        Self {
            kind: "querier".to_owned(),
            settings: Settings::new(),
        }
    }
}

/// A generator inside an option descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorDesc {
    /// Registered generator kind.
    pub kind: String,
    /// Kind-specific settings.
    #[serde(flatten)]
    pub settings: Settings,
}

/// A test inside an option descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDesc {
    /// Registered test kind.
    pub kind: String,
    /// Filter/score settings.
    #[serde(default)]
    pub config: TestConfig,
    /// Kind-specific settings.
    #[serde(flatten)]
    pub settings: Settings,
}

/// One option descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDesc {
    /// Item source.
    pub generator: GeneratorDesc,
    /// Tests in declaration order.
    #[serde(default)]
    pub tests: Vec<TestDesc>,
}

/// A whole template descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDesc {
    /// Template name.
    pub name: String,
    /// Options in priority order.
    pub options: Vec<OptionDesc>,
}

/// Sorted kind names known to a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Generator kinds.
    pub generators: Vec<String>,
    /// Test kinds.
    pub tests: Vec<String>,
    /// Context kinds.
    pub contexts: Vec<String>,
}

fn parse<T: DeserializeOwned>(kind: &str, settings: &Settings) -> Result<T, RegistryError> {
    serde_json::from_value(Value::Object(settings.clone())).map_err(|source| {
        RegistryError::InvalidSettings {
            kind: kind.to_owned(),
            source,
        }
    })
}

/// Named factories plus template descriptors and their built forms.
#[derive(Default)]
pub struct Registry {
    contexts: BTreeMap<String, ContextFactory>,
    generators: BTreeMap<String, GeneratorFactory>,
    tests: BTreeMap<String, TestFactory>,
    sources: BTreeMap<String, TemplateDesc>,
    built: BTreeMap<String, Arc<QueryTemplate>>,
    catalog: Option<Catalog>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("contexts", &self.contexts.keys().collect::<Vec<_>>())
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("tests", &self.tests.keys().collect::<Vec<_>>())
            .field("templates", &self.sources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Registry with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in context, generator, and test.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        registry
    }

    /// Registers a context kind.
    pub fn register_context(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Settings) -> Result<ContextRef, RegistryError> + Send + Sync + 'static,
    ) {
        self.contexts.insert(kind.into(), Arc::new(factory));
        self.invalidate();
    }

    /// Registers a generator kind.
    pub fn register_generator(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Settings, &Self) -> Result<GeneratorRef, RegistryError>
            + Send
            + Sync
            + 'static,
    ) {
        self.generators.insert(kind.into(), Arc::new(factory));
        self.invalidate();
    }

    /// Registers a test kind.
    pub fn register_test(
        &mut self,
        kind: impl Into<String>,
        factory: impl Fn(&Settings, &Self) -> Result<TestKernelRef, RegistryError>
            + Send
            + Sync
            + 'static,
    ) {
        self.tests.insert(kind.into(), Arc::new(factory));
        self.invalidate();
    }

    /// Adds or replaces a template descriptor.
    pub fn add_template(&mut self, desc: TemplateDesc) {
        self.built.remove(&desc.name);
        self.sources.insert(desc.name.clone(), desc);
    }

    /// Names of every template descriptor.
    pub fn template_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// Builds a context from its descriptor.
    pub fn context(&self, desc: &ContextDesc) -> Result<ContextRef, RegistryError> {
        let factory = self
            .contexts
            .get(&desc.kind)
            .ok_or_else(|| RegistryError::UnknownContext(desc.kind.clone()))?;
        factory(&desc.settings)
    }

    /// Builds a generator from its descriptor.
    pub fn generator(&self, desc: &GeneratorDesc) -> Result<GeneratorRef, RegistryError> {
        let factory = self
            .generators
            .get(&desc.kind)
            .ok_or_else(|| RegistryError::UnknownGenerator(desc.kind.clone()))?;
        factory(&desc.settings, self)
    }

    /// Builds a test from its descriptor.
    pub fn test(&self, desc: &TestDesc) -> Result<TestDef, RegistryError> {
        let factory = self
            .tests
            .get(&desc.kind)
            .ok_or_else(|| RegistryError::UnknownTest(desc.kind.clone()))?;
        Ok(TestDef::new(desc.config.clone(), factory(&desc.settings, self)?))
    }

    /// Builds a template without caching it.
    pub fn build_template(&self, desc: &TemplateDesc) -> Result<QueryTemplate, RegistryError> {
        let mut template = QueryTemplate::new(desc.name.clone());
        for option in &desc.options {
            let generator = self.generator(&option.generator)?;
            let tests = option
                .tests
                .iter()
                .map(|test| self.test(test))
                .collect::<Result<Vec<_>, _>>()?;
            template.push_option(generator, tests);
        }
        Ok(template)
    }

    /// Built template `name`, building and caching it on first use.
    pub fn template(&mut self, name: &str) -> Result<Arc<QueryTemplate>, RegistryError> {
        if let Some(template) = self.built.get(name) {
            return Ok(Arc::clone(template));
        }
        let desc = self
            .sources
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTemplate(name.to_owned()))?;
        let template = Arc::new(self.build_template(desc)?);
        self.built.insert(name.to_owned(), Arc::clone(&template));
        Ok(template)
    }

    /// Kind names, computed once per invalidation.
    pub fn catalog(&mut self) -> &Catalog {
        self.catalog.get_or_insert_with(|| Catalog {
            generators: self.generators.keys().cloned().collect(),
            tests: self.tests.keys().cloned().collect(),
            contexts: self.contexts.keys().cloned().collect(),
        })
    }

    /// Drops cached templates and the catalog.
    pub fn invalidate(&mut self) {
        self.built.clear();
        self.catalog = None;
    }

    /// Invalidates, then rebuilds every template; stops at the first error.
    pub fn refresh(&mut self) -> Result<Vec<Arc<QueryTemplate>>, RegistryError> {
        self.invalidate();
        let names: Vec<String> = self.sources.keys().cloned().collect();
        let templates = names
            .iter()
            .map(|name| self.template(name))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(templates = templates.len(), "registry refreshed");
        Ok(templates)
    }

    /// Refreshes and hands every template to `manager`.
    pub fn install(&mut self, manager: &mut QueryManager) -> Result<usize, RegistryError> {
        let templates = self.refresh()?;
        let count = templates.len();
        for template in templates {
            manager.add_template(template);
        }
        Ok(count)
    }
}

mod builtins {
    use super::*;

    fn querier() -> ContextDesc {
        ContextDesc::querier()
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TagSettings {
        tag: String,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct FixedSettings {
        locations: Vec<[f32; 3]>,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct NamedSettings {
        x: String,
        y: String,
        z: String,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct GridSettings {
        #[serde(default = "querier")]
        context: ContextDesc,
        half_size: FloatParam,
        spacing: FloatParam,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct CircleSettings {
        #[serde(default = "querier")]
        context: ContextDesc,
        radius: FloatParam,
        count: usize,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ActorsSettings {
        tag: String,
        #[serde(default = "querier")]
        context: ContextDesc,
        #[serde(default = "unlimited")]
        radius: FloatParam,
    }

    fn unlimited() -> FloatParam {
        FloatParam::Value(-1.0)
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ContextOnly {
        #[serde(default = "querier")]
        context: ContextDesc,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct DistanceSettings {
        #[serde(default = "querier")]
        context: ContextDesc,
        #[serde(default)]
        mode: DistanceMode,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct DotSettings {
        #[serde(default = "querier")]
        context: ContextDesc,
        facing: [f32; 3],
        #[serde(default)]
        two_d: bool,
        #[serde(default)]
        absolute: bool,
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TraceSettings {
        #[serde(default = "querier")]
        context: ContextDesc,
        #[serde(default)]
        offset: [f32; 3],
    }

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Empty {}

    pub(super) fn install(registry: &mut Registry) {
        registry.register_context("querier", |s| {
            parse::<Empty>("querier", s)?;
            Ok(Arc::new(QuerierContext) as ContextRef)
        });
        registry.register_context("actors_with_tag", |s| {
            let TagSettings { tag } = parse("actors_with_tag", s)?;
            Ok(Arc::new(ActorsWithTagContext::new(tag)) as ContextRef)
        });
        registry.register_context("fixed_locations", |s| {
            let FixedSettings { locations } = parse("fixed_locations", s)?;
            Ok(Arc::new(FixedLocationsContext {
                locations: locations.into_iter().map(Vec3::from).collect(),
            }) as ContextRef)
        });
        registry.register_context("named_location", |s| {
            let NamedSettings { x, y, z } = parse("named_location", s)?;
            Ok(Arc::new(NamedLocationContext::new(x, y, z)) as ContextRef)
        });

        registry.register_generator("simple_grid", |s, r| {
            let settings: GridSettings = parse("simple_grid", s)?;
            Ok(Arc::new(SimpleGridGenerator {
                context: r.context(&settings.context)?,
                half_size: settings.half_size,
                spacing: settings.spacing,
            }) as GeneratorRef)
        });
        registry.register_generator("on_circle", |s, r| {
            let settings: CircleSettings = parse("on_circle", s)?;
            Ok(Arc::new(OnCircleGenerator {
                context: r.context(&settings.context)?,
                radius: settings.radius,
                count: settings.count,
            }) as GeneratorRef)
        });
        registry.register_generator("actors_with_tag", |s, r| {
            let settings: ActorsSettings = parse("actors_with_tag", s)?;
            Ok(Arc::new(ActorsWithTagGenerator {
                tag: settings.tag,
                context: r.context(&settings.context)?,
                radius: settings.radius,
            }) as GeneratorRef)
        });
        registry.register_generator("current_location", |s, r| {
            let settings: ContextOnly = parse("current_location", s)?;
            Ok(Arc::new(CurrentLocationGenerator {
                context: r.context(&settings.context)?,
            }) as GeneratorRef)
        });

        registry.register_test("distance", |s, r| {
            let settings: DistanceSettings = parse("distance", s)?;
            Ok(Arc::new(DistanceTest {
                context: r.context(&settings.context)?,
                mode: settings.mode,
            }) as TestKernelRef)
        });
        registry.register_test("dot", |s, r| {
            let settings: DotSettings = parse("dot", s)?;
            Ok(Arc::new(DotTest {
                context: r.context(&settings.context)?,
                facing: settings.facing.into(),
                two_d: settings.two_d,
                absolute: settings.absolute,
            }) as TestKernelRef)
        });
        registry.register_test("trace", |s, r| {
            let settings: TraceSettings = parse("trace", s)?;
            Ok(Arc::new(TraceTest {
                context: r.context(&settings.context)?,
                offset: settings.offset.into(),
            }) as TestKernelRef)
        });
        registry.register_test("has_tag", |s, _| {
            let TagSettings { tag } = parse("has_tag", s)?;
            Ok(Arc::new(HasTagTest { tag }) as TestKernelRef)
        });
        registry.register_test("random", |s, _| {
            parse::<Empty>("random", s)?;
            Ok(Arc::new(RandomTest) as TestKernelRef)
        });
    }
}
