// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filter/score configuration, the per-item reading accumulator, and the
//! per-test normalization pass.
//!
//! A test pass works in two phases:
//! 1. Per item, the kernel pushes one reading per context entry into an
//!    [`ItemScoreSink`]; [`ItemScoreSink::finish`] folds them into an
//!    [`ItemOutcome`] (pass/fail plus one raw value).
//! 2. Once every item has been visited, [`normalize_test`] maps raw values
//!    onto `[0, 1]`, applies the [`ScoreEquation`], and adds the weighted
//!    result into each item's score.
use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemDetails, SKIPPED_ITEM_VALUE};
use crate::math::{self, EPSILON};
use crate::params::{FloatParam, MissingParam, QueryParams};

/// What a test contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestPurpose {
    /// Pass/fail only.
    Filter,
    /// Weighted score only; never discards.
    Score,
    /// Both.
    #[default]
    FilterAndScore,
}

impl TestPurpose {
    /// `true` for [`TestPurpose::Filter`] and [`TestPurpose::FilterAndScore`].
    pub const fn filters(self) -> bool {
        matches!(self, Self::Filter | Self::FilterAndScore)
    }

    /// `true` for [`TestPurpose::Score`] and [`TestPurpose::FilterAndScore`].
    pub const fn scores(self) -> bool {
        matches!(self, Self::Score | Self::FilterAndScore)
    }
}

/// Declared evaluation cost; cheaper tests run first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum TestCost {
    /// Arithmetic on item data.
    #[default]
    Low,
    /// World lookups.
    Medium,
    /// Traces and other expensive queries.
    High,
}

/// How a float reading is compared against the filter thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// `raw >= min`.
    Minimum,
    /// `raw <= max`.
    Maximum,
    /// `min <= raw <= max`.
    #[default]
    Range,
    /// Boolean equality; the only valid type for boolean tests.
    Match,
}

/// Curve applied to a normalized value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreEquation {
    /// `1` when `n > 0`, else `0`.
    Constant,
    /// `n`.
    #[default]
    Linear,
    /// `n * n`.
    Square,
    /// `1 - n`.
    InverseLinear,
}

impl ScoreEquation {
    /// Evaluates the curve at `n`.
    pub fn apply(self, n: f32) -> f32 {
        match self {
            Self::Constant => {
                if n > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Linear => n,
            Self::Square => n * n,
            Self::InverseLinear => 1.0 - n,
        }
    }
}

/// Source of one normalization bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClampType {
    /// Observed extreme over valid, non-skipped items.
    #[default]
    None,
    /// A configured value.
    SpecifiedValue(FloatParam),
    /// The test's own filter threshold on the same side.
    FilterThreshold,
}

/// Combination of per-context pass/fail results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Every reading must pass.
    #[default]
    AllPass,
    /// One passing reading is enough.
    AnyPass,
}

/// Combination of passing per-context readings into one raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOp {
    /// Arithmetic mean.
    #[default]
    Average,
    /// Smallest reading.
    Min,
    /// Largest reading.
    Max,
}

/// Where the low normalization bound starts when it is not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Observed minimum.
    #[default]
    RelativeToScores,
    /// Zero, unless the observed minimum is negative.
    Absolute,
}

/// Value type a kernel produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Continuous readings filtered by thresholds.
    Float,
    /// Readings matched against an expected value.
    Bool,
}

/// Filter/score settings shared by every test kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Filter, score, or both.
    pub purpose: TestPurpose,
    /// Ordering hint.
    pub cost: TestCost,
    /// Threshold comparison for filtering.
    pub filter_type: FilterType,
    /// Lower threshold (`Minimum`, `Range`).
    pub float_min: FloatParam,
    /// Upper threshold (`Maximum`, `Range`).
    pub float_max: FloatParam,
    /// Expected value for boolean tests.
    pub bool_match: bool,
    /// Curve applied after normalization.
    pub equation: ScoreEquation,
    /// Multiplier applied to the curve.
    pub factor: FloatParam,
    /// Low normalization bound.
    pub clamp_min: ClampType,
    /// High normalization bound.
    pub clamp_max: ClampType,
    /// Combination of per-context pass/fail.
    pub filter_op: FilterOp,
    /// Combination of per-context readings.
    pub score_op: ScoreOp,
    /// Start of the unclamped low bound.
    pub normalization: Normalization,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            purpose: TestPurpose::default(),
            cost: TestCost::default(),
            filter_type: FilterType::default(),
            float_min: FloatParam::Value(0.0),
            float_max: FloatParam::Value(0.0),
            bool_match: true,
            equation: ScoreEquation::default(),
            factor: FloatParam::Value(1.0),
            clamp_min: ClampType::None,
            clamp_max: ClampType::None,
            filter_op: FilterOp::default(),
            score_op: ScoreOp::default(),
            normalization: Normalization::default(),
        }
    }
}

impl TestConfig {
    /// Score-only config with the given curve and factor.
    pub fn scoring(equation: ScoreEquation, factor: f32) -> Self {
        Self {
            purpose: TestPurpose::Score,
            equation,
            factor: FloatParam::Value(factor),
            ..Self::default()
        }
    }

    /// Filter-only config.
    pub fn filtering(filter_type: FilterType, min: f32, max: f32) -> Self {
        Self {
            purpose: TestPurpose::Filter,
            filter_type,
            float_min: FloatParam::Value(min),
            float_max: FloatParam::Value(max),
            ..Self::default()
        }
    }

    /// Filter-only boolean config expecting `expected`.
    pub fn matching(expected: bool) -> Self {
        Self {
            purpose: TestPurpose::Filter,
            filter_type: FilterType::Match,
            bool_match: expected,
            ..Self::default()
        }
    }

    fn uses_min_threshold(&self) -> bool {
        self.purpose.filters() && matches!(self.filter_type, FilterType::Minimum | FilterType::Range)
    }

    fn uses_max_threshold(&self) -> bool {
        self.purpose.filters() && matches!(self.filter_type, FilterType::Maximum | FilterType::Range)
    }

    /// Names of every request parameter this config reads.
    pub fn required_params(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if self.uses_min_threshold() || self.clamp_min == ClampType::FilterThreshold {
            names.extend(self.float_min.param_name());
        }
        if self.uses_max_threshold() || self.clamp_max == ClampType::FilterThreshold {
            names.extend(self.float_max.param_name());
        }
        if self.purpose.scores() {
            names.extend(self.factor.param_name());
            if let ClampType::SpecifiedValue(value) = &self.clamp_min {
                names.extend(value.param_name());
            }
            if let ClampType::SpecifiedValue(value) = &self.clamp_max {
                names.extend(value.param_name());
            }
        }
        names
    }

    /// Neutralizes settings that cannot work for a `kind` test, logging each.
    ///
    /// The returned config never aborts a query: invalid filter types still
    /// fail every reading, and incompatible `FilterThreshold` clamps fall
    /// back to [`ClampType::None`].
    pub fn sanitized(&self, test_name: &str, kind: ValueKind) -> Self {
        let mut config = self.clone();
        if config.purpose.filters() {
            match (kind, config.filter_type) {
                (ValueKind::Float, FilterType::Match) => {
                    tracing::warn!(test = test_name, "float test uses Match filter; every item will fail");
                }
                (ValueKind::Bool, filter) if filter != FilterType::Match => {
                    tracing::warn!(test = test_name, ?filter, "boolean test requires Match filter; every item will fail");
                }
                _ => {}
            }
        }
        if config.clamp_min == ClampType::FilterThreshold && !config.uses_min_threshold() {
            tracing::warn!(test = test_name, "min clamp uses filter threshold without a min filter; ignoring clamp");
            config.clamp_min = ClampType::None;
        }
        if config.clamp_max == ClampType::FilterThreshold && !config.uses_max_threshold() {
            tracing::warn!(test = test_name, "max clamp uses filter threshold without a max filter; ignoring clamp");
            config.clamp_max = ClampType::None;
        }
        if kind == ValueKind::Bool
            && (config.clamp_min == ClampType::FilterThreshold
                || config.clamp_max == ClampType::FilterThreshold)
        {
            config.clamp_min = ClampType::None;
            config.clamp_max = ClampType::None;
        }
        config
    }

    /// Resolves every parameterized value against the request.
    pub fn bind(&self, params: &QueryParams) -> Result<BoundTestParams, MissingParam> {
        let clamp = |clamp: &ClampType| -> Result<Option<f32>, MissingParam> {
            match clamp {
                ClampType::SpecifiedValue(value) if self.purpose.scores() => value.resolve(params).map(Some),
                _ => Ok(None),
            }
        };
        let needs_min = self.uses_min_threshold() || self.clamp_min == ClampType::FilterThreshold;
        let needs_max = self.uses_max_threshold() || self.clamp_max == ClampType::FilterThreshold;
        Ok(BoundTestParams {
            filter_min: if needs_min { self.float_min.resolve(params)? } else { 0.0 },
            filter_max: if needs_max { self.float_max.resolve(params)? } else { 0.0 },
            factor: if self.purpose.scores() { self.factor.resolve(params)? } else { 0.0 },
            clamp_min: clamp(&self.clamp_min)?,
            clamp_max: clamp(&self.clamp_max)?,
        })
    }
}

/// A [`TestConfig`]'s parameterized values resolved for one query.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundTestParams {
    /// Lower filter threshold.
    pub filter_min: f32,
    /// Upper filter threshold.
    pub filter_max: f32,
    /// Scoring factor.
    pub factor: f32,
    /// Specified low clamp, if configured.
    pub clamp_min: Option<f32>,
    /// Specified high clamp, if configured.
    pub clamp_max: Option<f32>,
}

/// Result of evaluating one item against one test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemOutcome {
    /// Passed with this raw value.
    Passed(f32),
    /// No passing readings.
    Failed,
    /// Excluded without judgment (empty context or forced skip).
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum Forced {
    Skip,
    State { passed: bool, value: f32 },
}

/// Collects the per-context readings of one item.
#[derive(Debug)]
pub struct ItemScoreSink<'a> {
    config: &'a TestConfig,
    bound: &'a BoundTestParams,
    readings: usize,
    passing: usize,
    sum: f32,
    min: f32,
    max: f32,
    forced: Option<Forced>,
}

impl<'a> ItemScoreSink<'a> {
    /// Empty sink for one item.
    pub fn new(config: &'a TestConfig, bound: &'a BoundTestParams) -> Self {
        Self {
            config,
            bound,
            readings: 0,
            passing: 0,
            sum: 0.0,
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            forced: None,
        }
    }

    fn float_passes(&self, value: f32) -> bool {
        if !self.config.purpose.filters() {
            return true;
        }
        let (lo, hi) = (self.bound.filter_min, self.bound.filter_max);
        match self.config.filter_type {
            FilterType::Minimum => value >= lo,
            FilterType::Maximum => value <= hi,
            FilterType::Range => value >= lo && value <= hi,
            FilterType::Match => false,
        }
    }

    fn accept(&mut self, passed: bool, value: f32) {
        self.readings += 1;
        if passed {
            self.passing += 1;
            self.sum += value;
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    /// Records one float reading.
    pub fn push_float(&mut self, value: f32) {
        let passed = self.float_passes(value);
        self.accept(passed, value);
    }

    /// Records one boolean reading; scores `1.0` when it matches the
    /// expected value.
    pub fn push_bool(&mut self, value: bool) {
        let matched = value == self.config.bool_match;
        let passed = if self.config.purpose.filters() {
            self.config.filter_type == FilterType::Match && matched
        } else {
            true
        };
        self.accept(passed, if matched { 1.0 } else { 0.0 });
    }

    /// Marks the item skipped regardless of readings.
    pub fn skip(&mut self) {
        self.forced = Some(Forced::Skip);
    }

    /// Overrides the outcome.
    pub fn force(&mut self, passed: bool, value: f32) {
        self.forced = Some(Forced::State { passed, value });
    }

    /// Number of readings pushed so far.
    pub fn readings(&self) -> usize {
        self.readings
    }

    /// Folds the readings into one outcome.
    pub fn finish(self) -> ItemOutcome {
        match self.forced {
            Some(Forced::Skip) => return ItemOutcome::Skipped,
            Some(Forced::State { passed: true, value }) => return ItemOutcome::Passed(value),
            Some(Forced::State { passed: false, .. }) => return ItemOutcome::Failed,
            None => {}
        }
        if self.readings == 0 {
            return ItemOutcome::Skipped;
        }
        let all_pass = self.passing == self.readings;
        let passed = match self.config.filter_op {
            FilterOp::AllPass => all_pass,
            FilterOp::AnyPass => self.passing > 0,
        };
        if !passed || self.passing == 0 {
            return ItemOutcome::Failed;
        }
        let raw = match self.config.score_op {
            ScoreOp::Average => self.sum / self.passing as f32,
            ScoreOp::Min => self.min,
            ScoreOp::Max => self.max,
        };
        ItemOutcome::Passed(raw)
    }
}

/// Normalization bounds chosen for one test pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBounds {
    /// Value mapped to `0`.
    pub low: f32,
    /// Value mapped to `1`.
    pub high: f32,
}

/// Picks normalization bounds from clamps and the observed range.
///
/// Returns `None` when no item has a usable raw value or the bounds
/// coincide, in which case the test contributes nothing.
pub fn score_bounds(
    config: &TestConfig,
    bound: &BoundTestParams,
    test_index: usize,
    items: &[Item],
    details: &[ItemDetails],
) -> Option<ScoreBounds> {
    let mut observed_min = f32::INFINITY;
    let mut observed_max = f32::NEG_INFINITY;
    for (item, detail) in items.iter().zip(details) {
        let raw = detail.test_results[test_index];
        if item.is_valid() && raw != SKIPPED_ITEM_VALUE {
            observed_min = observed_min.min(raw);
            observed_max = observed_max.max(raw);
        }
    }
    if observed_min > observed_max {
        return None;
    }
    let low = match config.clamp_min {
        ClampType::None => match config.normalization {
            Normalization::RelativeToScores => observed_min,
            Normalization::Absolute => observed_min.min(0.0),
        },
        ClampType::SpecifiedValue(_) => bound.clamp_min.unwrap_or(observed_min),
        ClampType::FilterThreshold => bound.filter_min,
    };
    let high = match config.clamp_max {
        ClampType::None => observed_max,
        ClampType::SpecifiedValue(_) => bound.clamp_max.unwrap_or(observed_max),
        ClampType::FilterThreshold => bound.filter_max,
    };
    if (high - low).abs() <= EPSILON {
        return None;
    }
    Some(ScoreBounds { low, high })
}

/// Normalizes one test's raw values and adds the weighted results into the
/// item scores. Filter-only tests are left untouched.
pub fn normalize_test(
    config: &TestConfig,
    bound: &BoundTestParams,
    test_index: usize,
    items: &mut [Item],
    details: &mut [ItemDetails],
) {
    if !config.purpose.scores() {
        return;
    }
    let Some(ScoreBounds { low, high }) = score_bounds(config, bound, test_index, items, details)
    else {
        return;
    };
    let span = high - low;
    for (item, detail) in items.iter_mut().zip(details.iter_mut()) {
        let raw = detail.test_results[test_index];
        if !item.is_valid() || raw == SKIPPED_ITEM_VALUE {
            continue;
        }
        let n = (math::clamp(raw, low, high) - low) / span;
        let weighted = bound.factor * config.equation.apply(n);
        detail.test_weighted_scores[test_index] = weighted;
        item.score += weighted;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn valid_items(raws: &[f32]) -> (Vec<Item>, Vec<ItemDetails>) {
        let items = raws
            .iter()
            .enumerate()
            .map(|(i, _)| Item {
                score: 0.0,
                data_offset: (i * 12) as i32,
                discarded: false,
            })
            .collect();
        let details = raws
            .iter()
            .map(|raw| ItemDetails {
                test_results: vec![*raw],
                test_weighted_scores: vec![0.0],
            })
            .collect();
        (items, details)
    }

    #[test]
    fn equations_map_unit_interval() {
        assert_eq!(ScoreEquation::Constant.apply(0.0), 0.0);
        assert_eq!(ScoreEquation::Constant.apply(0.25), 1.0);
        assert_eq!(ScoreEquation::Linear.apply(0.25), 0.25);
        assert_eq!(ScoreEquation::Square.apply(0.5), 0.25);
        assert_eq!(ScoreEquation::InverseLinear.apply(0.25), 0.75);
    }

    #[test]
    fn range_filter_and_average() {
        let config = TestConfig {
            filter_type: FilterType::Range,
            ..TestConfig::default()
        };
        let bound = BoundTestParams {
            filter_min: 10.0,
            filter_max: 50.0,
            factor: 1.0,
            ..BoundTestParams::default()
        };
        let mut sink = ItemScoreSink::new(&config, &bound);
        sink.push_float(20.0);
        sink.push_float(40.0);
        assert_eq!(sink.finish(), ItemOutcome::Passed(30.0));

        let mut sink = ItemScoreSink::new(&config, &bound);
        sink.push_float(20.0);
        sink.push_float(60.0);
        assert_eq!(sink.finish(), ItemOutcome::Failed);
    }

    #[test]
    fn any_pass_scores_only_passing_readings() {
        let config = TestConfig {
            filter_type: FilterType::Maximum,
            filter_op: FilterOp::AnyPass,
            score_op: ScoreOp::Max,
            ..TestConfig::default()
        };
        let bound = BoundTestParams {
            filter_max: 10.0,
            ..BoundTestParams::default()
        };
        let mut sink = ItemScoreSink::new(&config, &bound);
        sink.push_float(3.0);
        sink.push_float(7.0);
        sink.push_float(12.0);
        assert_eq!(sink.finish(), ItemOutcome::Passed(7.0));
    }

    #[test]
    fn float_match_always_fails() {
        let config = TestConfig {
            filter_type: FilterType::Match,
            ..TestConfig::default()
        };
        let bound = BoundTestParams::default();
        let mut sink = ItemScoreSink::new(&config, &bound);
        sink.push_float(0.0);
        assert_eq!(sink.finish(), ItemOutcome::Failed);
    }

    #[test]
    fn bool_readings_follow_expectation() {
        let filter = TestConfig::matching(false);
        let bound = BoundTestParams::default();
        let mut sink = ItemScoreSink::new(&filter, &bound);
        sink.push_bool(false);
        assert_eq!(sink.finish(), ItemOutcome::Passed(1.0));
        let mut sink = ItemScoreSink::new(&filter, &bound);
        sink.push_bool(true);
        assert_eq!(sink.finish(), ItemOutcome::Failed);

        let bad = TestConfig {
            filter_type: FilterType::Minimum,
            ..TestConfig::matching(true)
        };
        let mut sink = ItemScoreSink::new(&bad, &bound);
        sink.push_bool(true);
        assert_eq!(sink.finish(), ItemOutcome::Failed);

        let score_only = TestConfig::scoring(ScoreEquation::Linear, 1.0);
        let mut sink = ItemScoreSink::new(&score_only, &bound);
        sink.push_bool(false);
        assert_eq!(sink.finish(), ItemOutcome::Passed(0.0));
    }

    #[test]
    fn no_readings_means_skipped() {
        let config = TestConfig::default();
        let bound = BoundTestParams::default();
        assert_eq!(ItemScoreSink::new(&config, &bound).finish(), ItemOutcome::Skipped);
        let mut forced = ItemScoreSink::new(&config, &bound);
        forced.push_float(1.0);
        forced.skip();
        assert_eq!(forced.finish(), ItemOutcome::Skipped);
    }

    #[test]
    fn identical_raw_values_contribute_nothing() {
        let config = TestConfig::scoring(ScoreEquation::Linear, 3.0);
        let bound = config.bind(&QueryParams::new()).unwrap();
        let (mut items, mut details) = valid_items(&[7.0, 7.0, 7.0]);
        normalize_test(&config, &bound, 0, &mut items, &mut details);
        for (item, detail) in items.iter().zip(&details) {
            assert_eq!(item.score, 0.0);
            assert_eq!(detail.test_weighted_scores[0], 0.0);
        }
    }

    #[test]
    fn skipped_values_are_ignored_by_bounds() {
        let config = TestConfig::scoring(ScoreEquation::Linear, 1.0);
        let bound = config.bind(&QueryParams::new()).unwrap();
        let (mut items, mut details) = valid_items(&[0.0, SKIPPED_ITEM_VALUE, 4.0]);
        normalize_test(&config, &bound, 0, &mut items, &mut details);
        assert_eq!(items[0].score, 0.0);
        assert_eq!(items[1].score, 0.0);
        assert_eq!(items[2].score, 1.0);
    }

    #[test]
    fn absolute_normalization_anchors_at_zero() {
        let config = TestConfig {
            normalization: Normalization::Absolute,
            ..TestConfig::scoring(ScoreEquation::Linear, 1.0)
        };
        let bound = config.bind(&QueryParams::new()).unwrap();
        let (mut items, mut details) = valid_items(&[2.0, 4.0]);
        normalize_test(&config, &bound, 0, &mut items, &mut details);
        assert_eq!(items[0].score, 0.5);
        assert_eq!(items[1].score, 1.0);
    }

    #[test]
    fn incompatible_filter_threshold_clamp_falls_back() {
        let config = TestConfig {
            purpose: TestPurpose::FilterAndScore,
            filter_type: FilterType::Minimum,
            clamp_min: ClampType::FilterThreshold,
            clamp_max: ClampType::FilterThreshold,
            ..TestConfig::default()
        };
        let sane = config.sanitized("distance", ValueKind::Float);
        assert_eq!(sane.clamp_min, ClampType::FilterThreshold);
        assert_eq!(sane.clamp_max, ClampType::None);
    }

    #[test]
    fn bind_reports_missing_named_factor() {
        let config = TestConfig {
            factor: FloatParam::named("weight"),
            ..TestConfig::scoring(ScoreEquation::Linear, 1.0)
        };
        assert_eq!(config.required_params(), vec!["weight"]);
        assert_eq!(
            config.bind(&QueryParams::new()),
            Err(MissingParam("weight".into()))
        );
        let bound = config.bind(&QueryParams::new().with("weight", 2.5)).unwrap();
        assert_eq!(bound.factor, 2.5);
    }
}
