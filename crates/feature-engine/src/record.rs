//! Feature Record and Schema
//!
//! Every record carries every schema name. A feature that could not be
//! computed is present as `(null, valid = false)`, never omitted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Feature domains, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Statistical,
    Temporal,
    Frequency,
    Residual,
    Shape,
    Jitter,
    Search,
}

const STATISTICAL: &[&str] = &[
    "stat_mean",
    "stat_median",
    "stat_std",
    "stat_variance",
    "stat_mad",
    "stat_range",
    "stat_iqr",
    "stat_skewness",
    "stat_kurtosis",
    "stat_percentile_5",
    "stat_percentile_95",
    "stat_beyond_1sigma",
];

const TEMPORAL: &[&str] = &[
    "temp_duration_days",
    "temp_n_points",
    "temp_cadence_median",
    "temp_cadence_std",
    "temp_n_gaps",
    "temp_largest_gap_days",
    "temp_autocorr_1hr",
    "temp_autocorr_1day",
    "temp_autocorr_1week",
    "temp_memory_coefficient",
    "temp_trend_slope",
    "temp_trend_strength",
    "temp_stationarity_stat",
];

const FREQUENCY: &[&str] = &[
    "freq_dominant_period",
    "freq_dominant_power",
    "freq_secondary_period",
    "freq_secondary_power",
    "freq_period_snr",
    "freq_n_significant_peaks",
    "freq_spectral_entropy",
    "freq_low_freq_power",
    "freq_high_freq_power",
    "freq_power_ratio",
    "freq_harmonic_count",
    "freq_quasi_periodic_score",
    "freq_is_instrumental_alias",
];

const RESIDUAL: &[&str] = &[
    "resid_std",
    "resid_autocorr_lag1",
    "resid_structure_score",
    "resid_power_ratio",
    "resid_entropy",
    "resid_runs_test_pvalue",
    "resid_ljung_box_stat",
    "resid_complexity",
];

const SHAPE: &[&str] = &[
    "shape_n_high_excursions",
    "shape_n_low_excursions",
    "shape_max_excursion_up",
    "shape_max_excursion_down",
    "shape_asymmetry",
    "shape_max_consecutive_up",
    "shape_max_consecutive_down",
    "shape_crossing_rate",
];

const JITTER: &[&str] = &["jitter_mean", "jitter_std", "jitter_max", "jitter_rms"];

const SEARCH: &[&str] = &[
    "bls_power",
    "bls_period",
    "bls_depth",
    "bls_duration",
    "bls_significant",
    "bls_n_events",
    "bls_depth_consistency",
    "bls_timing_jitter",
    "bls_implied_radius_rjup",
    "bls_plausible",
    "bls_odd_even_consistent",
    "bls_segments_searched",
];

impl Domain {
    /// All domains in execution order
    pub const ALL: [Domain; 7] = [
        Domain::Statistical,
        Domain::Temporal,
        Domain::Frequency,
        Domain::Residual,
        Domain::Shape,
        Domain::Jitter,
        Domain::Search,
    ];

    /// Feature names owned by this domain
    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Domain::Statistical => STATISTICAL,
            Domain::Temporal => TEMPORAL,
            Domain::Frequency => FREQUENCY,
            Domain::Residual => RESIDUAL,
            Domain::Shape => SHAPE,
            Domain::Jitter => JITTER,
            Domain::Search => SEARCH,
        }
    }

    /// Short lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Domain::Statistical => "statistical",
            Domain::Temporal => "temporal",
            Domain::Frequency => "frequency",
            Domain::Residual => "residual",
            Domain::Shape => "shape",
            Domain::Jitter => "jitter",
            Domain::Search => "search",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every feature name in schema order
pub fn schema() -> impl Iterator<Item = &'static str> {
    Domain::ALL.iter().flat_map(|d| d.features().iter().copied())
}

/// Total number of schema features
pub fn schema_len() -> usize {
    Domain::ALL.iter().map(|d| d.features().len()).sum()
}

/// One feature value with its validity flag.
///
/// `valid` is true exactly when `value` holds a finite number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureValue {
    pub value: Option<f64>,
    pub valid: bool,
}

impl FeatureValue {
    /// Missing value
    pub const INVALID: FeatureValue = FeatureValue {
        value: None,
        valid: false,
    };

    /// Wrap a number; non-finite numbers become invalid
    pub fn of(value: f64) -> Self {
        if value.is_finite() {
            Self {
                value: Some(value),
                valid: true,
            }
        } else {
            Self::INVALID
        }
    }

    /// Wrap an optional number
    pub fn maybe(value: Option<f64>) -> Self {
        value.map_or(Self::INVALID, Self::of)
    }

    /// Boolean stored as 1.0 / 0.0
    pub fn flag(value: bool) -> Self {
        Self::of(if value { 1.0 } else { 0.0 })
    }
}

/// Features produced by one domain run
#[derive(Debug, Clone)]
pub struct DomainFeatures {
    domain: Domain,
    values: BTreeMap<&'static str, FeatureValue>,
    /// A bounded computation inside the domain ran out of time
    pub timed_out: bool,
}

impl DomainFeatures {
    /// All of the domain's features, invalid
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            values: domain
                .features()
                .iter()
                .map(|&name| (name, FeatureValue::INVALID))
                .collect(),
            timed_out: false,
        }
    }

    /// Domain these features belong to
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Set a feature. Names outside the domain's schema are ignored.
    pub fn set(&mut self, name: &'static str, value: FeatureValue) {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
        } else {
            debug_assert!(false, "{} is not a {} feature", name, self.domain);
        }
    }

    /// Set a numeric feature
    pub fn set_value(&mut self, name: &'static str, value: f64) {
        self.set(name, FeatureValue::of(value));
    }

    /// Look up a feature
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.values.get(name).copied()
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, FeatureValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Mapping of every schema feature name to its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureRecord {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureRecord {
    /// Record with every schema name present and invalid
    pub fn new() -> Self {
        Self {
            values: schema()
                .map(|name| (name.to_string(), FeatureValue::INVALID))
                .collect(),
        }
    }

    /// Copy a domain's features into the record
    pub fn merge(&mut self, features: &DomainFeatures) {
        for (name, value) in features.iter() {
            if let Some(slot) = self.values.get_mut(name) {
                *slot = value;
            }
        }
    }

    /// Reset every feature of `domain` to invalid
    pub fn invalidate(&mut self, domain: Domain) {
        for name in domain.features() {
            if let Some(slot) = self.values.get_mut(*name) {
                *slot = FeatureValue::INVALID;
            }
        }
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<FeatureValue> {
        self.values.get(name).copied()
    }

    /// Value of a feature if it is valid
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.value)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of valid features
    pub fn valid_count(&self) -> usize {
        self.values.values().filter(|v| v.valid).count()
    }

    /// Every schema name present and every value consistent with its flag
    pub fn is_complete(&self) -> bool {
        schema().all(|name| match self.values.get(name) {
            Some(v) => v.valid == v.value.map_or(false, f64::is_finite),
            None => false,
        })
    }

    /// Iterate over `(name, value)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureValue)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for FeatureRecord {
    fn default() -> Self {
        Self::new()
    }
}
