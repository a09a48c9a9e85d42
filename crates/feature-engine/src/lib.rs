//! Feature Engineering Engine
//!
//! Independent feature domains mapping a cleaned light curve to named scalar
//! features with validity flags, plus the fixed schema they fill.

mod dip_search;
mod features;
mod fft;
mod frequency;
mod jitter;
pub mod numeric;
mod record;
mod residual;
mod shape;
mod statistics;
mod temporal;

pub use dip_search::DipSearchDomain;
pub use features::{DomainBudgets, DomainContext, FeatureDomain, FeatureExtractor};
pub use fft::{FftAnalyzer, Spectrum};
pub use frequency::{is_instrumental_period, FrequencyDomain};
pub use jitter::{centroid_columns, CentroidColumns, JitterDomain, CENTROID_CONVENTIONS};
pub use record::{schema, schema_len, Domain, DomainFeatures, FeatureRecord, FeatureValue};
pub use residual::{lempel_ziv_complexity, ComplexityTimeout, ResidualDomain};
pub use shape::ShapeDomain;
pub use statistics::{StatisticalDomain, StatisticalFeatures};
pub use temporal::TemporalDomain;
