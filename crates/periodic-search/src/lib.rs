//! Bounded Periodic Search
//!
//! Box-dip search for recurring dips in a cleaned light curve:
//! - Running-median flatten and fixed-width binning
//! - Trial periods and durations derived from the data
//! - Segmentation of long baselines so cost grows linearly with span
//! - Wall-clock budget enforced through `SIGALRM` or a monotonic deadline
//! - Plausibility vetting of significant candidates

mod bls;
mod budget;
mod error;
mod params;
pub mod prepare;
mod search;
mod vetting;

pub use bls::{search_span, BoxCandidate, SpanOutcome};
pub use budget::{AlarmGuard, Budget};
pub use error::BudgetError;
pub use params::SearchParams;
pub use search::{PeriodicSearch, SearchConfig, SearchResult};
pub use vetting::{vet, Vetting};
