//! Periodic Dip Search Features
//!
//! Wraps the bounded box-dip search. The core values are reported whenever
//! the search scored a candidate, significant or not; the vetting statistics
//! only exist for significant candidates.

use crate::features::{DomainContext, FeatureDomain};
use crate::record::{Domain, DomainFeatures, FeatureValue};
use periodic_search::{Budget, PeriodicSearch, SearchConfig, SearchResult};
use signal_conditioner::CleanedSeries;
use std::time::Duration;
use tracing::warn;

const MIN_POINTS: usize = 500;

/// Periodic dip search domain
pub struct DipSearchDomain {
    engine: PeriodicSearch,
    use_alarm: bool,
}

impl DipSearchDomain {
    /// Create the domain.
    ///
    /// With `use_alarm` the budget is enforced by `SIGALRM`; this is meant for
    /// worker processes that run one target at a time. Otherwise a monotonic
    /// clock deadline is used.
    pub fn new(config: SearchConfig, use_alarm: bool) -> Self {
        Self {
            engine: PeriodicSearch::new(config),
            use_alarm,
        }
    }

    fn budget(&self) -> Budget {
        let secs = self.engine.config().budget_secs;
        if secs == 0 {
            return Budget::Unbounded;
        }
        let limit = Duration::from_secs(secs);
        if !self.use_alarm {
            return Budget::clock(limit);
        }
        match Budget::alarm(limit) {
            Ok(budget) => budget,
            Err(e) => {
                warn!("Search alarm unavailable ({}), using clock deadline", e);
                Budget::clock(limit)
            }
        }
    }

    /// Translate a search result into features
    pub fn features(result: &SearchResult) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Search);
        out.set_value("bls_segments_searched", result.segments_searched as f64);
        out.timed_out = result.timed_out;

        let Some(best) = result.best else {
            return out;
        };
        out.set_value("bls_power", best.power);
        out.set_value("bls_period", best.period);
        out.set_value("bls_depth", best.depth);
        out.set_value("bls_duration", best.duration);
        if let Some(significant) = result.significant {
            out.set("bls_significant", FeatureValue::flag(significant));
        }

        match &result.vetting {
            Some(vetting) => {
                out.set_value("bls_n_events", vetting.n_events as f64);
                out.set(
                    "bls_depth_consistency",
                    FeatureValue::maybe(vetting.depth_consistency),
                );
                out.set(
                    "bls_timing_jitter",
                    FeatureValue::maybe(vetting.timing_jitter_min),
                );
                out.set(
                    "bls_implied_radius_rjup",
                    FeatureValue::maybe(vetting.implied_radius_rjup),
                );
                if let Some(plausible) = vetting.plausible {
                    out.set("bls_plausible", FeatureValue::flag(plausible));
                }
                if let Some(consistent) = vetting.odd_even_consistent {
                    out.set("bls_odd_even_consistent", FeatureValue::flag(consistent));
                }
            }
            None if result.significant == Some(false) => {
                out.set_value("bls_n_events", 0.0);
            }
            None => {}
        }
        out
    }
}

impl Default for DipSearchDomain {
    fn default() -> Self {
        Self::new(SearchConfig::default(), false)
    }
}

impl FeatureDomain for DipSearchDomain {
    fn domain(&self) -> Domain {
        Domain::Search
    }

    fn compute(&self, series: &CleanedSeries, ctx: &DomainContext) -> DomainFeatures {
        if series.len() < MIN_POINTS {
            return Self::features(&SearchResult::default());
        }
        // Guard lives until the search returns, then disarms the timer
        let budget = self.budget();
        let result = self
            .engine
            .run(&series.time, &series.flux, ctx.stellar_radius, &budget);
        Self::features(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use periodic_search::{BoxCandidate, Vetting};

    fn candidate() -> BoxCandidate {
        BoxCandidate {
            period: 3.0,
            power: 4.0,
            depth: 0.001,
            duration: 0.1,
            epoch: 1.0,
        }
    }

    #[test]
    fn test_never_ran() {
        let out = DipSearchDomain::features(&SearchResult::default());
        assert_eq!(out.get("bls_segments_searched").unwrap().value, Some(0.0));
        assert!(!out.get("bls_power").unwrap().valid);
        assert!(!out.get("bls_significant").unwrap().valid);
        assert!(!out.get("bls_n_events").unwrap().valid);
    }

    #[test]
    fn test_not_significant_keeps_core_values() {
        let result = SearchResult {
            best: Some(candidate()),
            significant: Some(false),
            segments_searched: 1,
            ..SearchResult::default()
        };
        let out = DipSearchDomain::features(&result);
        assert_eq!(out.get("bls_power").unwrap().value, Some(4.0));
        assert_eq!(out.get("bls_significant").unwrap().value, Some(0.0));
        assert_eq!(out.get("bls_n_events").unwrap().value, Some(0.0));
        assert!(!out.get("bls_plausible").unwrap().valid);
    }

    #[test]
    fn test_significant_carries_vetting() {
        let result = SearchResult {
            best: Some(candidate()),
            significant: Some(true),
            segments_searched: 2,
            timed_out: true,
            work_units: 10,
            vetting: Some(Vetting {
                n_events: 12,
                depth_consistency: Some(0.1),
                timing_jitter_min: None,
                implied_radius_rjup: Some(0.3),
                plausible: Some(true),
                odd_even_consistent: Some(false),
            }),
        };
        let out = DipSearchDomain::features(&result);
        assert!(out.timed_out);
        assert_eq!(out.get("bls_n_events").unwrap().value, Some(12.0));
        assert!(!out.get("bls_timing_jitter").unwrap().valid);
        assert_eq!(out.get("bls_odd_even_consistent").unwrap().value, Some(0.0));
    }
}
