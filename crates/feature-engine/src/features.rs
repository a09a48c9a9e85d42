//! Feature Record Assembly

use crate::dip_search::DipSearchDomain;
use crate::frequency::FrequencyDomain;
use crate::jitter::JitterDomain;
use crate::record::{Domain, DomainFeatures, FeatureRecord};
use crate::residual::ResidualDomain;
use crate::shape::ShapeDomain;
use crate::statistics::StatisticalDomain;
use crate::temporal::TemporalDomain;
use periodic_search::SearchConfig;
use signal_conditioner::CleanedSeries;
use std::time::Duration;
use tracing::debug;

/// Per-target facts a domain may use beyond the series itself
#[derive(Debug, Clone, Default)]
pub struct DomainContext {
    /// Primary radius in solar radii, when the source knows it
    pub stellar_radius: Option<f64>,
}

/// One independent feature computator.
///
/// Implementations are pure with respect to the series: no shared mutable
/// state, and every feature they cannot compute is left invalid.
pub trait FeatureDomain: Send + Sync {
    /// Which schema block this domain fills
    fn domain(&self) -> Domain;

    /// Compute the domain's features
    fn compute(&self, series: &CleanedSeries, ctx: &DomainContext) -> DomainFeatures;
}

/// Time limits applied inside the domains
#[derive(Debug, Clone)]
pub struct DomainBudgets {
    /// Wall-clock limit for the residual complexity measure
    pub complexity: Duration,
    /// Enforce the search budget with `SIGALRM` instead of a clock deadline
    pub search_alarm: bool,
}

impl Default for DomainBudgets {
    fn default() -> Self {
        Self {
            complexity: Duration::from_secs(5),
            search_alarm: false,
        }
    }
}

/// The full set of feature domains in schema order
pub struct FeatureExtractor {
    domains: Vec<Box<dyn FeatureDomain>>,
}

impl FeatureExtractor {
    /// Create the extractor with every domain
    pub fn new(search: SearchConfig, budgets: DomainBudgets) -> Self {
        let domains: Vec<Box<dyn FeatureDomain>> = vec![
            Box::new(StatisticalDomain),
            Box::new(TemporalDomain),
            Box::new(FrequencyDomain),
            Box::new(ResidualDomain::new(budgets.complexity)),
            Box::new(ShapeDomain),
            Box::new(JitterDomain),
            Box::new(DipSearchDomain::new(search, budgets.search_alarm)),
        ];
        Self { domains }
    }

    /// Extractor over an explicit domain list.
    ///
    /// Schema blocks of domains left out stay invalid in every record.
    pub fn from_domains(domains: Vec<Box<dyn FeatureDomain>>) -> Self {
        Self { domains }
    }

    /// Domains in execution order
    pub fn domains(&self) -> &[Box<dyn FeatureDomain>] {
        &self.domains
    }

    /// Run every domain in order and merge the results.
    ///
    /// No fault isolation happens here; callers that need it drive
    /// [`domains`](Self::domains) themselves.
    pub fn extract(&self, series: &CleanedSeries, ctx: &DomainContext) -> FeatureRecord {
        let mut record = FeatureRecord::new();
        for domain in &self.domains {
            let features = domain.compute(series, ctx);
            debug!(
                "Domain {}: {} valid features",
                domain.domain(),
                features.iter().filter(|(_, v)| v.valid).count()
            );
            record.merge(&features);
        }
        record
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(SearchConfig::default(), DomainBudgets::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains_cover_schema_in_order() {
        let extractor = FeatureExtractor::default();
        let order: Vec<Domain> = extractor.domains().iter().map(|d| d.domain()).collect();
        assert_eq!(order, Domain::ALL.to_vec());
    }
}
