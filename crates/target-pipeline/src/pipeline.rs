//! Per-target state machine
//!
//! `Fetched → Conditioned → DomainsRunning(n) → Assembled → Persisted | Failed`.
//! Only acquisition and insufficient data end a target early. A domain that
//! panics or runs out of budget degrades its own features and nothing else.

use crate::source::{RawSampleSource, RawTarget};
use crate::status::{DomainFault, ProcessingStatus};
use crate::{PipelineConfig, PipelineError};
use feature_engine::{DomainBudgets, DomainContext, FeatureDomain, FeatureExtractor, FeatureRecord};
use periodic_search::SearchConfig;
use serde::{Deserialize, Serialize};
use signal_conditioner::{CleanedSeries, Conditioner, ConditionerConfig};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use storage::CanonicalId;
use tracing::{debug, info, warn};

/// Pipeline stage of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Fetched,
    Conditioned,
    /// Running the domain at this index
    DomainsRunning(usize),
    Assembled,
    Persisted,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Fetched => write!(f, "fetched"),
            PipelineStage::Conditioned => write!(f, "conditioned"),
            PipelineStage::DomainsRunning(n) => write!(f, "domains_running({})", n),
            PipelineStage::Assembled => write!(f, "assembled"),
            PipelineStage::Persisted => write!(f, "persisted"),
            PipelineStage::Failed => write!(f, "failed"),
        }
    }
}

/// Trace a stage transition
fn trace_stage(id: &CanonicalId, stage: PipelineStage) {
    debug!("{} -> {}", id, stage);
}

/// What conditioning did to the raw samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Points delivered by the source
    pub n_raw: usize,
    /// Points dropped for quality flags or non-finite values
    pub n_quality_dropped: usize,
    /// Points in the cleaned series
    pub n_clean: usize,
    /// Segments that contributed points
    pub n_segments: usize,
    /// The outlier clip was refused (high-variability target)
    pub unclipped: bool,
    /// Points removed by the clip
    pub n_clipped: usize,
    /// Cleaned baseline (days)
    pub span_days: f64,
}

impl Provenance {
    fn of(series: &CleanedSeries) -> Self {
        let n_clipped = match series.clip {
            signal_conditioner::ClipOutcome::Clipped { removed } => removed,
            _ => 0,
        };
        Self {
            n_raw: series.n_raw,
            n_quality_dropped: series.n_quality_dropped,
            n_clean: series.len(),
            n_segments: series.n_segments,
            unclipped: series.is_high_variability(),
            n_clipped,
            span_days: series.span(),
        }
    }
}

/// The persisted result for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: CanonicalId,
    pub features: FeatureRecord,
    pub status: ProcessingStatus,
    /// Degraded domains, empty on full success
    pub faults: Vec<DomainFault>,
    pub provenance: Provenance,
    /// Wall-clock time spent conditioning and extracting
    pub extraction_secs: f64,
}

/// Fetch, condition and extract one target at a time
pub struct TargetPipeline {
    source: Arc<dyn RawSampleSource>,
    conditioner: Conditioner,
    extractor: FeatureExtractor,
}

impl TargetPipeline {
    /// Pipeline with every feature domain
    pub fn new(
        source: Arc<dyn RawSampleSource>,
        conditioner: ConditionerConfig,
        search: SearchConfig,
        config: &PipelineConfig,
    ) -> Self {
        let budgets = DomainBudgets {
            complexity: Duration::from_millis(config.complexity_budget_ms),
            search_alarm: config.signal_budget,
        };
        info!(
            "Creating target pipeline (complexity budget {}ms, search budget {}s, signal budget {})",
            config.complexity_budget_ms, search.budget_secs, config.signal_budget
        );
        Self::with_extractor(source, conditioner, FeatureExtractor::new(search, budgets))
    }

    /// Pipeline over an explicit extractor
    pub fn with_extractor(
        source: Arc<dyn RawSampleSource>,
        conditioner: ConditionerConfig,
        extractor: FeatureExtractor,
    ) -> Self {
        Self {
            source,
            conditioner: Conditioner::new(conditioner),
            extractor,
        }
    }

    /// Fetch and process one target
    pub fn process(&self, id: &CanonicalId) -> Result<TargetRecord, PipelineError> {
        let raw = match self.source.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                trace_stage(id, PipelineStage::Failed);
                warn!("Acquisition failed for {}: {}", id, e);
                return Err(e.into());
            }
        };
        trace_stage(id, PipelineStage::Fetched);
        self.extract(id, raw)
    }

    /// Process already-fetched samples
    pub fn extract(&self, id: &CanonicalId, raw: RawTarget) -> Result<TargetRecord, PipelineError> {
        let start = Instant::now();

        let series = match self.conditioner.condition(&raw.segments) {
            Ok(series) => series,
            Err(e) => {
                trace_stage(id, PipelineStage::Failed);
                info!("{}: {}", id, e);
                return Err(e.into());
            }
        };
        trace_stage(id, PipelineStage::Conditioned);

        let ctx = DomainContext {
            stellar_radius: raw.stellar_radius,
        };
        let mut features = FeatureRecord::new();
        let mut faults = Vec::new();
        for (index, domain) in self.extractor.domains().iter().enumerate() {
            trace_stage(id, PipelineStage::DomainsRunning(index));
            run_isolated(domain.as_ref(), &series, &ctx, &mut features, &mut faults);
        }
        trace_stage(id, PipelineStage::Assembled);

        let status = ProcessingStatus::from_faults(&faults);
        let record = TargetRecord {
            id: id.clone(),
            features,
            status,
            faults,
            provenance: Provenance::of(&series),
            extraction_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            "{}: {} ({}/{} features valid, {} points, {:.2}s)",
            id,
            record.status,
            record.features.valid_count(),
            record.features.len(),
            record.provenance.n_clean,
            record.extraction_secs
        );
        Ok(record)
    }
}

/// Run one domain, converting a panic into a fault
fn run_isolated(
    domain: &dyn FeatureDomain,
    series: &CleanedSeries,
    ctx: &DomainContext,
    features: &mut FeatureRecord,
    faults: &mut Vec<DomainFault>,
) {
    let kind = domain.domain();
    match panic::catch_unwind(AssertUnwindSafe(|| domain.compute(series, ctx))) {
        Ok(computed) => {
            features.merge(&computed);
            if computed.timed_out {
                warn!("Domain {} ran out of budget", kind);
                faults.push(DomainFault::timeout(kind));
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("Domain {} failed: {}", kind, message);
            features.invalidate(kind);
            faults.push(DomainFault::panicked(kind, message));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::FaultReason;
    use feature_engine::{Domain, DomainFeatures, ShapeDomain, StatisticalDomain};
    use signal_conditioner::RawSegment;

    struct PanickingDomain;

    impl FeatureDomain for PanickingDomain {
        fn domain(&self) -> Domain {
            Domain::Frequency
        }

        fn compute(&self, _series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
            panic!("spectral grid exploded")
        }
    }

    struct SlowDomain;

    impl FeatureDomain for SlowDomain {
        fn domain(&self) -> Domain {
            Domain::Residual
        }

        fn compute(&self, _series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
            let mut features = DomainFeatures::new(Domain::Residual);
            features.timed_out = true;
            features
        }
    }

    fn sine_target(n: usize, span: f64) -> RawTarget {
        let time: Vec<f64> = (0..n).map(|i| i as f64 * span / n as f64).collect();
        let flux = time
            .iter()
            .map(|t| 1000.0 + 3.0 * (t * 1.3).sin() + ((t * 17.0).sin() * 0.5))
            .collect();
        RawTarget {
            segments: vec![RawSegment::new(time, flux)],
            stellar_radius: None,
        }
    }

    fn small_conditioner() -> ConditionerConfig {
        ConditionerConfig {
            min_points: 100,
            min_span_days: 10.0,
            ..ConditionerConfig::default()
        }
    }

    fn pipeline_with(domains: Vec<Box<dyn FeatureDomain>>, source: MemorySource) -> TargetPipeline {
        TargetPipeline::with_extractor(
            Arc::new(source),
            small_conditioner(),
            FeatureExtractor::from_domains(domains),
        )
    }

    fn id(raw: &str) -> CanonicalId {
        CanonicalId::parse(raw).unwrap()
    }

    #[test]
    fn test_panicking_domain_is_isolated() {
        let pipeline = pipeline_with(
            vec![
                Box::new(StatisticalDomain),
                Box::new(PanickingDomain),
                Box::new(ShapeDomain),
            ],
            MemorySource::new(),
        );
        let record = pipeline.extract(&id("KIC 42"), sine_target(400, 40.0)).unwrap();

        assert_eq!(record.status, ProcessingStatus::DomainFailure);
        assert_eq!(record.faults.len(), 1);
        assert_eq!(record.faults[0].domain, Domain::Frequency);
        assert_eq!(record.faults[0].reason, FaultReason::Panicked);
        assert!(record.faults[0].message.contains("exploded"));

        for name in Domain::Frequency.features() {
            assert!(!record.features.get(name).unwrap().valid, "{name}");
        }
        assert!(record.features.value("stat_mean").is_some());
        assert!(record.features.is_complete());
    }

    #[test]
    fn test_timed_out_domain_sets_status() {
        let pipeline = pipeline_with(
            vec![Box::new(StatisticalDomain), Box::new(SlowDomain)],
            MemorySource::new(),
        );
        let record = pipeline.extract(&id("KIC 42"), sine_target(400, 40.0)).unwrap();
        assert_eq!(record.status, ProcessingStatus::ComplexityTimeout);
        assert_eq!(record.faults[0].reason, FaultReason::Timeout);
    }

    #[test]
    fn test_insufficient_data_is_terminal() {
        let pipeline = pipeline_with(vec![Box::new(StatisticalDomain)], MemorySource::new());
        let err = pipeline.extract(&id("KIC 7"), sine_target(20, 2.0)).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_process_fetches_from_source() {
        let mut source = MemorySource::new();
        source.insert(id("TIC 9"), sine_target(400, 40.0));
        source.fail_transiently(id("TIC 9"), 1);
        let pipeline = pipeline_with(vec![Box::new(StatisticalDomain)], source);

        assert!(pipeline.process(&id("TIC 9")).unwrap_err().is_transient());
        let record = pipeline.process(&id("TIC 9")).unwrap();
        assert_eq!(record.status, ProcessingStatus::Success);
        assert_eq!(record.provenance.n_raw, 400);
        assert_eq!(record.provenance.n_segments, 1);
        assert!(!record.provenance.unclipped);

        let missing = pipeline.process(&id("TIC 10")).unwrap_err();
        assert!(!missing.is_transient());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let pipeline = pipeline_with(vec![Box::new(StatisticalDomain)], MemorySource::new());
        let record = pipeline.extract(&id("KIC 1"), sine_target(300, 30.0)).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        let back: TargetRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.features.valid_count(), record.features.valid_count());
    }
}
