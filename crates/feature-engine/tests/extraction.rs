//! Whole-record extraction over conditioned light curves

use feature_engine::{
    schema, schema_len, DomainBudgets, DomainContext, FeatureExtractor, StatisticalDomain,
    FeatureDomain,
};
use periodic_search::SearchConfig;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use signal_conditioner::{ClipOutcome, CleanedSeries, Conditioner, RawSegment};
use std::collections::BTreeMap;
use std::time::Duration;

fn fast_extractor() -> FeatureExtractor {
    let search = SearchConfig {
        budget_secs: 2,
        oversample: 1.0,
        n_durations: 2,
        ..SearchConfig::default()
    };
    FeatureExtractor::new(
        search,
        DomainBudgets {
            complexity: Duration::from_millis(500),
            search_alarm: false,
        },
    )
}

#[test]
fn test_single_spike_is_clipped_before_statistics() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 100 * 48;
    let time: Vec<f64> = (0..n).map(|i| i as f64 / 48.0).collect();
    let noise = Normal::new(1000.0, 1.0).unwrap();
    let mut flux: Vec<f64> = (0..n).map(|_| noise.sample(&mut rng)).collect();
    flux[n / 2] += 50.0;

    let series = Conditioner::default()
        .condition(&[RawSegment::new(time, flux)])
        .unwrap();
    assert!(matches!(series.clip, ClipOutcome::Clipped { removed } if removed >= 1));

    let features = StatisticalDomain.compute(&series, &DomainContext::default());
    let kurtosis = features.get("stat_kurtosis").unwrap().value.unwrap();
    assert!(kurtosis.abs() < 0.5, "kurtosis {kurtosis}");
}

#[test]
fn test_record_from_conditioned_curve() {
    let mut rng = StdRng::seed_from_u64(5);
    let n = 100 * 24;
    let time: Vec<f64> = (0..n).map(|i| i as f64 / 24.0).collect();
    let noise = Normal::new(0.0, 1.0).unwrap();
    let jitter = Normal::new(0.0, 0.01).unwrap();
    let flux: Vec<f64> = time
        .iter()
        .map(|t| 500.0 * (1.0 + 0.002 * (t / 4.3 * std::f64::consts::TAU).sin()) + noise.sample(&mut rng))
        .collect();
    let centroid: Vec<f64> = (0..n).map(|_| jitter.sample(&mut rng)).collect();
    let segment = RawSegment::new(time, flux)
        .with_column("mom_centr1", centroid.clone())
        .with_column("mom_centr2", centroid);

    let series = Conditioner::default().condition(&[segment]).unwrap();
    let record = fast_extractor().extract(&series, &DomainContext::default());

    assert_eq!(record.len(), schema_len());
    assert!(record.is_complete());
    for name in ["stat_mean", "temp_autocorr_1day", "freq_dominant_period", "jitter_rms"] {
        assert!(record.get(name).unwrap().valid, "{name}");
    }
    let period = record.value("freq_dominant_period").unwrap();
    assert!((period - 4.3).abs() < 0.3, "period {period}");
}

fn series_strategy() -> impl Strategy<Value = CleanedSeries> {
    (0usize..700, any::<u64>()).prop_map(|(n, seed)| {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut t = 0.0;
        let mut time = Vec::with_capacity(n);
        let mut flux = Vec::with_capacity(n);
        for _ in 0..n {
            t += 0.01 + 0.2 * rng.random::<f64>();
            time.push(t);
            flux.push(1.0 + 0.01 * (rng.random::<f64>() - 0.5));
        }
        CleanedSeries {
            time,
            flux,
            columns: BTreeMap::new(),
            clip: ClipOutcome::NotNeeded,
            n_raw: n,
            n_quality_dropped: 0,
            n_segments: 1,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_record_always_has_every_feature(series in series_strategy()) {
        let record = fast_extractor().extract(&series, &DomainContext::default());
        prop_assert_eq!(record.len(), schema_len());
        prop_assert!(record.is_complete());
        for name in schema() {
            let value = record.get(name).unwrap();
            prop_assert_eq!(value.valid, value.value.is_some());
        }
    }
}
