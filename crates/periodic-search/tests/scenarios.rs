//! End-to-end recovery of injected box dips

use periodic_search::{Budget, PeriodicSearch};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const BASELINE_DAYS: f64 = 120.0;
const CADENCE_DAYS: f64 = 1.0 / 48.0;
const NOISE: f64 = 0.001;
const PERIOD: f64 = 3.7;
const DURATION: f64 = 0.2;
const FIRST_EVENT: f64 = 1.1;

/// Light curve with box dips whose depth alternates between `depths[0]`
/// (even events) and `depths[1]` (odd events)
fn light_curve(depths: [f64; 2], seed: u64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE).unwrap();
    let n = (BASELINE_DAYS / CADENCE_DAYS) as usize;
    let time: Vec<f64> = (0..n).map(|i| i as f64 * CADENCE_DAYS).collect();
    let flux = time
        .iter()
        .map(|&t| {
            let event = ((t - FIRST_EVENT) / PERIOD).round();
            let in_dip = (t - FIRST_EVENT - event * PERIOD).abs() < DURATION / 2.0;
            let depth = if in_dip {
                depths[(event as i64).rem_euclid(2) as usize]
            } else {
                0.0
            };
            1.0 - depth + noise.sample(&mut rng)
        })
        .collect();
    (time, flux)
}

#[test]
fn test_injected_dip_recovered() {
    let (time, flux) = light_curve([0.005, 0.005], 42);
    let result = PeriodicSearch::default().run(&time, &flux, None, &Budget::Unbounded);

    let best = result.best.expect("candidate");
    assert!(
        (best.period - PERIOD).abs() / PERIOD < 0.01,
        "period {}",
        best.period
    );
    assert!((best.depth - 0.005).abs() < 0.0015, "depth {}", best.depth);
    assert_eq!(result.significant, Some(true));
    assert_eq!(result.segments_searched, 1);
    assert!(!result.timed_out);

    let vetting = result.vetting.expect("significant candidates are vetted");
    assert!(vetting.n_events >= 25);
    assert_eq!(vetting.plausible, Some(true));
    assert_eq!(vetting.odd_even_consistent, Some(true));
}

#[test]
fn test_alternating_depths_flagged() {
    let (time, flux) = light_curve([0.006, 0.004], 7);
    let result = PeriodicSearch::default().run(&time, &flux, None, &Budget::Unbounded);

    let best = result.best.expect("candidate");
    assert!((best.period - PERIOD).abs() / PERIOD < 0.01);
    assert_eq!(result.significant, Some(true));
    let vetting = result.vetting.expect("significant candidates are vetted");
    assert_eq!(vetting.odd_even_consistent, Some(false));
}

#[test]
fn test_large_stellar_radius_makes_dip_implausible() {
    let (time, flux) = light_curve([0.005, 0.005], 3);
    // sqrt(0.005) * 4 R_sun is about 2.8 R_Jup
    let result = PeriodicSearch::default().run(&time, &flux, Some(4.0), &Budget::Unbounded);
    let vetting = result.vetting.expect("significant candidates are vetted");
    assert_eq!(vetting.plausible, Some(false));
}
