//! FFT-based Frequency Analysis
//!
//! Irregular epochs are resampled onto a uniform grid at the median cadence
//! before the transform; empty grid cells take the series mean so gaps
//! contribute no spurious power.

use rustfft::{num_complex::Complex, FftPlanner};
use signal_conditioner::gaps;

/// Largest resampled grid; longer series are resampled at a coarser step
const MAX_GRID: usize = 1 << 20;

/// One-sided power spectrum in cycles per day, DC excluded
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    /// Frequency of each bin (cycles/day), increasing
    pub frequency: Vec<f64>,
    /// Power of each bin (|X|² / n)
    pub power: Vec<f64>,
    /// Uniform grid step used for the transform (days)
    pub step: f64,
}

impl Spectrum {
    /// Nyquist frequency of the resampled grid
    pub fn nyquist(&self) -> f64 {
        if self.step > 0.0 {
            0.5 / self.step
        } else {
            0.0
        }
    }

    /// Total power over all bins
    pub fn total_power(&self) -> f64 {
        self.power.iter().sum()
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.power.len()
    }

    /// Check if the spectrum has no bins
    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }
}

/// FFT Analyzer for frequency domain features
pub struct FftAnalyzer {
    /// FFT planner for efficient computation
    planner: FftPlanner<f64>,
}

impl FftAnalyzer {
    /// Create a new FFT analyzer
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Apply Hamming window to reduce spectral leakage
    fn apply_hamming_window(signal: &mut [f64]) {
        let n = signal.len();
        if n < 2 {
            return;
        }
        for (i, v) in signal.iter_mut().enumerate() {
            let window =
                0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos();
            *v *= window;
        }
    }

    /// Resample `flux` onto a uniform grid, averaging points that share a cell
    pub fn resample(time: &[f64], flux: &[f64], step: f64) -> Vec<f64> {
        let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
            return Vec::new();
        };
        if !(step > 0.0) {
            return Vec::new();
        }
        let n = ((last - first) / step).floor() as usize + 1;
        let mut sums = vec![0.0; n];
        let mut counts = vec![0usize; n];
        for (&t, &f) in time.iter().zip(flux) {
            let cell = (((t - first) / step) as usize).min(n - 1);
            sums[cell] += f;
            counts[cell] += 1;
        }
        let mean = flux.iter().sum::<f64>() / flux.len() as f64;
        sums.iter()
            .zip(&counts)
            .map(|(s, &c)| if c > 0 { s / c as f64 } else { mean })
            .collect()
    }

    /// Power spectrum of an irregularly sampled series.
    ///
    /// Returns `None` for fewer than four points or a degenerate cadence.
    pub fn power_spectrum(&mut self, time: &[f64], flux: &[f64]) -> Option<Spectrum> {
        if time.len() < 4 || time.len() != flux.len() {
            return None;
        }
        let cadence = gaps::median_cadence(time).filter(|c| *c > 0.0)?;
        let span = time[time.len() - 1] - time[0];
        let step = cadence.max(span / MAX_GRID as f64);

        let mut signal = Self::resample(time, flux, step);
        let n = signal.len();
        if n < 4 {
            return None;
        }
        // Remove the mean so the DC bin does not leak into low frequencies
        let mean = signal.iter().sum::<f64>() / n as f64;
        for v in &mut signal {
            *v -= mean;
        }
        Self::apply_hamming_window(&mut signal);

        let mut buffer: Vec<Complex<f64>> =
            signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        // Only positive frequencies, DC dropped
        let resolution = 1.0 / (n as f64 * step);
        let (frequency, power) = buffer
            .iter()
            .enumerate()
            .take(n / 2 + 1)
            .skip(1)
            .map(|(i, c)| (i as f64 * resolution, c.norm_sqr() / n as f64))
            .unzip();

        Some(Spectrum {
            frequency,
            power,
            step,
        })
    }
}

impl Default for FftAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
