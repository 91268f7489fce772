//! Synthetic profiles shared by the unit tests
use crate::quantize::Sample;

/// The ratio between a Gaussian's full width at half max and its standard deviation
pub const FWHM_TO_SIGMA: f64 = 2.354820045;

/// Sum of Gaussians sampled from `start` to `end` inclusive every `step`.
///
/// Each peak is given as `(center, full width at half max, amplitude)`.
pub fn gaussian_profile(peaks: &[(f64, f64, f64)], start: f64, end: f64, step: f64) -> Vec<Sample> {
    let n = ((end - start) / step).round() as usize + 1;
    (0..n)
        .map(|i| {
            let x = start + i as f64 * step;
            let y: f64 = peaks
                .iter()
                .map(|(center, fwhm, amplitude)| {
                    let sigma = fwhm / FWHM_TO_SIGMA;
                    amplitude * (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp()
                })
                .sum();
            Sample::new(x, y)
        })
        .collect()
}

/// A zero baseline from `start` to `end` with a single non-zero sample at `spike`
pub fn spike_profile(start: f64, end: f64, step: f64, spike: f64, intensity: f64) -> Vec<Sample> {
    let n = ((end - start) / step).round() as usize + 1;
    (0..n)
        .map(|i| {
            let x = start + i as f64 * step;
            let y = if (x - spike).abs() < step / 2.0 {
                intensity
            } else {
                0.0
            };
            Sample::new(x, y)
        })
        .collect()
}
