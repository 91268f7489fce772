//! Candidate peak location over a quantized series.
//!
//! A [`PeakLocator`] receives the key-sorted [`QuantizedSeries`] and a seed index
//! and returns every candidate peak it finds as a [`RawPeak`], together with the
//! smoothed intensity curve it used, aligned index-for-index with the series.
//! The characterization step in [`crate::peak_finder`] only depends on that
//! contract, so any implementation can be plugged in, including a closure.
//!
//! [`MagnitudeConcavityLocator`] is the bundled implementation. It smooths the
//! signal, accepts local maxima of the smoothed curve that are concave down and
//! sufficiently intense, and walks down both flanks to find each candidate's
//! edges.
use std::fmt;
use std::ops::Range;

use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::arrayops::trapz;
use crate::peak_finder::PeakFinderError;
use crate::peak_statistics::isclose;
use crate::quantize::QuantizedSeries;
use crate::smooth::smooth_signal;

/// A candidate peak proposed by a [`PeakLocator`], before width characterization.
///
/// The candidate spans `left_edge_index..right_edge_index`, the left edge
/// inclusive and the right edge exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawPeak {
    /// The index of the apex in the quantized series
    pub location_index: usize,
    pub left_edge_index: usize,
    pub right_edge_index: usize,
    /// The locator's own estimate of the area under the candidate
    pub area: f64,
}

impl RawPeak {
    pub fn new(
        location_index: usize,
        left_edge_index: usize,
        right_edge_index: usize,
        area: f64,
    ) -> Self {
        Self {
            location_index,
            left_edge_index,
            right_edge_index,
            area,
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.left_edge_index..self.right_edge_index
    }

    pub fn contains(&self, index: usize) -> bool {
        self.span().contains(&index)
    }

    /// The number of samples between the edges
    pub fn width(&self) -> usize {
        self.right_edge_index.saturating_sub(self.left_edge_index)
    }
}

impl fmt::Display for RawPeak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RawPeak({}, {}..{}, {})",
            self.location_index, self.left_edge_index, self.right_edge_index, self.area
        )
    }
}

/// Everything a [`PeakLocator`] reports for one series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocatorOutput {
    /// Candidate peaks in emission order
    pub peaks: Vec<RawPeak>,
    /// The smoothed intensity at each index of the series
    pub smoothed: Vec<f64>,
    /// The index into `peaks` of the candidate whose span contains the seed index
    pub seed_peak: Option<usize>,
}

impl LocatorOutput {
    pub fn new(peaks: Vec<RawPeak>, smoothed: Vec<f64>, seed_peak: Option<usize>) -> Self {
        Self {
            peaks,
            smoothed,
            seed_peak,
        }
    }

    /// Build an output, finding the candidate containing `seed_index` if there is one
    pub fn with_seed(peaks: Vec<RawPeak>, smoothed: Vec<f64>, seed_index: usize) -> Self {
        let seed_peak = peaks.iter().position(|p| p.contains(seed_index));
        Self::new(peaks, smoothed, seed_peak)
    }
}

/// Find candidate peaks and a smoothed intensity curve over a quantized series.
///
/// `seed_index` is a starting guess for the locator's search, conventionally
/// `series.len() / 2`.
pub trait PeakLocator {
    fn locate(
        &self,
        series: &QuantizedSeries,
        seed_index: usize,
    ) -> Result<LocatorOutput, PeakFinderError>;
}

impl<F> PeakLocator for F
where
    F: Fn(&QuantizedSeries, usize) -> Result<LocatorOutput, PeakFinderError>,
{
    fn locate(
        &self,
        series: &QuantizedSeries,
        seed_index: usize,
    ) -> Result<LocatorOutput, PeakFinderError> {
        self(series, seed_index)
    }
}

/// Parameters for [`MagnitudeConcavityLocator`]
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorOptions {
    /// The number of points in the smoothing window, must be odd. A value of 1
    /// disables smoothing.
    pub smoothing_window: usize,
    /// The order of the Savitzky-Golay polynomial
    pub polynomial_order: usize,
    /// The smoothed apex intensity a candidate must exceed
    pub intensity_threshold: f64,
    /// The fraction of the most intense smoothed point a candidate must exceed
    pub intensity_threshold_fraction_max: f64,
    /// The number of raw samples at or above half the span's greatest raw
    /// intensity a candidate must contain
    pub peak_width_points_minimum: usize,
}

impl LocatorOptions {
    pub fn smoothing_window(mut self, smoothing_window: usize) -> Self {
        self.smoothing_window = smoothing_window;
        self
    }

    pub fn polynomial_order(mut self, polynomial_order: usize) -> Self {
        self.polynomial_order = polynomial_order;
        self
    }

    pub fn intensity_threshold(mut self, intensity_threshold: f64) -> Self {
        self.intensity_threshold = intensity_threshold;
        self
    }

    pub fn intensity_threshold_fraction_max(mut self, fraction: f64) -> Self {
        self.intensity_threshold_fraction_max = fraction;
        self
    }

    pub fn peak_width_points_minimum(mut self, peak_width_points_minimum: usize) -> Self {
        self.peak_width_points_minimum = peak_width_points_minimum;
        self
    }
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            smoothing_window: 7,
            polynomial_order: 2,
            intensity_threshold: 0.0,
            intensity_threshold_fraction_max: 0.01,
            peak_width_points_minimum: 3,
        }
    }
}

/// Locate local maxima of the smoothed signal that are concave down
#[derive(Debug, Clone, Default)]
pub struct MagnitudeConcavityLocator {
    pub options: LocatorOptions,
}

impl MagnitudeConcavityLocator {
    pub fn new(options: LocatorOptions) -> Self {
        Self { options }
    }

    /// Walk towards the start of the array while the smoothed signal keeps
    /// falling, after stepping over a flat top.
    fn find_left_edge(smoothed: &[f64], index: usize) -> usize {
        let apex = smoothed[index];
        let mut j = index;
        while j > 0 && smoothed[j - 1] == apex {
            j -= 1;
        }
        while j > 0 && smoothed[j - 1] < smoothed[j] {
            j -= 1;
        }
        j
    }

    /// Walk towards the end of the array while the smoothed signal keeps falling.
    ///
    /// Returns one past the last index reached.
    fn find_right_edge(smoothed: &[f64], index: usize) -> usize {
        let n = smoothed.len();
        let mut j = index;
        while j + 1 < n && smoothed[j + 1] < smoothed[j] {
            j += 1;
        }
        j + 1
    }

    /// Half height is taken from the most intense raw sample in the span,
    /// which need not be the smoothed apex.
    fn is_wide_enough(&self, intensities: &[f64], candidate: &RawPeak) -> bool {
        let span = &intensities[candidate.span()];
        let half = span.iter().copied().fold(f64::NEG_INFINITY, f64::max) / 2.0;
        let points = span.iter().filter(|y| **y >= half).count();
        points >= self.options.peak_width_points_minimum
    }
}

impl PeakLocator for MagnitudeConcavityLocator {
    fn locate(
        &self,
        series: &QuantizedSeries,
        seed_index: usize,
    ) -> Result<LocatorOutput, PeakFinderError> {
        let intensities = series.intensities();
        let smoothed = smooth_signal(
            &intensities,
            self.options.smoothing_window,
            self.options.polynomial_order,
        )?;
        let n = smoothed.len();
        if n < 3 {
            return Ok(LocatorOutput::new(Vec::new(), smoothed, None));
        }

        let max_smoothed = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let threshold = self
            .options
            .intensity_threshold
            .max(max_smoothed * self.options.intensity_threshold_fraction_max);

        let positions = series.positions();
        let mut peaks = Vec::new();
        let mut too_narrow = 0usize;
        for i in 1..(n - 1) {
            let (prev, cur, next) = (smoothed[i - 1], smoothed[i], smoothed[i + 1]);
            // Smoothing leaves rounding noise on flat stretches
            if !(cur >= prev && cur > next && cur > threshold) || isclose(cur, next) {
                continue;
            }
            if prev - 2.0 * cur + next >= 0.0 {
                continue;
            }
            let left = Self::find_left_edge(&smoothed, i);
            let right = Self::find_right_edge(&smoothed, i);
            let mut candidate = RawPeak::new(i, left, right, 0.0);
            if !self.is_wide_enough(&intensities, &candidate) {
                trace!("Skipping candidate {candidate}, too few points above half height");
                too_narrow += 1;
                continue;
            }
            candidate.area = trapz(&positions[left..right], &intensities[left..right]);
            trace!("Found candidate {candidate}");
            peaks.push(candidate);
        }
        debug!(
            "Located {} candidate peaks in {} samples ({} too narrow)",
            peaks.len(),
            n,
            too_narrow
        );
        Ok(LocatorOutput::with_seed(peaks, smoothed, seed_index))
    }
}
