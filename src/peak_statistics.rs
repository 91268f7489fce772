//! Width, center and resolving power estimation for a single candidate peak.
//!
//! The half-max crossing on each flank is found by scanning the flank's points
//! in order and linearly interpolating between the first pair of points that
//! brackets half of the smoothed apex intensity.
use std::ops::{ControlFlow, Range};

use num_traits::{Float, FromPrimitive};

use crate::locator::RawPeak;
use crate::peak::{Peak, Point};
use crate::peak_finder::{check_raw_peak, check_smoothed_length, PeakFinderError};
use crate::quantize::{key_to_position, QuantizedSeries};

/// How close a smoothed intensity must be to the half-max threshold to be taken
/// as the crossing itself
pub const MIDPOINT_TOLERANCE: f64 = 0.01;

pub fn _isclose<T>(x: T, y: T, rtol: T, atol: T) -> bool
where
    T: Float,
{
    (x - y).abs() <= (atol + rtol * y.abs())
}

pub fn isclose<T>(x: T, y: T) -> bool
where
    T: Float + FromPrimitive,
{
    _isclose(x, y, T::from_f64(1e-5).unwrap(), T::from_f64(1e-8).unwrap())
}

pub fn aboutzero<T>(x: T) -> bool
where
    T: Float + FromPrimitive,
{
    isclose(x, T::zero())
}

/// Solve the line through `(x1, y1)` and `(x2, y2)` for the `x` where it reaches `y_target`
pub fn interpolate_crossing(x1: f64, y1: f64, x2: f64, y2: f64, y_target: f64) -> f64 {
    if aboutzero(y2 - y1) {
        return x1;
    }
    x1 + (x2 - x1) * (y_target - y1) / (y2 - y1)
}

/// What to do with a peak when a half-max crossing could not be located on one side
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedMidpoint {
    /// Treat the missing crossing as if it were at position zero. The peak is
    /// kept unless that makes its resolving power non-positive or non-finite.
    #[default]
    Zero,
    /// The width and resolving power are undefined (NaN), so the peak is
    /// dropped when results are filtered.
    Discard,
}

impl UnresolvedMidpoint {
    /// The full width at half max given the located crossings
    pub fn width(&self, left: Option<f64>, right: Option<f64>) -> f64 {
        match (*self, left, right) {
            (_, Some(left), Some(right)) => right - left,
            (Self::Zero, left, right) => right.unwrap_or_default() - left.unwrap_or_default(),
            (Self::Discard, _, _) => f64::NAN,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MidpointSearch {
    previous: Option<(f64, f64)>,
    found: Option<f64>,
}

impl MidpointSearch {
    fn skip(self, x: f64, y: f64) -> Self {
        Self {
            previous: Some((x, y)),
            ..self
        }
    }

    fn record(self, x: f64, y: f64) -> Self {
        Self {
            previous: Some((x, y)),
            found: Some(x),
        }
    }

    /// Interpolate between the previous point and `(x, y)`. Without a previous
    /// point the crossing lies outside of the scanned points.
    fn bracket(self, x: f64, y: f64, half_max: f64) -> Option<f64> {
        self.previous
            .map(|(x1, y1)| interpolate_crossing(x1, y1, x, y, half_max))
    }

    fn scan<I, F>(points: I, half_max: f64, is_before_crossing: F) -> Option<f64>
    where
        I: IntoIterator<Item = (f64, f64)>,
        F: Fn(f64) -> bool,
    {
        let result = points
            .into_iter()
            .try_fold(Self::default(), |state, (x, y)| {
                if (y - half_max).abs() < MIDPOINT_TOLERANCE {
                    ControlFlow::Continue(state.record(x, y))
                } else if is_before_crossing(y) {
                    ControlFlow::Continue(state.skip(x, y))
                } else {
                    ControlFlow::Break(state.bracket(x, y, half_max))
                }
            });
        match result {
            ControlFlow::Continue(state) => state.found,
            ControlFlow::Break(found) => found,
        }
    }
}

/// Find the half-max crossing on the rising side of a peak.
///
/// `points` are `(x, smoothed intensity)` pairs ordered from the left edge
/// towards the apex.
pub fn find_rising_midpoint<I>(points: I, half_max: f64) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    MidpointSearch::scan(points, half_max, |y| y < half_max)
}

/// Find the half-max crossing on the falling side of a peak.
///
/// `points` are `(x, smoothed intensity)` pairs ordered from the apex towards
/// the right edge. Negative intensities are treated as noise and skipped.
pub fn find_falling_midpoint<I>(points: I, half_max: f64) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    MidpointSearch::scan(points, half_max, |y| y > half_max || y < 0.0)
}

/// `(key, smoothed intensity)` pairs over `indices`
fn flank<'a>(
    series: &'a QuantizedSeries,
    smoothed: &'a [f64],
    indices: Range<usize>,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    indices.map(move |i| (series[i].key as f64, smoothed[i]))
}

/// Compute the full width at half max, center and resolving power of `raw`.
///
/// Fails with [`PeakFinderError::LocatorContract`] when `smoothed` is not aligned
/// with `series` or `raw` does not bracket its apex inside `series`.
pub fn characterize(
    raw: &RawPeak,
    series: &QuantizedSeries,
    smoothed: &[f64],
    unresolved: UnresolvedMidpoint,
) -> Result<Peak, PeakFinderError> {
    check_smoothed_length(series.len(), smoothed.len())?;
    check_raw_peak(raw, series.len())?;

    let location = raw.location_index;
    let center = &series[location];
    let peak_center = center.position();
    let smoothed_intensity = smoothed[location];
    let half_max = smoothed_intensity / 2.0;

    let left_midpoint = find_rising_midpoint(
        flank(series, smoothed, raw.left_edge_index..location),
        half_max,
    )
    .map(key_to_position);
    let right_midpoint = find_falling_midpoint(
        flank(series, smoothed, location..raw.right_edge_index),
        half_max,
    )
    .map(key_to_position);

    let full_width_half_max = unresolved.width(left_midpoint, right_midpoint);
    let resolving_power = peak_center / full_width_half_max;

    let total_data_point_set = raw
        .span()
        .map(|i| Point::new(series.position_of(i), series[i].intensity, smoothed[i]))
        .collect();

    Ok(Peak {
        peak_center,
        intensity: center.intensity,
        smoothed_intensity,
        location_index: location,
        left_midpoint,
        right_midpoint,
        full_width_half_max,
        resolving_power,
        area_under_the_peak: raw.area,
        total_data_point_set,
    })
}
