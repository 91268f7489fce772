use std::fmt;
use std::ops::Index;

use mzpeaks::peak::MZPoint;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single sample along a peak, paired with the locator's smoothed intensity
/// at the same index. The location is in real position units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub location: f64,
    pub intensity: f64,
    pub smoothed_intensity: f64,
}

impl Point {
    pub fn new(location: f64, intensity: f64, smoothed_intensity: f64) -> Self {
        Self {
            location,
            intensity,
            smoothed_intensity,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Point({}, {}, {})",
            self.location, self.intensity, self.smoothed_intensity
        )
    }
}

/// A characterized peak with a sub-sample width estimate.
///
/// All positions are in the caller's original units.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Peak {
    /// The position of the apex sample
    pub peak_center: f64,
    /// The raw intensity at the apex
    pub intensity: f64,
    /// The smoothed intensity at the apex
    pub smoothed_intensity: f64,
    /// The index of the apex in the position-sorted input
    pub location_index: usize,
    /// The half-max crossing on the rising side, `None` if no crossing was found
    pub left_midpoint: Option<f64>,
    /// The half-max crossing on the falling side, `None` if no crossing was found
    pub right_midpoint: Option<f64>,
    pub full_width_half_max: f64,
    /// `peak_center / full_width_half_max`
    pub resolving_power: f64,
    /// The area estimate reported by the peak locator
    pub area_under_the_peak: f64,
    /// Every sample between the candidate peak's edges, in position order
    pub total_data_point_set: Vec<Point>,
}

impl Peak {
    /// The rising side crossing, or zero when it was never located
    pub fn left_midpoint_or_zero(&self) -> f64 {
        self.left_midpoint.unwrap_or_default()
    }

    /// The falling side crossing, or zero when it was never located
    pub fn right_midpoint_or_zero(&self) -> f64 {
        self.right_midpoint.unwrap_or_default()
    }

    /// Whether both half-max crossings were located
    pub fn is_resolved(&self) -> bool {
        self.left_midpoint.is_some() && self.right_midpoint.is_some()
    }

    /// Whether the resolving power is usable, positive and finite
    pub fn has_valid_resolving_power(&self) -> bool {
        self.resolving_power > 0.0 && self.resolving_power.is_finite()
    }
}

impl From<&Peak> for mzpeaks::CentroidPeak {
    fn from(peak: &Peak) -> Self {
        mzpeaks::CentroidPeak::new(
            peak.peak_center,
            peak.intensity as f32,
            peak.location_index as u32,
        )
    }
}

impl From<Peak> for mzpeaks::CentroidPeak {
    fn from(peak: Peak) -> Self {
        (&peak).into()
    }
}

impl From<&Peak> for MZPoint {
    fn from(peak: &Peak) -> Self {
        Self {
            mz: peak.peak_center,
            intensity: peak.intensity as f32,
        }
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Peak({}, {}, {}, {}, {})",
            self.peak_center,
            self.intensity,
            self.full_width_half_max,
            self.resolving_power,
            self.area_under_the_peak
        )
    }
}

/// An ordered collection of [`Peak`].
///
/// The order is the order the peaks were produced in, it is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PeakSet {
    peaks: Vec<Peak>,
}

impl PeakSet {
    pub fn new(peaks: Vec<Peak>) -> Self {
        Self { peaks }
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Peak> {
        self.peaks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    /// The peak with the greatest raw apex intensity
    pub fn most_intense(&self) -> Option<&Peak> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    pub fn into_inner(self) -> Vec<Peak> {
        self.peaks
    }
}

impl Index<usize> for PeakSet {
    type Output = Peak;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peaks[index]
    }
}

impl FromIterator<Peak> for PeakSet {
    fn from_iter<T: IntoIterator<Item = Peak>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for PeakSet {
    type Item = Peak;
    type IntoIter = std::vec::IntoIter<Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

impl From<PeakSet> for Vec<Peak> {
    fn from(value: PeakSet) -> Self {
        value.peaks
    }
}
