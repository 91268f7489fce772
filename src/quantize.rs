//! Map floating point sample positions onto a fixed precision integer key space.
//!
//! Peak locators work over integer keys so they can use exact equality and
//! binary search on the position axis. [`quantize`] builds that series from the
//! caller's samples and [`QuantizedSeries::position_of`] maps a key back to the
//! original position units.
use std::fmt;
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The scale factor between a real position and its integer key
pub const PRECISION: f64 = 1e5;

/// Convert a real position into its integer key
#[inline]
pub fn position_to_key(position: f64) -> i64 {
    (position * PRECISION).round() as i64
}

/// Convert an integer key, or an interpolated fractional key, back into real units
#[inline]
pub fn key_to_position(key: f64) -> f64 {
    key / PRECISION
}

/// A single observation along the position axis of a profile
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    pub position: f64,
    pub intensity: f64,
}

impl Sample {
    pub fn new(position: f64, intensity: f64) -> Self {
        Self {
            position,
            intensity,
        }
    }
}

impl From<(f64, f64)> for Sample {
    fn from((position, intensity): (f64, f64)) -> Self {
        Self::new(position, intensity)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sample({}, {})", self.position, self.intensity)
    }
}

/// A [`Sample`] whose position has been scaled by [`PRECISION`] and rounded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantizedSample {
    pub key: i64,
    pub intensity: f64,
}

impl QuantizedSample {
    pub fn new(key: i64, intensity: f64) -> Self {
        Self { key, intensity }
    }

    /// The position of this sample in real units
    #[inline]
    pub fn position(&self) -> f64 {
        key_to_position(self.key as f64)
    }
}

impl From<&Sample> for QuantizedSample {
    fn from(value: &Sample) -> Self {
        Self::new(position_to_key(value.position), value.intensity)
    }
}

/// A key-sorted sequence of [`QuantizedSample`]
#[derive(Debug, Clone, Default)]
pub struct QuantizedSeries {
    samples: Vec<QuantizedSample>,
}

impl QuantizedSeries {
    /// Build a series from samples that are already quantized, sorting them by key.
    ///
    /// The sort is not stable, samples sharing a key may be reordered.
    pub fn new(mut samples: Vec<QuantizedSample>) -> Self {
        samples.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QuantizedSample> {
        self.samples.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QuantizedSample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[QuantizedSample] {
        &self.samples
    }

    /// The real-unit position of the sample at `index`
    pub fn position_of(&self, index: usize) -> f64 {
        self.samples[index].position()
    }

    /// All keys in order, as floating point values for interpolation
    pub fn keys(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.key as f64)
    }

    /// All positions converted back into real units
    pub fn positions(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.position()).collect()
    }

    pub fn intensities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.intensity).collect()
    }
}

impl Index<usize> for QuantizedSeries {
    type Output = QuantizedSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl<'a> IntoIterator for &'a QuantizedSeries {
    type Item = &'a QuantizedSample;
    type IntoIter = std::slice::Iter<'a, QuantizedSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Quantize every sample in `samples` and sort the result by key.
///
/// No sample is dropped or merged, duplicate positions are kept side by side.
pub fn quantize(samples: &[Sample]) -> QuantizedSeries {
    QuantizedSeries::new(samples.iter().map(QuantizedSample::from).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(1.5)]
    #[case(100.123456789)]
    #[case(1822.47530000001)]
    #[case(-3.999996)]
    fn test_round_trip(#[case] position: f64) {
        let key = position_to_key(position);
        let restored = key_to_position(key as f64);
        assert!(
            (restored - position).abs() < 1.0 / PRECISION,
            "{position} -> {key} -> {restored}"
        );
    }

    #[test]
    fn test_sorted_and_complete() {
        let samples: Vec<Sample> = vec![
            (3.0, 1.0).into(),
            (1.0, 2.0).into(),
            (2.0, 3.0).into(),
            (1.0, 4.0).into(),
        ];
        let series = quantize(&samples);
        assert_eq!(series.len(), 4);
        let keys: Vec<i64> = series.iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![100_000, 100_000, 200_000, 300_000]);

        let mut dup: Vec<f64> = series
            .iter()
            .filter(|s| s.key == 100_000)
            .map(|s| s.intensity)
            .collect();
        dup.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(dup, vec![2.0, 4.0]);
        assert_eq!(series.position_of(3), 3.0);
    }

    #[test]
    fn test_empty() {
        let series = quantize(&[]);
        assert!(series.is_empty());
        assert!(series.get(0).is_none());
    }
}
