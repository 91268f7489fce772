//! Find and characterize peaks in a single ion mobility profile.
//!
//! [`PeakFinder::find_peaks`] runs the full pipeline over one series of samples:
//! quantize the positions, ask the [`PeakLocator`] for candidate peaks once,
//! optionally keep only the most intense candidates, estimate each candidate's
//! width at half max and resolving power, and drop every peak whose resolving
//! power is not a positive finite number.
use cfg_if::cfg_if;
use log::{debug, trace};
use thiserror::Error;

#[cfg(feature = "parallelism")]
use rayon::prelude::*;

use crate::locator::{LocatorOutput, MagnitudeConcavityLocator, PeakLocator, RawPeak};
use crate::peak::{Peak, PeakSet};
use crate::peak_statistics::{characterize, UnresolvedMidpoint};
use crate::quantize::{quantize, QuantizedSeries, Sample};
use crate::smooth::SavitskyGolayError;

/// The fewest samples a series may contain to be searched for peaks
pub const MINIMUM_SAMPLES: usize = 3;

/// All the ways peak finding can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PeakFinderError {
    #[error("At least {minimum} samples are required to find peaks, received {count}")]
    InsufficientSamples { count: usize, minimum: usize },
    #[error("The peak locator returned an invalid result: {0}")]
    LocatorContract(String),
    #[error("Failed to smooth the signal: {0}")]
    Smoothing(#[from] SavitskyGolayError),
}

pub(crate) fn check_smoothed_length(n: usize, smoothed: usize) -> Result<(), PeakFinderError> {
    if smoothed != n {
        return Err(PeakFinderError::LocatorContract(format!(
            "smoothed curve has {smoothed} points but the series has {n}"
        )));
    }
    Ok(())
}

pub(crate) fn check_raw_peak(peak: &RawPeak, n: usize) -> Result<(), PeakFinderError> {
    if !(peak.left_edge_index <= peak.location_index
        && peak.location_index < peak.right_edge_index
        && peak.right_edge_index <= n)
    {
        return Err(PeakFinderError::LocatorContract(format!(
            "{peak} is not a valid span over {n} points"
        )));
    }
    Ok(())
}

/// Check that the locator's output is aligned with `series` and that every
/// candidate's edges bracket its apex inside the series.
pub fn validate_locator_output(
    series: &QuantizedSeries,
    output: &LocatorOutput,
) -> Result<(), PeakFinderError> {
    let n = series.len();
    check_smoothed_length(n, output.smoothed.len())?;
    for peak in output.peaks.iter() {
        check_raw_peak(peak, n)?;
    }
    if let Some(seed) = output.seed_peak {
        if seed >= output.peaks.len() {
            return Err(PeakFinderError::LocatorContract(format!(
                "seed peak {seed} is out of bounds for {} peaks",
                output.peaks.len()
            )));
        }
    }
    Ok(())
}

/// Keep the `number_of_top_peaks` candidates with the greatest smoothed apex
/// intensity, or every candidate in its original order when it is `0`.
///
/// Candidates with equal smoothed intensity keep their relative order.
pub fn select_top_peaks(
    mut peaks: Vec<RawPeak>,
    smoothed: &[f64],
    number_of_top_peaks: usize,
) -> Vec<RawPeak> {
    if number_of_top_peaks == 0 {
        return peaks;
    }
    peaks.sort_by(|a, b| smoothed[b.location_index].total_cmp(&smoothed[a.location_index]));
    peaks.truncate(number_of_top_peaks);
    peaks
}

/// Collect the peaks whose resolving power is positive and finite, preserving order
pub fn aggregate_peaks<I: IntoIterator<Item = Peak>>(peaks: I) -> PeakSet {
    peaks
        .into_iter()
        .filter(|peak| {
            let keep = peak.has_valid_resolving_power();
            if !keep {
                trace!("Discarding {peak}");
            }
            keep
        })
        .collect()
}

/// A configured peak finding pipeline.
///
/// The pipeline holds no state between calls, so one instance can be shared
/// across threads whenever its locator can.
#[derive(Debug, Clone, Default)]
pub struct PeakFinder<L: PeakLocator = MagnitudeConcavityLocator> {
    /// How many of the most intense candidates to characterize, `0` for all of them
    pub number_of_top_peaks: usize,
    /// How a side without a half-max crossing contributes to the width. By
    /// default it counts as position zero.
    pub unresolved_midpoint: UnresolvedMidpoint,
    pub locator: L,
}

/// A builder for configuring [`PeakFinder`]
#[derive(Debug, Clone, Default)]
pub struct PeakFinderBuilder<L: PeakLocator = MagnitudeConcavityLocator> {
    number_of_top_peaks: usize,
    unresolved_midpoint: UnresolvedMidpoint,
    locator: L,
}

impl PeakFinderBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: PeakLocator> PeakFinderBuilder<L> {
    pub fn number_of_top_peaks(mut self, number_of_top_peaks: usize) -> Self {
        self.number_of_top_peaks = number_of_top_peaks;
        self
    }

    pub fn unresolved_midpoint(mut self, unresolved_midpoint: UnresolvedMidpoint) -> Self {
        self.unresolved_midpoint = unresolved_midpoint;
        self
    }

    /// Replace the peak locator, which may change the builder's type
    pub fn locator<M: PeakLocator>(self, locator: M) -> PeakFinderBuilder<M> {
        PeakFinderBuilder {
            number_of_top_peaks: self.number_of_top_peaks,
            unresolved_midpoint: self.unresolved_midpoint,
            locator,
        }
    }

    pub fn build(self) -> PeakFinder<L> {
        PeakFinder {
            number_of_top_peaks: self.number_of_top_peaks,
            unresolved_midpoint: self.unresolved_midpoint,
            locator: self.locator,
        }
    }
}

impl<L: PeakLocator> From<PeakFinderBuilder<L>> for PeakFinder<L> {
    fn from(value: PeakFinderBuilder<L>) -> Self {
        value.build()
    }
}

impl PeakFinder {
    /// Create a peak finder with the default locator
    pub fn new(number_of_top_peaks: usize) -> Self {
        Self {
            number_of_top_peaks,
            ..Default::default()
        }
    }
}

impl<L: PeakLocator> PeakFinder<L> {
    /// Find every peak in `samples` with a usable resolving power.
    ///
    /// `samples` need not be sorted by position. The returned peaks are in the
    /// locator's emission order when every candidate is kept, otherwise in
    /// descending order of smoothed apex intensity.
    pub fn find_peaks(&self, samples: &[Sample]) -> Result<PeakSet, PeakFinderError> {
        if samples.len() < MINIMUM_SAMPLES {
            return Err(PeakFinderError::InsufficientSamples {
                count: samples.len(),
                minimum: MINIMUM_SAMPLES,
            });
        }
        let series = quantize(samples);
        let output = self.locator.locate(&series, series.len() / 2)?;
        validate_locator_output(&series, &output)?;

        let LocatorOutput {
            peaks, smoothed, ..
        } = output;
        let n_located = peaks.len();
        let candidates = select_top_peaks(peaks, &smoothed, self.number_of_top_peaks);
        let n_candidates = candidates.len();

        let characterized = candidates
            .iter()
            .map(|raw| {
                let peak = characterize(raw, &series, &smoothed, self.unresolved_midpoint)?;
                trace!("Characterized {raw} as {peak}");
                Ok(peak)
            })
            .collect::<Result<Vec<_>, PeakFinderError>>()?;
        let peaks = aggregate_peaks(characterized);
        debug!(
            "Kept {} peaks from {} candidates ({} located) over {} samples",
            peaks.len(),
            n_candidates,
            n_located,
            series.len()
        );
        Ok(peaks)
    }

    /// Find peaks in many independent series, returning one result per series
    /// in input order.
    ///
    /// With the `parallelism` feature the series are processed concurrently.
    pub fn find_peaks_batch<S>(&self, batch: &[S]) -> Vec<Result<PeakSet, PeakFinderError>>
    where
        S: AsRef<[Sample]> + Sync,
        L: Sync,
    {
        cfg_if! {
            if #[cfg(feature = "parallelism")] {
                batch
                    .par_iter()
                    .map(|samples| self.find_peaks(samples.as_ref()))
                    .collect()
            } else {
                batch
                    .iter()
                    .map(|samples| self.find_peaks(samples.as_ref()))
                    .collect()
            }
        }
    }
}

/// Find peaks in `samples` with the default locator and policy, keeping at most
/// `number_of_top_peaks` candidates, or all of them when it is `0`.
pub fn find_peaks(
    samples: &[Sample],
    number_of_top_peaks: usize,
) -> Result<PeakSet, PeakFinderError> {
    PeakFinder::new(number_of_top_peaks).find_peaks(samples)
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use super::*;
    use crate::locator::LocatorOptions;
    use crate::test_data::{gaussian_profile, spike_profile};
    use crate::quantize::PRECISION;
    use rstest::rstest;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    fn two_peaks() -> Vec<Sample> {
        gaussian_profile(&[(50.0, 4.0, 1000.0), (150.0, 6.0, 600.0)], 0.0, 200.0, 0.5)
    }

    fn three_peaks() -> Vec<Sample> {
        gaussian_profile(
            &[(20.0, 3.0, 300.0), (50.0, 3.0, 900.0), (80.0, 3.0, 600.0)],
            0.0,
            100.0,
            0.25,
        )
    }

    fn permissive() -> MagnitudeConcavityLocator {
        MagnitudeConcavityLocator::new(
            LocatorOptions::default()
                .smoothing_window(1)
                .peak_width_points_minimum(1),
        )
    }

    fn check_invariants(peaks: &PeakSet) {
        for peak in peaks {
            assert!(peak.resolving_power > 0.0 && peak.resolving_power.is_finite());
            assert!(peak.full_width_half_max > 0.0);
            assert_eq!(
                peak.resolving_power,
                peak.peak_center / peak.full_width_half_max
            );
            let left = peak.left_midpoint.unwrap();
            let right = peak.right_midpoint.unwrap();
            assert!(left < peak.peak_center, "{left} >= {}", peak.peak_center);
            assert!(peak.peak_center < right, "{right} <= {}", peak.peak_center);
        }
    }

    #[test_log::test]
    fn test_single_gaussian() {
        let samples = gaussian_profile(&[(100.0, 4.0, 1000.0)], 87.5, 112.0, 0.5);
        assert_eq!(samples.len(), 50);
        let peaks = find_peaks(&samples, 0).unwrap();
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_is_close!(peak.peak_center, 100.0, 1.0 / PRECISION, "center");
        // A moving average broadens the peak
        if cfg!(feature = "nalgebra") {
            assert_is_close!(peak.full_width_half_max, 4.0, 0.1, "fwhm");
            assert_is_close!(peak.resolving_power, 25.0, 1.0, "resolving power");
        }
        assert_eq!(peak.intensity, 1000.0);
        assert_eq!(peak.location_index, 25);
        check_invariants(&peaks);
    }

    #[test_log::test]
    fn test_two_gaussians() {
        let peaks = find_peaks(&two_peaks(), 0).unwrap();
        assert_eq!(peaks.len(), 2);
        assert_is_close!(peaks[0].peak_center, 50.0, 1.0 / PRECISION, "center");
        assert_is_close!(peaks[1].peak_center, 150.0, 1.0 / PRECISION, "center");
        assert!(peaks[0].full_width_half_max < peaks[1].full_width_half_max);
        if cfg!(feature = "nalgebra") {
            assert_is_close!(peaks[0].full_width_half_max, 4.0, 0.1, "fwhm");
            assert_is_close!(peaks[1].full_width_half_max, 6.0, 0.1, "fwhm");
        }
        check_invariants(&peaks);
    }

    #[rstest]
    #[case(3)]
    #[case(10)]
    #[case(100)]
    fn test_flat(#[case] n: usize) {
        let samples: Vec<Sample> = (0..n).map(|i| (i as f64, 42.0).into()).collect();
        let peaks = find_peaks(&samples, 0).unwrap();
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_top_one_of_two() {
        let peaks = find_peaks(&two_peaks(), 1).unwrap();
        assert_eq!(peaks.len(), 1);
        assert_is_close!(peaks[0].peak_center, 50.0, 1.0 / PRECISION, "center");
    }

    #[rstest]
    #[case(0, vec![20.0, 50.0, 80.0])]
    #[case(1, vec![50.0])]
    #[case(2, vec![50.0, 80.0])]
    #[case(5, vec![50.0, 80.0, 20.0])]
    fn test_top_n(#[case] number_of_top_peaks: usize, #[case] expected: Vec<f64>) {
        let peaks = find_peaks(&three_peaks(), number_of_top_peaks).unwrap();
        let centers: Vec<f64> = peaks.iter().map(|p| p.peak_center).collect();
        assert_eq!(centers.len(), expected.len());
        for (c, e) in centers.iter().zip(expected.iter()) {
            assert_is_close!(c, e, 1.0 / PRECISION, "center");
        }
        check_invariants(&peaks);
    }

    #[test]
    fn test_select_top_peaks_is_stable() {
        let smoothed = [0.0, 5.0, 0.0, 9.0, 0.0, 5.0, 0.0];
        let peaks = vec![
            RawPeak::new(1, 0, 2, 1.0),
            RawPeak::new(3, 2, 4, 2.0),
            RawPeak::new(5, 4, 6, 3.0),
        ];
        let top = select_top_peaks(peaks.clone(), &smoothed, 2);
        assert_eq!(top, vec![peaks[1], peaks[0]]);
        let top = select_top_peaks(peaks.clone(), &smoothed, 3);
        assert_eq!(top, vec![peaks[1], peaks[0], peaks[2]]);
        assert_eq!(select_top_peaks(peaks.clone(), &smoothed, 0), peaks);
    }

    #[test_log::test]
    fn test_spike_is_excluded() {
        let samples = spike_profile(0.0, 29.0, 1.0, 15.0, 500.0);
        assert!(find_peaks(&samples, 0).unwrap().is_empty());

        let finder = PeakFinderBuilder::new()
            .unresolved_midpoint(UnresolvedMidpoint::Discard)
            .locator(permissive())
            .build();
        assert!(finder.find_peaks(&samples).unwrap().is_empty());

        // A zero width candidate divides by zero when missing crossings count as zero
        let finder = PeakFinderBuilder::new()
            .unresolved_midpoint(UnresolvedMidpoint::Zero)
            .locator(
                |series: &QuantizedSeries, seed: usize| -> Result<LocatorOutput, PeakFinderError> {
                    Ok(LocatorOutput::with_seed(
                        vec![RawPeak::new(15, 15, 16, 0.0)],
                        series.intensities(),
                        seed,
                    ))
                },
            )
            .build();
        assert!(finder.find_peaks(&samples).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_midpoint_as_zero() {
        let samples = spike_profile(0.0, 29.0, 1.0, 15.0, 500.0);
        let finder = PeakFinderBuilder::new()
            .unresolved_midpoint(UnresolvedMidpoint::Zero)
            .locator(permissive())
            .build();
        let peaks = finder.find_peaks(&samples).unwrap();
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_eq!(peak.left_midpoint, None);
        assert_eq!(peak.left_midpoint_or_zero(), 0.0);
        assert_is_close!(peak.right_midpoint.unwrap(), 15.5, 1e-9, "right midpoint");
        assert_is_close!(peak.resolving_power, 15.0 / 15.5, 1e-9, "resolving power");
    }

    #[cfg(feature = "nalgebra")]
    #[test]
    fn test_peak_cut_off_at_series_start() {
        // The series begins above half height so the rising side has no crossing
        let samples = gaussian_profile(&[(100.0, 4.0, 1000.0)], 99.0, 115.0, 0.5);
        let peaks = find_peaks(&samples, 0).unwrap();
        assert_eq!(peaks.len(), 1);
        let peak = &peaks[0];
        assert_is_close!(peak.peak_center, 100.0, 1.0 / PRECISION, "center");
        assert_eq!(peak.left_midpoint, None);
        let right = peak.right_midpoint.unwrap();
        assert!(right > 100.0 && right < 104.0, "{right}");
        assert_eq!(peak.full_width_half_max, right);
        assert_is_close!(peak.resolving_power, 100.0 / right, 1e-12, "resolving power");

        let finder = PeakFinderBuilder::new()
            .unresolved_midpoint(UnresolvedMidpoint::Discard)
            .build();
        assert!(finder.find_peaks(&samples).unwrap().is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(2)]
    fn test_insufficient_samples(#[case] count: usize) {
        let samples: Vec<Sample> = (0..count).map(|i| (i as f64, 1.0).into()).collect();
        assert_eq!(
            find_peaks(&samples, 0),
            Err(PeakFinderError::InsufficientSamples { count, minimum: 3 })
        );
    }

    #[test]
    fn test_locator_called_once_with_midpoint_seed() {
        let calls = Cell::new(0usize);
        let seed_seen = Cell::new(None);
        let finder = PeakFinderBuilder::new()
            .locator(
                |series: &QuantizedSeries, seed: usize| -> Result<LocatorOutput, PeakFinderError> {
                    calls.set(calls.get() + 1);
                    seed_seen.set(Some(seed));
                    Ok(LocatorOutput::new(Vec::new(), series.intensities(), None))
                },
            )
            .build();
        let samples: Vec<Sample> = (0..11).map(|i| (i as f64, 1.0).into()).collect();
        assert!(finder.find_peaks(&samples).unwrap().is_empty());
        assert_eq!(calls.get(), 1);
        assert_eq!(seed_seen.get(), Some(5));
    }

    #[rstest]
    #[case(vec![RawPeak::new(3, 1, 11, 0.0)], 10)]
    #[case(vec![RawPeak::new(3, 4, 6, 0.0)], 10)]
    #[case(vec![RawPeak::new(5, 2, 5, 0.0)], 10)]
    #[case(vec![RawPeak::new(5, 2, 8, 0.0)], 9)]
    fn test_locator_contract(#[case] raw: Vec<RawPeak>, #[case] smoothed_len: usize) {
        let finder = PeakFinderBuilder::new()
            .locator(
                move |_: &QuantizedSeries, _: usize| -> Result<LocatorOutput, PeakFinderError> {
                    Ok(LocatorOutput::new(raw.clone(), vec![0.0; smoothed_len], None))
                },
            )
            .build();
        let samples: Vec<Sample> = (0..10).map(|i| (i as f64, 1.0).into()).collect();
        let err = finder.find_peaks(&samples).unwrap_err();
        assert!(
            matches!(err, PeakFinderError::LocatorContract(_)),
            "{err:?}"
        );
    }

    #[test]
    fn test_smoothing_error() {
        let finder = PeakFinderBuilder::new()
            .locator(MagnitudeConcavityLocator::new(
                LocatorOptions::default().smoothing_window(4),
            ))
            .build();
        let samples: Vec<Sample> = (0..10).map(|i| (i as f64, 1.0).into()).collect();
        assert_eq!(
            finder.find_peaks(&samples),
            Err(PeakFinderError::Smoothing(
                SavitskyGolayError::WindowLengthNotOdd(4)
            ))
        );
    }

    #[test]
    fn test_unsorted_input() {
        let mut samples = two_peaks();
        samples.reverse();
        assert_eq!(
            find_peaks(&samples, 0).unwrap(),
            find_peaks(&two_peaks(), 0).unwrap()
        );
    }

    #[test]
    fn test_deterministic() {
        let finder = PeakFinder::new(0);
        let samples = three_peaks();
        assert_eq!(
            finder.find_peaks(&samples).unwrap(),
            finder.find_peaks(&samples).unwrap()
        );
    }

    #[test_log::test]
    fn test_batch_matches_serial() {
        let finder = PeakFinder::new(2);
        let batch = vec![
            two_peaks(),
            three_peaks(),
            vec![Sample::new(1.0, 1.0)],
            gaussian_profile(&[(100.0, 4.0, 1000.0)], 87.5, 112.0, 0.5),
        ];
        let serial: Vec<_> = batch.iter().map(|s| finder.find_peaks(s)).collect();
        let parallel = finder.find_peaks_batch(&batch);
        assert_eq!(parallel, serial);
        assert!(parallel[2].is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_peaks() {
        let peaks = find_peaks(&two_peaks(), 0).unwrap();
        let text = serde_json::to_string(&peaks).unwrap();
        let dup: PeakSet = serde_json::from_str(&text).unwrap();
        assert_eq!(dup.len(), peaks.len());
        assert_eq!(dup[0].location_index, peaks[0].location_index);
    }
}
