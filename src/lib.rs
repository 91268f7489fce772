//! `imspeaks` finds the peaks in an ion mobility intensity profile and
//! characterizes each one by its apex, full width at half maximum, resolving
//! power and area.
//!
//! The pipeline is driven by [`PeakFinder`]. Candidate peaks are proposed by a
//! [`PeakLocator`], which is a trait so that the width and resolving power
//! estimation can be reused with any candidate detection strategy. The bundled
//! [`MagnitudeConcavityLocator`] smooths the signal with a Savitzky-Golay filter
//! and accepts concave down local maxima.
//!
//! # Usage
//! ```
//! use imspeaks::{find_peaks, Sample};
//!
//! let sigma = 4.0 / 2.354820045;
//! let samples: Vec<Sample> = (0..50)
//!     .map(|i| {
//!         let x = 87.5 + i as f64 * 0.5;
//!         let y = 1000.0 * (-(x - 100.0f64).powi(2) / (2.0 * sigma * sigma)).exp();
//!         Sample::new(x, y)
//!     })
//!     .collect();
//!
//! let peaks = find_peaks(&samples, 0).unwrap();
//! assert_eq!(peaks.len(), 1);
//! for peak in peaks.iter() {
//!     println!("{}", peak);
//! }
//! ```
//!
//! ## Features
//! - `nalgebra` (default) enables the Savitzky-Golay filter, otherwise a moving
//!   average is used for smoothing.
//! - `parallelism` (default) uses `rayon` to process batches of series in
//!   parallel with [`PeakFinder::find_peaks_batch`].
//! - `serde` derives serialization for the input and output types.
pub mod arrayops;
pub mod locator;
pub mod peak;
pub mod peak_finder;
pub mod peak_statistics;
pub mod prelude;
pub mod quantize;
pub mod smooth;

#[cfg(test)]
mod test_data;

pub use crate::locator::{
    LocatorOptions, LocatorOutput, MagnitudeConcavityLocator, PeakLocator, RawPeak,
};
pub use crate::peak::{Peak, PeakSet, Point};
pub use crate::peak_finder::{find_peaks, PeakFinder, PeakFinderBuilder, PeakFinderError};
pub use crate::peak_statistics::UnresolvedMidpoint;
pub use crate::quantize::{quantize, QuantizedSample, QuantizedSeries, Sample, PRECISION};
pub use crate::smooth::SavitskyGolayError;
