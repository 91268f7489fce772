//! Noise suppression for intensity profiles.
//!
//! [`smooth_signal`] is the entry point used by the bundled peak locator. It
//! dispatches to a Savitzky-Golay filter when the `nalgebra` feature is enabled
//! and to a centered moving average otherwise.
use cfg_if::cfg_if;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SavitskyGolayError {
    #[error("The window length must be an odd number, received {0}")]
    WindowLengthNotOdd(usize),
    #[error(
        "The window length must be shorter than the data, received {0} window with {1} data points"
    )]
    WindowLengthTooLong(usize, usize),
    #[error("The polynomial order term {0} must be less than the window size {1}")]
    PolynomialOrderTooLarge(usize, usize),
    #[error("Failed to solve for coefficients: {0}")]
    FailedToSolveCoefficients(&'static str),
}

/// Average each point with its `window / 2` neighbors on either side.
///
/// Near the ends of the array the window is truncated to the points that exist
/// so the output is aligned index-for-index with `data`.
pub fn moving_average_dyn(data: &[f64], destination: &mut [f64], window: usize) {
    let n = data.len();
    let half = window / 2;
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for (i, y) in data.iter().enumerate() {
        prefix.push(prefix[i] + *y);
    }
    for (i, out) in destination.iter_mut().enumerate().take(n) {
        let start = i.saturating_sub(half);
        let end = (i + half + 1).min(n);
        *out = (prefix[end] - prefix[start]) / (end - start) as f64;
    }
}

/// A polynomial stored as coefficients of increasing degree
#[derive(Debug, Clone)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        // Horner's scheme
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + *c)
    }
}

#[allow(unused)]
#[derive(Debug, Clone)]
struct SavitskyGolay<'a> {
    data: &'a [f64],
    window_length: usize,
    poly_order: usize,
}

#[cfg(feature = "nalgebra")]
mod nalgebra_impl {
    use nalgebra::{DMatrix, DVector};

    use super::*;

    impl<'a> SavitskyGolay<'a> {
        pub(super) fn new(
            data: &'a [f64],
            window_length: usize,
            poly_order: usize,
        ) -> Result<Self, SavitskyGolayError> {
            let inst = Self {
                data,
                window_length,
                poly_order,
            };
            inst.validate()?;
            Ok(inst)
        }

        fn validate(&self) -> Result<(), SavitskyGolayError> {
            let n = self.data.len();
            if self.window_length % 2 == 0 {
                Err(SavitskyGolayError::WindowLengthNotOdd(self.window_length))
            } else if self.window_length > n {
                Err(SavitskyGolayError::WindowLengthTooLong(
                    self.window_length,
                    n,
                ))
            } else if self.poly_order >= self.window_length {
                Err(SavitskyGolayError::PolynomialOrderTooLarge(
                    self.poly_order,
                    self.window_length,
                ))
            } else {
                Ok(())
            }
        }

        const fn half_length(&self) -> usize {
            self.window_length / 2
        }

        /// Solve for the filter weights that evaluate the local least squares
        /// polynomial at the window's center.
        fn estimate_coefficients(&self) -> Result<DVector<f64>, SavitskyGolayError> {
            let half_length = self.half_length() as f64;

            // Vandermonde matrix, one row per polynomial term
            let vandermonde =
                DMatrix::from_fn(self.poly_order + 1, self.window_length, |i, j| {
                    (j as f64 - half_length).powi(i as i32)
                });

            let mut y = DVector::from_element(self.poly_order + 1, 0.0);
            y[0] = 1.0;

            let svd = nalgebra::linalg::SVD::new(vandermonde, true, true);
            svd.solve(&y, 1e-12)
                .map_err(SavitskyGolayError::FailedToSolveCoefficients)
        }

        fn polyfit(&self, x: &[f64], y: &[f64]) -> Result<Polynomial, SavitskyGolayError> {
            let nc = self.poly_order + 1;
            let nr = x.len();

            let mut system = DMatrix::<f64>::zeros(nr, nc);
            x.iter().enumerate().for_each(|(row_i, x)| {
                system[(row_i, 0)] = 1.0;
                (1..nc).for_each(|col_j| system[(row_i, col_j)] = x.powi(col_j as i32));
            });

            let beta = DVector::from_row_slice(y);
            let decomp = nalgebra::linalg::SVD::new(system, true, true);

            let coefficients = decomp
                .solve(&beta, 1e-18)
                .map_err(SavitskyGolayError::FailedToSolveCoefficients)?;
            Ok(Polynomial::new(coefficients.iter().copied().collect()))
        }

        /// Fit a polynomial to the window starting at `window_start` and use it to
        /// fill `destination[interp_start..interp_stop]`.
        fn fit_edge(
            &self,
            window_start: usize,
            interp_start: usize,
            interp_stop: usize,
            destination: &mut [f64],
        ) -> Result<(), SavitskyGolayError> {
            let x_edge: Vec<f64> = (0..self.window_length).map(|i| i as f64).collect();
            let y_edge = &self.data[window_start..window_start + self.window_length];
            let poly = self.polyfit(&x_edge, y_edge)?;
            for i in interp_start..interp_stop {
                destination[i] = poly.evaluate((i - window_start) as f64);
            }
            Ok(())
        }

        pub(super) fn smooth(&self) -> Result<Vec<f64>, SavitskyGolayError> {
            let n = self.data.len();
            let half = self.half_length();
            let coefs = self.estimate_coefficients()?;

            let mut y = self.data.to_vec();
            for (i, window) in self.data.windows(self.window_length).enumerate() {
                y[i + half] = window
                    .iter()
                    .zip(coefs.iter())
                    .map(|(a, c)| a * c)
                    .sum();
            }

            self.fit_edge(0, 0, half, &mut y)?;
            self.fit_edge(n - self.window_length, n - half, n, &mut y)?;
            Ok(y)
        }
    }

    /// Smooth `data` with a Savitzky-Golay filter of the given window length and
    /// polynomial order.
    ///
    /// The first and last `window_length / 2` points are estimated by evaluating
    /// a polynomial fit to the first and last full window.
    pub fn savitzky_golay(
        data: &[f64],
        window_length: usize,
        poly_order: usize,
    ) -> Result<Vec<f64>, SavitskyGolayError> {
        let state = SavitskyGolay::new(data, window_length, poly_order)?;
        state.smooth()
    }
}

#[cfg(feature = "nalgebra")]
pub use nalgebra_impl::savitzky_golay;

/// Smooth `data` with the best filter available, shrinking `window` to fit short arrays.
///
/// A window of one point, or a window too small to hold a polynomial of
/// `poly_order`, returns a copy of `data`.
pub fn smooth_signal(
    data: &[f64],
    window: usize,
    poly_order: usize,
) -> Result<Vec<f64>, SavitskyGolayError> {
    let n = data.len();
    let window = if window > n {
        if n % 2 == 0 {
            n.saturating_sub(1)
        } else {
            n
        }
    } else {
        window
    };
    if window <= 1 || window <= poly_order {
        return Ok(data.to_vec());
    }
    if window % 2 == 0 {
        return Err(SavitskyGolayError::WindowLengthNotOdd(window));
    }
    cfg_if! {
        if #[cfg(feature = "nalgebra")] {
            savitzky_golay(data, window, poly_order)
        } else {
            let mut out = vec![0.0; n];
            moving_average_dyn(data, &mut out, window);
            Ok(out)
        }
    }
}
