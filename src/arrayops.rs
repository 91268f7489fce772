use num_traits::Float;

/// Integrate `y` over `x` with the trapezoid rule.
///
/// Arrays of fewer than two points have no area.
pub fn trapz<T: Float>(x: &[T], y: &[T]) -> T {
    let n = x.len().min(y.len());
    let half = T::from(0.5).unwrap();
    (1..n).fold(T::zero(), |acc, i| {
        let delta = x[i] - x[i - 1];
        acc + delta * half * (y[i] + y[i - 1])
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trapz() {
        let x = [0.0, 1.0, 2.0, 4.0];
        let y = [0.0, 2.0, 2.0, 0.0];
        assert_eq!(trapz(&x, &y), 1.0 + 2.0 + 2.0);
        assert_eq!(trapz(&x[..1], &y[..1]), 0.0);
        assert_eq!(trapz::<f64>(&[], &[]), 0.0);
    }
}
