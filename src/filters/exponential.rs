use super::{blend, SignalFilter};
use crate::constants::{SMOOTHING_FACTOR_MAX, SMOOTHING_FACTOR_MIN};

/// Exponential smoothing filter.
///
/// `factor` is the inertia: the share of the previous value kept on every
/// update.
#[derive(Debug, Clone)]
pub struct ExponentialFilter {
    factor: f64,
    last: Option<f64>,
}

impl ExponentialFilter {
    pub fn new(factor: f64) -> Self {
        assert!(Self::is_valid_factor(factor), "Factor must be in [0, 1)");
        Self { factor, last: None }
    }

    /// Filter that starts from `initial` instead of an unset value
    pub fn seeded(factor: f64, initial: f64) -> Self {
        let mut filter = Self::new(factor);
        filter.last = Some(initial);
        filter
    }

    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub(crate) fn is_valid_factor(factor: f64) -> bool {
        (SMOOTHING_FACTOR_MIN..SMOOTHING_FACTOR_MAX).contains(&factor)
    }
}

impl SignalFilter for ExponentialFilter {
    fn apply(&mut self, value: f64) -> f64 {
        let filtered = blend(self.last, value, self.factor);
        self.last = Some(filtered);
        filtered
    }

    fn value(&self) -> Option<f64> {
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_filter() {
        let mut filter = ExponentialFilter::new(0.6);

        // First value seeds
        assert_eq!(filter.apply(10.0), 10.0);

        // Second value keeps 60% of the previous
        let second = filter.apply(20.0);
        assert!((second - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_factor_bounds() {
        // Low inertia follows the input closely
        let mut loose = ExponentialFilter::new(0.1);
        loose.apply(10.0);
        assert!((loose.apply(20.0) - 19.0).abs() < 1e-9);

        // High inertia barely moves
        let mut heavy = ExponentialFilter::new(0.9);
        heavy.apply(10.0);
        assert!((heavy.apply(20.0) - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_filter_blends_immediately() {
        let mut filter = ExponentialFilter::seeded(0.6, 0.5);
        let value = filter.apply(1.0);
        assert!((value - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_reset_forgets_prior() {
        let mut filter = ExponentialFilter::new(0.6);
        filter.apply(100.0);
        filter.reset();
        assert_eq!(filter.value(), None);
        assert_eq!(filter.apply(5.0), 5.0);
    }

    #[test]
    #[should_panic(expected = "Factor must be in [0, 1)")]
    fn test_factor_one_rejected() {
        let _ = ExponentialFilter::new(1.0);
    }
}
