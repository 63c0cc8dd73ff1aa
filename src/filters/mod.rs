//! Signal smoothing for noisy per-frame measurements.
//!
//! Every placement channel (center, size, angle, depth) and the ambient
//! light level is smoothed independently by a [`SignalFilter`]. The default
//! is exponential blending with a single inertia factor shared by all
//! channels.

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{Error, Result};

/// Blend a new measurement into the previous smoothed value.
///
/// `factor` is the weight of the previous value. Without a previous value
/// the measurement passes through unchanged.
#[must_use]
pub fn blend(previous: Option<f64>, current: f64, factor: f64) -> f64 {
    match previous {
        Some(prev) => factor * prev + (1.0 - factor) * current,
        None => current,
    }
}

/// Trait for all single-channel smoothing filters
pub trait SignalFilter: Send + Sync {
    /// Feed a measurement and return the smoothed value
    fn apply(&mut self, value: f64) -> f64;

    /// Last smoothed value, `None` until the first measurement
    fn value(&self) -> Option<f64>;

    /// Forget the previous value so the next measurement seeds the filter
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// Pass-through filter that only remembers the last value
#[derive(Debug, Default, Clone)]
pub struct NoFilter {
    last: Option<f64>,
}

impl SignalFilter for NoFilter {
    fn apply(&mut self, value: f64) -> f64 {
        self.last = Some(value);
        value
    }

    fn value(&self) -> Option<f64> {
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Smoothing factor named by a filter spec.
///
/// `exponential:<factor>` overrides `default_factor`; every other spec uses
/// it unchanged. The light channel reads its factor from here so that all
/// channels share one inertia.
///
/// # Errors
///
/// Returns an error if the factor cannot be parsed or lies outside `[0, 1)`.
pub fn filter_factor(spec: &str, default_factor: f64) -> Result<f64> {
    let factor = match spec.split_once(':') {
        Some((_, raw)) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::InvalidInput(format!("Invalid smoothing factor '{raw}': {e}")))?,
        None => default_factor,
    };
    if !exponential::ExponentialFilter::is_valid_factor(factor) {
        return Err(Error::InvalidInput(format!(
            "Smoothing factor must be in [0, 1), got {factor}"
        )));
    }
    Ok(factor)
}

/// Create a filter by type name.
///
/// Accepts `none`, `exponential` (uses `default_factor`) and
/// `exponential:<factor>`.
///
/// # Errors
///
/// Returns an error for unknown names or a factor outside `[0, 1)`.
pub fn create_filter(spec: &str, default_factor: f64) -> Result<Box<dyn SignalFilter>> {
    let spec = spec.to_lowercase();
    let (name, param) = match spec.split_once(':') {
        Some((name, param)) => (name, Some(param)),
        None => (spec.as_str(), None),
    };

    match (name, param) {
        ("none" | "nofilter", None) => Ok(Box::new(NoFilter::default())),
        ("exponential", _) => {
            let factor = filter_factor(&spec, default_factor)?;
            Ok(Box::new(exponential::ExponentialFilter::new(factor)))
        }
        _ => Err(Error::InvalidInput(format!("Unknown filter type: {spec}"))),
    }
}
