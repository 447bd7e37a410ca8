//! Tuning knobs for the acceleration engine.

/// The default ceiling on the powers the engine may compute.
pub const DEFAULT_MAX_POWER: usize = 512;

/// Options controlling [`accelerate`].
///
/// # Examples
/// ```
/// # use paraclosure::AccelerationConfig;
/// let config = AccelerationConfig::default().with_max_power(64);
/// assert_eq!(config.max_power, 64);
/// ```
///
/// [`accelerate`]: ../acceleration/fn.accelerate.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelerationConfig {
    /// The largest power `R^i` the engine may request. Requesting a larger one ends the
    /// computation with an `AccelerationDivergent` error.
    pub max_power: usize,
}

impl Default for AccelerationConfig {
    fn default() -> AccelerationConfig {
        AccelerationConfig {
            max_power: DEFAULT_MAX_POWER,
        }
    }
}

impl AccelerationConfig {
    /// Replace the power ceiling.
    pub fn with_max_power(mut self, max_power: usize) -> AccelerationConfig {
        self.max_power = max_power;
        self
    }
}
