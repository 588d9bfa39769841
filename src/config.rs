use std::time::Duration;

use crate::error::EngineError;

pub const MAX_WORKERS: usize = 64;  // Keeps the summed density well inside u32 and the log table bounded
const DEFAULT_MIN_GENERATION_MS: u64 = 33;  // One frame at 30 Hz
const DEFAULT_BATCH_SIZE: usize = 8192;  // Iterations between termination checks

/// Static configuration for the density engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub width: usize,
    pub height: usize,
    pub workers: usize,
    /// Counter value at which a worker stops sampling.
    pub saturation_cap: u16,
    /// Minimum generation runtime before an invalidation may preempt it.
    pub min_generation_time: Duration,
    pub batch_size: usize,
    pub sample_spread: f64,
    /// Additive step applied by the spread keys.
    pub spread_step: f64,
    /// Lowest spread the decrease key may reach.
    pub spread_floor: f64,
    pub sensitivity: f64,
    /// Multiplicative step applied by the sensitivity keys.
    pub sensitivity_step: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            workers: 7,
            saturation_cap: 32767,
            min_generation_time: Duration::from_millis(DEFAULT_MIN_GENERATION_MS),
            batch_size: DEFAULT_BATCH_SIZE,
            sample_spread: 3.3,
            spread_step: 0.5,
            spread_floor: 0.3,
            sensitivity: 0.02,
            sensitivity_step: 1.03,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.width == 0 || self.height == 0 {
            return Err(EngineError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if self.width > u32::MAX as usize || self.height > u32::MAX as usize {
            return Err(EngineError::InvalidConfig("grid dimensions must fit in u32"));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(EngineError::InvalidConfig("workers must be between 1 and 64"));
        }
        if self.saturation_cap < 2 {
            return Err(EngineError::InvalidConfig("saturation_cap must be at least 2"));
        }
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig("batch_size must be non-zero"));
        }
        if !(self.spread_floor.is_finite() && self.spread_floor > 0.0) {
            return Err(EngineError::InvalidConfig("spread_floor must be positive"));
        }
        if !(self.sample_spread.is_finite() && self.sample_spread >= self.spread_floor) {
            return Err(EngineError::InvalidConfig("sample_spread must not be below spread_floor"));
        }
        if !(self.spread_step.is_finite() && self.spread_step > 0.0) {
            return Err(EngineError::InvalidConfig("spread_step must be positive"));
        }
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(EngineError::InvalidConfig("sensitivity must be positive"));
        }
        if !(self.sensitivity_step.is_finite() && self.sensitivity_step > 1.0) {
            return Err(EngineError::InvalidConfig("sensitivity_step must be greater than 1"));
        }
        Ok(())
    }

    /// Largest summed density any pixel can reach.
    pub fn max_density_sum(&self) -> usize {
        self.saturation_cap as usize * self.workers
    }
}
