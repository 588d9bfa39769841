//! Maps pointer position and key presses onto attractor parameters.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::config::EngineConfig;
use crate::coordinator::GenerationState;
use crate::seeds::JitterSeed;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    pub a: f64,
    pub b: f64,
}

impl fmt::Display for ControlParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a={:.6}, b={:.6}", self.a, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKey {
    SpreadUp,
    SpreadDown,
    SensitivityDown,
    SensitivityUp,
}

/// Control values captured once at the start of a generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSnapshot {
    pub params: ControlParameters,
    pub sample_spread: f64,
    pub sensitivity: f64,
}

impl ControlSnapshot {
    /// Per-worker parameters, offset by `sigma * seed - sigma / 2` where
    /// `sigma = sensitivity / (sample_spread * width)`.
    pub fn jittered(&self, seeds: &JitterSeed, width: usize) -> Vec<ControlParameters> {
        let sigma = self.sensitivity / (self.sample_spread * width as f64);
        seeds
            .iter()
            .map(|(sx, sy)| ControlParameters {
                a: self.params.a + sigma * sx - sigma / 2.0,
                b: self.params.b + sigma * sy - sigma / 2.0,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct ControlState {
    pointer_x: f64,
    pointer_y: f64,
    sample_spread: f64,
    sensitivity: f64,
}

/// Input-to-parameter mapper. Many writers (input events), one primary
/// reader (the coordinator at generation start).
#[derive(Debug)]
pub struct InputMapper {
    width: f64,
    height: f64,
    spread_step: f64,
    spread_floor: f64,
    sensitivity_step: f64,
    state: Mutex<ControlState>,
}

impl InputMapper {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            width: config.width as f64,
            height: config.height as f64,
            spread_step: config.spread_step,
            spread_floor: config.spread_floor,
            sensitivity_step: config.sensitivity_step,
            state: Mutex::new(ControlState {
                pointer_x: 0.0,
                pointer_y: 0.0,
                sample_spread: config.sample_spread,
                sensitivity: config.sensitivity,
            }),
        }
    }

    pub fn on_pointer_move(&self, x: f32, y: f32, generation: &GenerationState) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            // Non-finite input maps to the origin
            state.pointer_x = clamp_or_zero(x as f64, self.width);
            state.pointer_y = clamp_or_zero(y as f64, self.height);
        }
        generation.invalidate();
    }

    pub fn on_key(&self, key: ControlKey, generation: &GenerationState) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match key {
                ControlKey::SpreadUp => state.sample_spread += self.spread_step,
                ControlKey::SpreadDown => {
                    state.sample_spread = (state.sample_spread - self.spread_step).max(self.spread_floor)
                }
                ControlKey::SensitivityDown => state.sensitivity /= self.sensitivity_step,
                ControlKey::SensitivityUp => state.sensitivity *= self.sensitivity_step,
            }
            tracing::debug!(?key, spread = state.sample_spread, sensitivity = state.sensitivity, "control key applied");
        }
        generation.invalidate();
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ControlSnapshot {
            params: self.parameters_for(&state),
            sample_spread: state.sample_spread,
            sensitivity: state.sensitivity,
        }
    }

    pub fn parameters(&self) -> ControlParameters {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.parameters_for(&state)
    }

    fn parameters_for(&self, state: &ControlState) -> ControlParameters {
        ControlParameters {
            a: (state.pointer_x * 2.0 / self.width - 1.0) * state.sensitivity,
            b: (state.pointer_y * 2.0 / self.height - 1.0) * state.sensitivity,
        }
    }
}

fn clamp_or_zero(value: f64, extent: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, extent)
    } else {
        0.0
    }
}
