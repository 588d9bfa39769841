//! Live Peter de Jong attractor rendered as a density field.
//!
//! A pool of trajectory samplers fills one histogram plane per worker while
//! the renderer reads the planes every frame and tone-maps the summed counts.

pub mod config;
pub mod controls;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod field;
pub mod log_table;
pub mod sampler;
pub mod seeds;
pub mod tone;

pub use config::EngineConfig;
pub use controls::{ControlKey, ControlParameters};
pub use engine::Engine;
pub use error::EngineError;
pub use tone::DensityPoint;
