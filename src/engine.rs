//! Public face of the density engine, handed to the windowing host.

use std::sync::{Arc, RwLock, TryLockError};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::controls::{ControlKey, ControlParameters, InputMapper};
use crate::coordinator::{Coordinator, GenerationState};
use crate::error::EngineError;
use crate::field::DensityField;
use crate::log_table::LogTable;
use crate::seeds::JitterSeed;
use crate::tone::{DensityPoint, ToneMapper};

/// State shared between the coordinator, its samplers and the renderer.
///
/// Single-writer rules: each plane and peak in `field` is written only by its
/// worker; `mapper` is written by input events; `gate` is taken for writing
/// only by the coordinator while it resets the field.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) field: DensityField,
    pub(crate) mapper: InputMapper,
    pub(crate) generation: GenerationState,
    pub(crate) seeds: JitterSeed,
    pub(crate) gate: RwLock<()>,
}

pub struct Engine {
    shared: Arc<Shared>,
    tone: ToneMapper,
    coordinator: Option<JoinHandle<()>>,
}

impl Engine {
    /// Validates `config`, allocates the field and starts the coordinator,
    /// which begins the first generation immediately.
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let tone = ToneMapper::new(LogTable::new(config.max_density_sum()));
        let shared = Arc::new(Shared {
            field: DensityField::new(config.width, config.height, config.workers, config.saturation_cap),
            mapper: InputMapper::new(&config),
            generation: GenerationState::new(),
            seeds: JitterSeed::new(config.workers),
            gate: RwLock::new(()),
            config,
        });

        let coordinator = Coordinator::new(Arc::clone(&shared));
        let handle = thread::Builder::new()
            .name("dejong-coordinator".to_owned())
            .spawn(move || coordinator.run())
            .map_err(EngineError::CoordinatorSpawn)?;

        info!(
            width = shared.config.width,
            height = shared.config.height,
            workers = shared.config.workers,
            saturation_cap = shared.config.saturation_cap,
            "density engine started"
        );

        Ok(Self { shared, tone, coordinator: Some(handle) })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn on_pointer_move(&self, x: f32, y: f32) {
        self.shared.mapper.on_pointer_move(x, y, &self.shared.generation);
    }

    pub fn on_key(&self, key: ControlKey) {
        self.shared.mapper.on_key(key, &self.shared.generation);
    }

    /// Tone-maps the current field into `out`. Returns `false`, leaving `out`
    /// untouched, when a generation reset is in progress.
    pub fn render_frame(&self, out: &mut Vec<DensityPoint>) -> bool {
        let _gate = match self.shared.gate.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return false,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        self.tone.render(&self.shared.field, out);
        true
    }

    pub fn current_parameters(&self) -> ControlParameters {
        self.shared.mapper.parameters()
    }

    pub fn current_parameters_label(&self) -> String {
        self.current_parameters().to_string()
    }

    pub fn completed_generations(&self) -> u64 {
        self.shared.generation.completed()
    }

    pub fn worker_peaks(&self) -> Vec<u16> {
        let field = &self.shared.field;
        (0..field.workers()).map(|worker| field.peak(worker)).collect()
    }

    /// Stops the coordinator and joins it. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.coordinator.take() else {
            return;
        };
        self.shared.generation.shutdown();
        if handle.join().is_err() {
            warn!("generation coordinator panicked");
        }
        info!("density engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
