//! Generation lifecycle: reset, jitter, launch samplers, join, then wait for
//! the next invalidation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::controls::{ControlParameters, ControlSnapshot};
use crate::engine::Shared;
use crate::error::EngineError;
use crate::sampler::{SamplerExit, SamplerReport, TrajectorySampler};

const IDLE_POLL: Duration = Duration::from_millis(50);  // Upper bound on a missed wakeup

/// Invalidation flag, shutdown flag and completed-generation counter.
#[derive(Debug, Default)]
pub struct GenerationState {
    invalidated: AtomicBool,
    shutdown: AtomicBool,
    completed: AtomicU64,
    lock: Mutex<()>,
    signal: Condvar,
}

impl GenerationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the current density data stale and wakes an idle coordinator.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.signal.notify_all();
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Requests shutdown. Running samplers leave at their next preemption point.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.invalidate();
    }

    /// Clears the invalidation flag. A shutdown requested concurrently keeps
    /// it set, so samplers of a generation started after shutdown still leave.
    pub(crate) fn begin(&self) {
        self.invalidated.store(false, Ordering::SeqCst);
        if self.is_shutdown() {
            self.invalidated.store(true, Ordering::SeqCst);
        }
    }

    fn finish(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Blocks until invalidated or shut down.
    fn wait_for_invalidation(&self) {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !self.is_invalidated() && !self.is_shutdown() {
            guard = match self.signal.wait_timeout(guard, IDLE_POLL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

pub(crate) struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn run(self) {
        let generation = &self.shared.generation;
        while !generation.is_shutdown() {
            let (snapshot, started) = self.begin_generation();
            if generation.is_shutdown() {
                break;
            }
            let jittered = snapshot.jittered(&self.shared.seeds, self.shared.config.width);
            info!(
                a = snapshot.params.a,
                b = snapshot.params.b,
                spread = snapshot.sample_spread,
                sensitivity = snapshot.sensitivity,
                "starting generation"
            );

            match self.run_generation(&jittered) {
                Ok(reports) => {
                    generation.finish();
                    log_summary(&reports, started.elapsed());
                }
                Err(err) => warn!(%err, "aborting generation; waiting for next invalidation"),
            }

            generation.wait_for_invalidation();
        }
        info!("generation coordinator stopped");
    }

    /// Reset under the gate so the renderer never observes a half-cleared field.
    /// The returned start time is taken after the reset.
    fn begin_generation(&self) -> (ControlSnapshot, Instant) {
        let _gate = self.shared.gate.write().unwrap_or_else(PoisonError::into_inner);
        self.shared.generation.begin();
        let snapshot = self.shared.mapper.snapshot();
        self.shared.field.reset();
        (snapshot, Instant::now())
    }

    fn run_generation(&self, jittered: &[ControlParameters]) -> Result<Vec<SamplerReport>, EngineError> {
        let shared = &*self.shared;
        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(jittered.len());
            let mut spawn_error = None;

            for (worker, &params) in jittered.iter().enumerate() {
                let sampler = TrajectorySampler {
                    worker,
                    params,
                    field: &shared.field,
                    generation: &shared.generation,
                    min_runtime: shared.config.min_generation_time,
                    batch_size: shared.config.batch_size,
                };
                let spawned = thread::Builder::new()
                    .name(format!("dejong-worker-{}", worker))
                    .spawn_scoped(scope, move || sampler.run());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(source) => {
                        spawn_error = Some(EngineError::WorkerSpawn { worker, source });
                        break;
                    }
                }
            }

            // Workers already running are joined either way
            let mut reports = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.join() {
                    Ok(report) => reports.push(report),
                    Err(_) => error!("trajectory sampler panicked"),
                }
            }

            match spawn_error {
                Some(err) => Err(err),
                None => Ok(reports),
            }
        })
    }
}

fn log_summary(reports: &[SamplerReport], elapsed: Duration) {
    let mut saturated = 0;
    let mut iterations = 0;
    for report in reports {
        debug!(
            worker = report.worker,
            iterations = report.iterations,
            peak = report.peak,
            elapsed_ms = report.elapsed.as_millis() as u64,
            exit = ?report.exit,
            "sampler finished"
        );
        iterations += report.iterations;
        if report.exit == SamplerExit::Saturated {
            saturated += 1;
        }
    }
    info!(
        workers = reports.len(),
        saturated,
        iterations,
        elapsed_ms = elapsed.as_millis() as u64,
        "generation complete"
    );
}
