use thiserror::Error;

/// Errors raised while configuring or starting the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The long-lived coordinator thread could not be started.
    #[error("failed to spawn generation coordinator: {0}")]
    CoordinatorSpawn(#[source] std::io::Error),
    /// A sampler thread could not be started; the generation is abandoned.
    #[error("failed to spawn sampler for worker {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },
}
