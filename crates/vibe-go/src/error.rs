use thiserror::Error;
use vibe_go_core::PipelineError;

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Png(#[from] png::EncodingError),

    #[error("audio output unavailable: {0}")]
    AudioOutput(String),

    #[error("{0} lock poisoned")]
    Poisoned(&'static str),
}
