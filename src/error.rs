use thiserror::Error;

use crate::engine::Lifecycle;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink is not open")]
    NotOpen,

    #[error("sink is not playing")]
    NotPlaying,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// The output could not be opened or started; no audio is produced.
    #[error("audio sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: Lifecycle,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("config write error: {0}")]
    RonWrite(#[from] ron::Error),

    #[error("generation thread panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
