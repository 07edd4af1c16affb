use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while planning and converting tracks.
///
/// Only `Config` and `CollisionExhausted` abort a whole run. Everything else
/// is contained at the per-track boundary by the batch orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not allocate a unique song name for '{0}'")]
    CollisionExhausted(String),
    #[error("no audio file in the converted bundle under {}", .0.display())]
    MissingAudio(PathBuf),
    #[error("no step file in the converted bundle under {}", .0.display())]
    MissingSteps(PathBuf),
    #[error("conversion service: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl Error {
    /// True for errors that should stop the run instead of failing one track.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::CollisionExhausted(_))
    }
}
