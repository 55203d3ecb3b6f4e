use thiserror::Error;

use crate::application::sync::SyncError;
use crate::config::LoadError;
use crate::infra::error::InfraError;

/// Top-level application error, reported once at process exit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
