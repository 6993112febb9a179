//! Error agregado de la capa de orquestación.

use thiserror::Error;

use crate::traits::{ApiError, StoreError};
use cp_domain::DomainError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("revision {0} missing from API response")]
    MissingRevision(u32),
    #[error("diff {0} has no submission id")]
    MissingSubmission(u32),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}
