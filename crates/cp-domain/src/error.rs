//! Errores del dominio (sin IO).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("invalid status value: {0}")]
    InvalidStatus(i8),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),
}
