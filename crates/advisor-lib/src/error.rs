//! Error taxonomy for the advisory service
//!
//! Only model availability and input validation produce non-success
//! responses; generation, translation, and history failures are absorbed
//! inside their modules and never reach this type.

use thiserror::Error;

/// Which model a `ModelUnavailable` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Crop,
    Disease,
}

impl ModelKind {
    pub fn unavailable_detail(&self) -> &'static str {
        match self {
            ModelKind::Crop => "Crop recommendation model not available",
            ModelKind::Disease => "Disease detection model not available",
        }
    }
}

/// Request-level failures surfaced to the client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The required model artifact failed to load at startup. Permanent for
    /// the process lifetime; a restart is required to retry.
    #[error("{}", .0.unavailable_detail())]
    ModelUnavailable(ModelKind),

    /// Malformed payload, wrong content-type, or undecodable image.
    #[error("{0}")]
    InvalidInput(String),

    /// The image classified below the confidence floor.
    #[error("{0}")]
    LowConfidence(String),

    /// Anything uncaught. The detail is logged server-side and never sent
    /// to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        ServiceError::InvalidInput(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
