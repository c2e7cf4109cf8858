//! Error types for the budget-choice experiment service

use thiserror::Error;

/// Result type alias for experiment operations
pub type Result<T> = std::result::Result<T, ExperimentError>;

#[derive(Error, Debug)]
pub enum ExperimentError {

    // =============================
    // Session / Ledger Errors
    // =============================

    #[error("Invalid choice: {0}")]
    InvalidChoice(String),

    #[error("Invalid intake: {0}")]
    InvalidIntake(String),

    #[error("Session already complete: {0}")]
    SessionComplete(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Export not ready: {0}")]
    ExportNotReady(String),

    #[error("Internal consistency violation: {0}")]
    InvariantViolation(String),

    // =============================
    // Advice Service Errors
    // =============================

    #[error("Advice service error: {0}")]
    AdviceError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
