//! Error types for Arcane
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in the Arcane core
#[derive(Debug, Error)]
pub enum ArcaneError {
    /// Plan not found in the plan store
    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Text-generation error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Action construction or execution error
    #[error("Action error: {0}")]
    Action(String),

    /// Prompt template error
    #[error("Template error: {0}")]
    Template(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Arcane operations
pub type Result<T> = std::result::Result<T, ArcaneError>;
