//! Error types for the salary grading service.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure the engine, validator, and scenario repository can report.

use thiserror::Error;
use uuid::Uuid;

/// The main error type for the salary grading service.
///
/// All operations in the crate return this error type, making it easy
/// to handle errors consistently and map them onto API responses.
///
/// # Example
///
/// ```
/// use salary_grading::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/hierarchy.yaml".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Configuration file not found: /missing/hierarchy.yaml"
/// );
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed or is inconsistent.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The system has no usable position hierarchy, so no grades can be calculated.
    #[error("System not configured: {message}")]
    Configuration {
        /// A description of what is missing.
        message: String,
    },

    /// A single input value was out of range or could not be used.
    #[error("Invalid input '{field}': {message}")]
    InvalidInput {
        /// The offending field.
        field: String,
        /// A description of the problem.
        message: String,
    },

    /// Rate inputs failed validation. Every problem found is listed.
    #[error("Validation failed with {} error(s)", errors.len())]
    Validation {
        /// Human-readable messages, one per problem.
        errors: Vec<String>,
    },

    /// A lifecycle rule was violated (e.g. applying a scenario that is not a draft).
    #[error("Invalid state for scenario {scenario_id}: {message}")]
    InvalidState {
        /// The scenario the operation targeted.
        scenario_id: Uuid,
        /// A description of the violated rule.
        message: String,
    },

    /// A concurrent modification won the race for the same grading system.
    #[error("Conflict on grading system '{grading_system}': {message}")]
    Conflict {
        /// The grading system whose state changed underneath the operation.
        grading_system: String,
        /// A description of the conflict.
        message: String,
    },

    /// The requested scenario does not exist.
    #[error("Scenario not found: {id}")]
    ScenarioNotFound {
        /// The scenario id that was requested.
        id: Uuid,
    },

    /// The requested grading system is not configured.
    #[error("Grading system not found: {id}")]
    GradingSystemNotFound {
        /// The grading system id that was requested.
        id: String,
    },

    /// The storage layer failed; nothing from the current operation was written.
    #[error("Persistence error: {message}")]
    Persistence {
        /// A description of the storage failure.
        message: String,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
