pub mod types;
pub mod encoder;
pub mod sanitize;
pub mod prompt;
pub mod schema;
pub mod parser;
pub mod classify;
pub mod gemini;
pub mod invoker;
pub mod orchestrator;

#[cfg(test)]
mod scenario_tests;

pub use types::*;
pub use encoder::*;
pub use prompt::*;
pub use parser::*;
pub use gemini::*;
pub use invoker::*;
pub use orchestrator::*;

use serde::Serialize;
use thiserror::Error;

/// Closed failure taxonomy surfaced to callers of `analyze`.
///
/// Every variant carries a complete human-readable message. No variant
/// is ever accompanied by a partial report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("The reasoning service returned an empty response")]
    EmptyResponse,

    #[error("The reasoning service returned output that is not valid JSON: {0}")]
    MalformedOutput(String),

    #[error("The reasoning service output does not match the report schema: {0}")]
    SchemaViolation(String),

    #[error("The reasoning service could not be reached or rejected the request: {0}")]
    TransportFailure(String),

    #[error("Analysis failed: {0}")]
    UnknownFailure(String),
}

/// Kind tag of an `AnalysisError`, for callers that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    EmptyResponse,
    MalformedOutput,
    SchemaViolation,
    TransportFailure,
    UnknownFailure,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "EmptyResponse",
            Self::MalformedOutput => "MalformedOutput",
            Self::SchemaViolation => "SchemaViolation",
            Self::TransportFailure => "TransportFailure",
            Self::UnknownFailure => "UnknownFailure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnalysisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyResponse => FailureKind::EmptyResponse,
            Self::MalformedOutput(_) => FailureKind::MalformedOutput,
            Self::SchemaViolation(_) => FailureKind::SchemaViolation,
            Self::TransportFailure(_) => FailureKind::TransportFailure,
            Self::UnknownFailure(_) => FailureKind::UnknownFailure,
        }
    }
}

/// Failures of the remote call itself. Never retried by the invoker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Reasoning service is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Reasoning service returned an error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Request was blocked by the reasoning service: {0}")]
    Blocked(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Could not decode the service response envelope: {0}")]
    ResponseParsing(String),
}
