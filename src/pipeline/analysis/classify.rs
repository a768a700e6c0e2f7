// Error classification: every internal failure maps to exactly one
// `AnalysisError` kind. Transport faults keep the remote message.

use super::parser::ValidationFault;
use super::{AnalysisError, TransportError};

/// Map a terminal validation fault (after the retry) to its public kind.
pub fn classify_validation_fault(fault: ValidationFault) -> AnalysisError {
    match fault {
        ValidationFault::Empty => AnalysisError::EmptyResponse,
        ValidationFault::Malformed(msg) => AnalysisError::MalformedOutput(msg),
        ValidationFault::Schema(msg) => AnalysisError::SchemaViolation(msg),
    }
}

/// Map a transport fault to its public kind.
pub fn classify_transport_error(err: &TransportError) -> AnalysisError {
    AnalysisError::TransportFailure(err.to_string())
}

impl From<ValidationFault> for AnalysisError {
    fn from(fault: ValidationFault) -> Self {
        classify_validation_fault(fault)
    }
}

impl From<TransportError> for AnalysisError {
    fn from(err: TransportError) -> Self {
        classify_transport_error(&err)
    }
}
