//! Remote invocation with a single bounded retry.
//!
//! One request is driven through an explicit state machine:
//!
//! ```text
//! Init → Requested → RawReceived → Delivered
//!                  ↘ TransportFailed → Failed
//!        RawReceived (rejected) → RetryRequested → RawReceived → Delivered | Failed
//!                                                ↘ TransportFailed → Failed
//! ```
//!
//! A rejected first response earns exactly one more identical call. Transport
//! faults are terminal immediately.

use std::sync::Arc;

use serde::Serialize;

use super::parser::parse_report;
use super::prompt::PERSONA_INSTRUCTION;
use super::schema::report_schema;
use super::types::{AnalysisReport, DirectivePart, ReasoningCall, ReasoningClient};
use super::{AnalysisError, TransportError};
use crate::config::DEFAULT_TEMPERATURE;

/// Upper bound on remote calls for one request (the original plus one retry).
pub const MAX_REMOTE_CALLS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Init,
    Requested,
    RawReceived,
    RetryRequested,
    TransportFailed,
    Delivered,
    Failed,
}

impl InvocationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationEvent {
    /// First call issued.
    Send,
    /// Raw text came back from the service.
    Received,
    /// The call itself failed.
    TransportFault,
    /// The validator accepted the raw text.
    Accept,
    /// The validator rejected the raw text. Every validation fault earns
    /// the single retry.
    Reject,
    /// Give up after a transport fault.
    Abort,
}

/// State machine for one request. Records every state it passes through.
#[derive(Debug, Clone)]
pub struct Invocation {
    state: InvocationState,
    retried: bool,
    trace: Vec<InvocationState>,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            state: InvocationState::Init,
            retried: false,
            trace: vec![InvocationState::Init],
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn trace(&self) -> &[InvocationState] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<InvocationState> {
        self.trace
    }

    /// Apply an event. Illegal transitions are internal defects and surface
    /// as `UnknownFailure`.
    pub fn apply(&mut self, event: InvocationEvent) -> Result<InvocationState, AnalysisError> {
        use self::InvocationEvent as E;
        use self::InvocationState as S;

        let next = match (self.state, event) {
            (S::Init, E::Send) => S::Requested,
            (S::Requested | S::RetryRequested, E::Received) => S::RawReceived,
            (S::Requested | S::RetryRequested, E::TransportFault) => S::TransportFailed,
            (S::RawReceived, E::Accept) => S::Delivered,
            (S::RawReceived, E::Reject) if !self.retried => {
                self.retried = true;
                S::RetryRequested
            }
            (S::RawReceived, E::Reject) => S::Failed,
            (S::TransportFailed, E::Abort) => S::Failed,
            (state, event) => {
                return Err(AnalysisError::UnknownFailure(format!(
                    "illegal invocation transition: {event:?} in state {state:?}"
                )));
            }
        };

        self.state = next;
        self.trace.push(next);
        Ok(next)
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of driving one request to a terminal state.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub result: Result<AnalysisReport, AnalysisError>,
    pub trace: Vec<InvocationState>,
    pub remote_calls: usize,
}

/// Issues reasoning calls with fixed per-call configuration: persona,
/// canonical response schema and a low temperature.
pub struct ReasoningInvoker {
    client: Arc<dyn ReasoningClient>,
    temperature: f32,
}

impl ReasoningInvoker {
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self {
            client,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub fn build_call(&self, parts: Vec<DirectivePart>) -> ReasoningCall {
        ReasoningCall {
            system_instruction: PERSONA_INSTRUCTION.trim().to_string(),
            parts,
            response_schema: report_schema().clone(),
            temperature: self.temperature,
        }
    }

    /// One remote call, suspending until the service answers.
    pub async fn invoke(&self, call: &ReasoningCall) -> Result<String, TransportError> {
        self.client.generate(call).await
    }

    /// Drive one request to `Delivered` or `Failed`.
    pub async fn run(&self, parts: Vec<DirectivePart>) -> InvocationOutcome {
        let call = self.build_call(parts);
        let mut machine = Invocation::new();
        let mut remote_calls = 0;

        let result = self.drive(&call, &mut machine, &mut remote_calls).await;

        InvocationOutcome {
            result,
            trace: machine.into_trace(),
            remote_calls,
        }
    }

    async fn drive(
        &self,
        call: &ReasoningCall,
        machine: &mut Invocation,
        remote_calls: &mut usize,
    ) -> Result<AnalysisReport, AnalysisError> {
        machine.apply(InvocationEvent::Send)?;

        loop {
            *remote_calls += 1;
            let raw = match self.invoke(call).await {
                Ok(raw) => {
                    machine.apply(InvocationEvent::Received)?;
                    raw
                }
                Err(err) => {
                    machine.apply(InvocationEvent::TransportFault)?;
                    machine.apply(InvocationEvent::Abort)?;
                    tracing::error!(
                        attempt = *remote_calls,
                        error = %err,
                        "Reasoning call failed"
                    );
                    return Err(err.into());
                }
            };

            let fault = match parse_report(&raw) {
                Ok(report) => {
                    machine.apply(InvocationEvent::Accept)?;
                    return Ok(report);
                }
                Err(fault) => fault,
            };

            if machine.apply(InvocationEvent::Reject)? == InvocationState::Failed {
                tracing::error!(
                    attempt = *remote_calls,
                    fault = %fault,
                    "Reasoning response rejected, no retries left"
                );
                return Err(fault.into());
            }

            tracing::warn!(
                attempt = *remote_calls,
                fault = %fault,
                raw_length = raw.len(),
                "Reasoning response rejected, retrying once"
            );
        }
    }
}
