use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use super::encoder::encode_all;
use super::invoker::{InvocationOutcome, ReasoningInvoker};
use super::prompt::{build_directive, build_parts};
use super::types::{AnalysisReport, AnalysisRequest, ReasoningClient, TaskType, UploadedArtifact};
use super::AnalysisError;

/// The analysis pipeline: encode → assemble → invoke → validate.
///
/// Owns no state beyond the explicitly constructed client; each request is
/// independent.
pub struct AnalysisPipeline {
    invoker: ReasoningInvoker,
}

impl AnalysisPipeline {
    pub fn new(client: Arc<dyn ReasoningClient>) -> Self {
        Self {
            invoker: ReasoningInvoker::new(client),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.invoker = self.invoker.with_temperature(temperature);
        self
    }

    pub fn model_name(&self) -> &str {
        self.invoker.model_name()
    }

    /// Validate inputs, then run the full pipeline.
    pub async fn analyze(
        &self,
        task: TaskType,
        context: &str,
        artifacts: Vec<UploadedArtifact>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let request = AnalysisRequest::new(task, context, artifacts)?;
        self.run(&request).await
    }

    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
        self.execute(request).await.result
    }

    /// Run one request and keep the invocation trace.
    pub async fn execute(&self, request: &AnalysisRequest) -> InvocationOutcome {
        let span = tracing::info_span!(
            "analysis",
            task = request.task().as_str(),
            artifacts = request.artifacts().len(),
            model = self.model_name()
        );
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, request: &AnalysisRequest) -> InvocationOutcome {
        let start = Instant::now();
        tracing::info!("Starting analysis");

        // Step 1: Encode artifacts (concurrent, order-preserving)
        let encoded = encode_all(request.artifacts()).await;
        let extracted = encoded.iter().filter(|e| e.extracted).count();

        // Step 2: Assemble the directive and transport parts
        let directive = build_directive(request.task(), request.context(), &encoded);
        let parts = build_parts(directive, &encoded);
        tracing::debug!(
            parts = parts.len(),
            extracted_fragments = extracted,
            "Directive assembled"
        );

        // Step 3: Invoke with the single bounded retry
        let mut outcome = self.invoker.run(parts).await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &mut outcome.result {
            Ok(report) => {
                if report.task.trim().is_empty() {
                    report.task = request.task().as_str().to_string();
                }
                tracing::info!(
                    elapsed_ms,
                    attempts = outcome.remote_calls,
                    signals = report.signals.len(),
                    actions = report.recommended_actions.len(),
                    "Analysis delivered"
                );
            }
            Err(err) => {
                tracing::warn!(
                    elapsed_ms,
                    attempts = outcome.remote_calls,
                    kind = err.kind().as_str(),
                    "Analysis failed"
                );
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analysis::gemini::MockReasoningClient;
    use crate::pipeline::analysis::parser::tests::{sample_report_json, sample_report_text};
    use crate::pipeline::analysis::types::DirectivePart;
    use crate::pipeline::analysis::FailureKind;

    fn pipeline(mock: &Arc<MockReasoningClient>) -> AnalysisPipeline {
        AnalysisPipeline::new(mock.clone())
    }

    fn text_artifact(name: &str, body: &str) -> UploadedArtifact {
        UploadedArtifact::new(name, "text/plain", body.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn analyze_returns_report() {
        let mock = Arc::new(MockReasoningClient::new(&sample_report_text()));
        let report = pipeline(&mock)
            .analyze(TaskType::DetectOutbreak, "Cluster of fevers", vec![])
            .await
            .unwrap();
        assert_eq!(report.task, "Detect outbreak");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn blank_task_filled_from_request() {
        let mut value = sample_report_json();
        value["task"] = "".into();
        let mock = Arc::new(MockReasoningClient::new(&value.to_string()));
        let report = pipeline(&mock)
            .analyze(TaskType::GenerateBriefing, "ctx", vec![])
            .await
            .unwrap();
        assert_eq!(report.task, "Generate briefing");
    }

    #[tokio::test]
    async fn directive_then_one_binary_part_per_artifact() {
        let mock = Arc::new(MockReasoningClient::new(&sample_report_text()));
        let artifacts = vec![
            text_artifact("notes.txt", "5 deaths"),
            UploadedArtifact::new("photo.png", "image/png", vec![0x89, b'P', b'N', b'G']),
        ];
        pipeline(&mock)
            .analyze(TaskType::DetectOutbreak, "", artifacts)
            .await
            .unwrap();

        let call = &mock.calls()[0];
        assert_eq!(call.parts.len(), 3);
        let DirectivePart::Text(directive) = &call.parts[0] else {
            panic!("first part must be the directive");
        };
        assert!(directive.contains("--- START FILE: notes.txt ---\n5 deaths"));
        assert!(directive.contains("[Content of type image/png is attached as a separate binary part]"));
        assert!(matches!(
            &call.parts[2],
            DirectivePart::InlineData { mime_type, .. } if mime_type == "image/png"
        ));
    }

    #[tokio::test]
    async fn empty_request_never_calls_service() {
        let mock = Arc::new(MockReasoningClient::new(&sample_report_text()));
        let err = pipeline(&mock)
            .analyze(TaskType::DetectOutbreak, "  ", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnknownFailure);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn execute_exposes_trace() {
        let mock = Arc::new(MockReasoningClient::new(&sample_report_text()));
        let request = AnalysisRequest::new(TaskType::SimulateScenario, "ctx", vec![]).unwrap();
        let outcome = pipeline(&mock).execute(&request).await;
        assert_eq!(outcome.remote_calls, 1);
        assert!(outcome.trace.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn temperature_override_reaches_call() {
        let mock = Arc::new(MockReasoningClient::new(&sample_report_text()));
        pipeline(&mock)
            .with_temperature(0.5)
            .analyze(TaskType::DetectOutbreak, "ctx", vec![])
            .await
            .unwrap();
        assert!((mock.calls()[0].temperature - 0.5).abs() < f32::EPSILON);
    }
}
