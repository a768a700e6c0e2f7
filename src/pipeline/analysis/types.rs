use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AnalysisError, TransportError};

/// Fallback media type when neither the caller nor the file name gives one.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ──────────────────────────────────────────────
// Request side
// ──────────────────────────────────────────────

/// The three analysis modes. Serialized as the literal selector strings
/// the reasoning service is prompted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "Detect outbreak")]
    DetectOutbreak,
    #[serde(rename = "Simulate scenario")]
    SimulateScenario,
    #[serde(rename = "Generate briefing")]
    GenerateBriefing,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        Self::DetectOutbreak,
        Self::SimulateScenario,
        Self::GenerateBriefing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DetectOutbreak => "Detect outbreak",
            Self::SimulateScenario => "Simulate scenario",
            Self::GenerateBriefing => "Generate briefing",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    /// Accepts the literal selector ("Detect outbreak") as well as
    /// kebab/snake spellings ("detect-outbreak", "detect_outbreak").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "detect outbreak" => Ok(Self::DetectOutbreak),
            "simulate scenario" => Ok(Self::SimulateScenario),
            "generate briefing" => Ok(Self::GenerateBriefing),
            _ => Err(format!(
                "unknown task '{s}' (expected detect-outbreak, simulate-scenario or generate-briefing)"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Not a base64 data URL")]
    InvalidDataUrl,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One uploaded file treated as evidence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedArtifact {
    id: Uuid,
    name: String,
    media_type: String,
    #[serde(with = "base64_payload")]
    payload: Vec<u8>,
}

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:([^;,]*)(?:;[^;,]+)*;base64,(.*)$").unwrap()
});

impl UploadedArtifact {
    /// Create an artifact from raw bytes. A blank media type is inferred
    /// from the file name extension.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, payload: Vec<u8>) -> Self {
        let name = name.into();
        let declared = media_type.into();
        let media_type = if declared.trim().is_empty() {
            guess_media_type(&name)
        } else {
            declared.trim().to_string()
        };
        Self {
            id: Uuid::new_v4(),
            name,
            media_type,
            payload,
        }
    }

    /// Create an artifact from a browser-style `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(name: impl Into<String>, data_url: &str) -> Result<Self, ArtifactError> {
        let caps = DATA_URL
            .captures(data_url.trim())
            .ok_or(ArtifactError::InvalidDataUrl)?;
        let media_type = caps.get(1).map_or("", |m| m.as_str());
        let encoded = caps.get(2).map_or("", |m| m.as_str());
        let payload = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        Ok(Self::new(name, media_type, payload))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.payload)
    }
}

/// Infer a media type from a file name, falling back to octet-stream.
pub fn guess_media_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

mod base64_payload {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// One submission: task, operator context and evidence in submission order.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    task: TaskType,
    context: String,
    artifacts: Vec<UploadedArtifact>,
}

impl AnalysisRequest {
    /// Build a request. A request with no artifacts and blank context has
    /// nothing to analyze and is rejected before any remote call.
    pub fn new(
        task: TaskType,
        context: impl Into<String>,
        artifacts: Vec<UploadedArtifact>,
    ) -> Result<Self, AnalysisError> {
        let context = context.into();
        if artifacts.is_empty() && context.trim().is_empty() {
            return Err(AnalysisError::UnknownFailure(
                "Nothing to analyze: provide operator context or at least one file".into(),
            ));
        }
        Ok(Self {
            task,
            context,
            artifacts,
        })
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn artifacts(&self) -> &[UploadedArtifact] {
        &self.artifacts
    }
}

// ──────────────────────────────────────────────
// Transport side
// ──────────────────────────────────────────────

/// One transportable part of a reasoning call.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectivePart {
    Text(String),
    /// Base64-encoded payload with its media type.
    InlineData { mime_type: String, data: String },
}

/// Fully specified remote call. Re-sent unchanged on retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningCall {
    pub system_instruction: String,
    pub parts: Vec<DirectivePart>,
    pub response_schema: serde_json::Value,
    pub temperature: f32,
}

/// Reasoning service client abstraction (allows mocking).
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Issue one remote call and return the raw response text.
    async fn generate(&self, call: &ReasoningCall) -> Result<String, TransportError>;

    fn model_name(&self) -> &str;
}

// ──────────────────────────────────────────────
// Report
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Clinical,
    Animal,
    Environmental,
    Social,
    Lab,
    Rumor,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clinical => "clinical",
            Self::Animal => "animal",
            Self::Environmental => "environmental",
            Self::Social => "social",
            Self::Lab => "lab",
            Self::Rumor => "rumor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    Low,
    Medium,
    High,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPriority {
    Immediate,
    ShortTerm,
    MediumTerm,
}

impl ActionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
        }
    }

    /// Urgency order: immediate first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Immediate => 0,
            Self::ShortTerm => 1,
            Self::MediumTerm => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub source_description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub suspected_condition: String,
    pub signal_strength: SignalStrength,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_level: RiskLevel,
    pub likely_pathogen_class: String,
    pub key_uncertainties: Vec<String>,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub time_horizon_days: u32,
    pub best_case: String,
    pub worst_case: String,
    pub most_likely_course: String,
    pub critical_triggers: Vec<String>,
}

/// One MGTC cost dimension. `score` lies in [0, 10].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub score: f64,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MgtcAnalysis {
    pub information_cost: CostAnalysis,
    pub bargaining_cost: CostAnalysis,
    pub enforcement_cost: CostAnalysis,
    pub top_governance_risks: Vec<String>,
    pub opportunities_for_improvement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternationalCoordination {
    pub key_actors: Vec<String>,
    pub coordination_challenges: Vec<String>,
    pub opportunities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub priority: ActionPriority,
    pub domain: String,
    pub action: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Briefings {
    #[serde(default)]
    pub minister_brief: String,
    #[serde(default)]
    pub public_message: String,
    #[serde(default)]
    pub partner_note: String,
}

/// Complete structured intelligence report. Every section is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub task: String,
    pub signals: Vec<Signal>,
    pub risk_assessment: RiskAssessment,
    pub scenario: Scenario,
    pub mgtc_analysis: MgtcAnalysis,
    pub international_coordination: InternationalCoordination,
    pub recommended_actions: Vec<RecommendedAction>,
    pub briefings: Briefings,
}

impl AnalysisReport {
    /// Recommended actions ordered immediate → short_term → medium_term,
    /// stable within a priority.
    pub fn actions_by_priority(&self) -> Vec<&RecommendedAction> {
        let mut actions: Vec<&RecommendedAction> = self.recommended_actions.iter().collect();
        actions.sort_by_key(|a| a.priority.rank());
        actions
    }

    /// Strongest signal strength in the report, if any signals exist.
    pub fn highest_signal_strength(&self) -> Option<SignalStrength> {
        self.signals
            .iter()
            .map(|s| s.signal_strength)
            .max_by_key(|s| s.rank())
    }
}
