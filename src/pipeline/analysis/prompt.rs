use super::encoder::EncodedArtifact;
use super::sanitize::sanitize_context;
use super::types::{DirectivePart, TaskType};

pub const PERSONA_INSTRUCTION: &str = r#"
You are GovBrain, a biosecurity intelligence analyst supporting public health
governance. You turn field evidence (clinical notes, lab sheets, animal and
environmental reports, social media rumors, images) into a structured outbreak
intelligence report, and you assess governance through the MGTC lens:
information cost, bargaining cost and enforcement cost.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Reason qualitatively. Do NOT produce epidemiological models, case-fatality
   estimates or other quantitative projections beyond the requested scores.
2. ALWAYS separate what the evidence states from what you infer. Name inferred
   assumptions as assumptions.
3. When evidence is thin, say so in key_uncertainties instead of guessing.
4. Output EXACTLY ONE JSON object matching the response schema and nothing else:
   no prose, no Markdown, no code fences.
5. Fill EVERY section of the schema. Sections outside the task focus get empty
   strings or empty arrays, never omitted.
6. MGTC scores are numbers from 0 (negligible) to 10 (severe).
"#;

pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No additional context provided by the user.";

pub const NO_FILES_PLACEHOLDER: &str = "No files uploaded.";

const INSTRUCTIONS_BOILERPLATE: &str = "\
Analyze the user description and every file above (including the attached binary parts). \
Return a single JSON object that follows the response schema exactly. \
Populate every top-level section; use empty strings or empty arrays for sections \
that the evidence or the task focus does not cover.";

/// Task-specific emphasis appended to the instructions section.
pub fn emphasis_clause(task: TaskType) -> &'static str {
    match task {
        TaskType::DetectOutbreak => {
            "Focus on signals and risk assessment: identify every outbreak signal, its strength and the overall risk level."
        }
        TaskType::SimulateScenario => {
            "Focus on scenario projection and governance costs: best, worst and most likely courses, critical triggers and the MGTC analysis."
        }
        TaskType::GenerateBriefing => {
            "Focus on briefings and recommended actions: a minister brief, a public message, a partner note and prioritized actions."
        }
    }
}

/// Build the directive document. Section order is fixed:
/// TASK, USER_DESCRIPTION, FILES_CONTENT, INSTRUCTIONS.
pub fn build_directive(task: TaskType, context: &str, files: &[EncodedArtifact]) -> String {
    let context = sanitize_context(context);
    let description = if context.is_empty() {
        NO_DESCRIPTION_PLACEHOLDER.to_string()
    } else {
        context
    };

    let files_content = if files.is_empty() {
        NO_FILES_PLACEHOLDER.to_string()
    } else {
        files
            .iter()
            .map(|f| {
                format!(
                    "--- START FILE: {name} ---\n{body}\n--- END FILE: {name} ---",
                    name = f.name,
                    body = f.fragment
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "TASK: {task}\n\n\
USER_DESCRIPTION:\n{description}\n\n\
FILES_CONTENT:\n{files_content}\n\n\
INSTRUCTIONS:\n{INSTRUCTIONS_BOILERPLATE}\n{emphasis}\n",
        task = task.as_str(),
        emphasis = emphasis_clause(task),
    )
}

/// Transport parts for one call: the directive first, then one binary part
/// per artifact in submission order.
pub fn build_parts(directive: String, files: &[EncodedArtifact]) -> Vec<DirectivePart> {
    std::iter::once(DirectivePart::Text(directive))
        .chain(files.iter().map(|f| f.part.clone()))
        .collect()
}
