//! Artifact encoding: one uploaded file → one binary transport part plus the
//! text fragment the directive document shows for it.
//!
//! Text extraction is a pure function of `(bytes, declared media type)`.
//! Only plain text, CSV and JSON are ever decoded; every other media type gets
//! a placeholder marker and travels as binary only.

use futures_util::future::join_all;

use super::sanitize::sanitize_fragment;
use super::types::{DirectivePart, UploadedArtifact};

/// Media types whose payload is decoded and inlined into the directive.
pub const TEXTUAL_MEDIA_TYPES: &[&str] = &["text/plain", "text/csv", "application/json"];

/// Encoding result for a single artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedArtifact {
    /// Display name of the originating artifact (used for fragment fences).
    pub name: String,
    /// Extracted text or a placeholder marker.
    pub fragment: String,
    /// Whether `fragment` holds extracted text rather than a placeholder.
    pub extracted: bool,
    /// Binary transport part carrying the full payload.
    pub part: DirectivePart,
}

/// Whether a declared media type is one we decode inline.
/// Parameters (`; charset=...`) are ignored and comparison is case-insensitive.
pub fn is_textual_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    TEXTUAL_MEDIA_TYPES.contains(&essence.as_str())
}

/// Decode a payload to text when its declared type is textual.
///
/// Returns `None` for non-textual media and for payloads that are not valid
/// UTF-8. Never attempts extraction for non-text media.
pub fn extract_text(payload: &[u8], media_type: &str) -> Option<String> {
    if !is_textual_media_type(media_type) {
        return None;
    }
    let bytes = payload.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(payload);
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn placeholder_marker(media_type: &str) -> String {
    format!("[Content of type {media_type} is attached as a separate binary part]")
}

fn binary_part(artifact: &UploadedArtifact) -> DirectivePart {
    DirectivePart::InlineData {
        mime_type: artifact.media_type().to_string(),
        data: artifact.payload_base64(),
    }
}

/// Encode one artifact. Pure and infallible: decode failures degrade to
/// the placeholder marker.
pub fn encode_artifact(artifact: &UploadedArtifact) -> EncodedArtifact {
    let (fragment, extracted) = match extract_text(artifact.payload(), artifact.media_type()) {
        Some(text) => (sanitize_fragment(&text, artifact.name()), true),
        None => {
            if is_textual_media_type(artifact.media_type()) {
                tracing::warn!(
                    artifact = %artifact.name(),
                    media_type = %artifact.media_type(),
                    "Text artifact is not valid UTF-8, sending as binary only"
                );
            }
            (placeholder_marker(artifact.media_type()), false)
        }
    };

    EncodedArtifact {
        name: artifact.name().to_string(),
        fragment,
        extracted,
        part: binary_part(artifact),
    }
}

/// Encode all artifacts of one request concurrently on the blocking pool.
///
/// Results come back in submission order regardless of completion order.
/// A task that panics degrades its artifact to a placeholder and does not
/// affect the others.
pub async fn encode_all(artifacts: &[UploadedArtifact]) -> Vec<EncodedArtifact> {
    let handles: Vec<_> = artifacts
        .iter()
        .cloned()
        .map(|artifact| tokio::task::spawn_blocking(move || encode_artifact(&artifact)))
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .zip(artifacts)
        .map(|(joined, artifact)| match joined {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(
                    artifact = %artifact.name(),
                    error = %e,
                    "Artifact encoding task failed, using placeholder"
                );
                EncodedArtifact {
                    name: artifact.name().to_string(),
                    fragment: placeholder_marker(artifact.media_type()),
                    extracted: false,
                    part: binary_part(artifact),
                }
            }
        })
        .collect()
}
