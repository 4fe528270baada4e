//! crates/tutor_core/src/normalize.rs
//!
//! Converts arbitrary raw failures into a single, displayable notice.
//!
//! The backend reports failures in several shapes: a bare string, an envelope
//! with a top-level `error` or `message` field, or a wrapped transport error
//! whose useful text hides inside `context.body` / `context.response`. This
//! module probes those shapes in a fixed priority order, then runs one
//! refinement pass that maps known message fragments onto friendlier,
//! categorized notices. Nothing in here can fail: every input produces a
//! displayable string.

use serde_json::Value;

use crate::ports::PortError;

/// The user-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    ServiceConfiguration,
    UpstreamService,
    MalformedResponse,
    Cancelled,
    Unknown,
}

/// One displayable failure notice: the classification plus the message a UI
/// should show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: ErrorKind,
    pub message: String,
}

impl Notice {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

const MSG_NOT_CONFIGURED: &str =
    "The AI service is not configured. Please contact support.";
const MSG_UPSTREAM: &str = "The AI service had a problem. Please try again.";
const MSG_BAD_RESPONSE: &str =
    "Failed to process the AI response. Please try again.";
const MSG_SERVER: &str =
    "The AI service is temporarily unavailable. Please try again later.";
const MSG_UNKNOWN: &str = "An unknown error occurred. Please try again.";
const MSG_CANCELLED: &str = "The operation was cancelled.";

//=========================================================================================
// Base Message Extraction
//=========================================================================================

/// Extracts the base failure message from a raw error envelope.
///
/// Probing order (first match wins):
/// 1. a direct top-level `message` field,
/// 2. `context.body` or `context.response` (string or object), JSON-parsed
///    and probed for `error` then `message`,
/// 3. a top-level `error` field (string, or object with a `message`),
/// 4. the envelope itself, if it is a bare string.
pub fn message_from_envelope(raw: &Value) -> Option<String> {
    if let Some(message) = raw.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }

    if let Some(context) = raw.get("context") {
        for key in ["body", "response"] {
            let Some(inner) = context.get(key) else {
                continue;
            };
            // A string body is itself JSON more often than not; an object
            // body is already parsed for us.
            let parsed = match inner {
                Value::String(text) => serde_json::from_str::<Value>(text).ok(),
                Value::Object(_) => Some(inner.clone()),
                _ => None,
            };
            if let Some(parsed) = parsed {
                if let Some(message) =
                    nested_text(&parsed, "error").or_else(|| nested_text(&parsed, "message"))
                {
                    return Some(message);
                }
            }
        }
    }

    if let Some(message) = raw.get("error").and_then(|error| nested_value_text(error)) {
        return Some(message);
    }

    if let Value::String(text) = raw {
        return Some(text.clone());
    }

    None
}

/// Reads `field` out of `value`, accepting either a plain string or an
/// object carrying its own `message`.
fn nested_text(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(nested_value_text)
}

fn nested_value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(_) => value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

//=========================================================================================
// Refinement Pass
//=========================================================================================

/// Pattern-matches a base message against known fragments and, on a hit,
/// returns the friendlier categorized notice. `None` means the message
/// carried no recognizable fragment and should pass through unchanged.
pub fn refine(base: &str) -> Option<Notice> {
    let lowered = base.to_lowercase();

    if lowered.contains("not configured")
        || lowered.contains("api key")
        || lowered.contains("configuration")
    {
        return Some(Notice::new(ErrorKind::ServiceConfiguration, MSG_NOT_CONFIGURED));
    }
    if lowered.contains("gemini")
        || lowered.contains("api error")
        || lowered.contains("overloaded")
        || lowered.contains("upstream")
    {
        return Some(Notice::new(ErrorKind::UpstreamService, MSG_UPSTREAM));
    }
    if lowered.contains("json")
        || lowered.contains("parse")
        || lowered.contains("unexpected token")
    {
        return Some(Notice::new(ErrorKind::MalformedResponse, MSG_BAD_RESPONSE));
    }
    if lowered.contains("internal server")
        || lowered.contains("500")
        || lowered.contains("502")
        || lowered.contains("503")
    {
        return Some(Notice::new(ErrorKind::Transport, MSG_SERVER));
    }

    None
}

/// Classifies a raw backend failure message into the matching `PortError`
/// variant, preserving the original text for logging.
pub fn classify_backend_message(message: &str) -> PortError {
    match refine(message).map(|notice| notice.kind) {
        Some(ErrorKind::ServiceConfiguration) => {
            PortError::ServiceConfiguration(message.to_string())
        }
        Some(ErrorKind::UpstreamService) => PortError::UpstreamService(message.to_string()),
        Some(ErrorKind::MalformedResponse) => PortError::MalformedResponse(message.to_string()),
        Some(ErrorKind::Transport) => PortError::Transport(message.to_string()),
        _ => PortError::Unknown(message.to_string()),
    }
}

//=========================================================================================
// Normalization Entry Point
//=========================================================================================

/// Produces the single displayable notice for a settled failure.
///
/// Validation and cancellation keep their own wording; every other kind runs
/// through the refinement pass, falling back to the raw message (or a generic
/// unknown-error message when even that is empty).
pub fn normalize(error: &PortError) -> Notice {
    match error {
        PortError::Validation(message) => Notice::new(ErrorKind::Validation, message.clone()),
        PortError::Cancelled => Notice::new(ErrorKind::Cancelled, MSG_CANCELLED),
        PortError::Transport(message)
        | PortError::ServiceConfiguration(message)
        | PortError::UpstreamService(message)
        | PortError::MalformedResponse(message)
        | PortError::Unknown(message) => refine(message).unwrap_or_else(|| {
            if message.trim().is_empty() {
                Notice::new(ErrorKind::Unknown, MSG_UNKNOWN)
            } else {
                Notice::new(fallback_kind(error), message.clone())
            }
        }),
    }
}

fn fallback_kind(error: &PortError) -> ErrorKind {
    match error {
        PortError::Validation(_) => ErrorKind::Validation,
        PortError::Transport(_) => ErrorKind::Transport,
        PortError::ServiceConfiguration(_) => ErrorKind::ServiceConfiguration,
        PortError::UpstreamService(_) => ErrorKind::UpstreamService,
        PortError::MalformedResponse(_) => ErrorKind::MalformedResponse,
        PortError::Cancelled => ErrorKind::Cancelled,
        PortError::Unknown(_) => ErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn direct_message_field_wins() {
        let raw = json!({ "message": "top level", "error": "ignored" });
        assert_eq!(message_from_envelope(&raw).as_deref(), Some("top level"));
    }

    #[test]
    fn context_body_string_is_parsed_as_json() {
        let raw = json!({
            "context": { "body": r#"{"error":"GEMINI_API_KEY is not configured"}"# }
        });
        assert_eq!(
            message_from_envelope(&raw).as_deref(),
            Some("GEMINI_API_KEY is not configured")
        );
    }

    #[test]
    fn context_response_object_message_is_found() {
        let raw = json!({
            "context": { "response": { "message": "from response" } }
        });
        assert_eq!(message_from_envelope(&raw).as_deref(), Some("from response"));
    }

    #[test]
    fn error_field_accepts_string_or_object() {
        let string_form = json!({ "error": "plain" });
        assert_eq!(message_from_envelope(&string_form).as_deref(), Some("plain"));

        let object_form = json!({ "error": { "message": "wrapped" } });
        assert_eq!(message_from_envelope(&object_form).as_deref(), Some("wrapped"));
    }

    #[test]
    fn bare_string_envelope_is_used_directly() {
        let raw = Value::String("it broke".to_string());
        assert_eq!(message_from_envelope(&raw).as_deref(), Some("it broke"));
    }

    #[test]
    fn unrecognized_envelope_yields_none() {
        assert_eq!(message_from_envelope(&json!({ "status": 42 })), None);
        assert_eq!(message_from_envelope(&json!(null)), None);
    }

    #[test]
    fn refine_categorizes_known_fragments() {
        let cases = [
            ("GEMINI_API_KEY is not configured", ErrorKind::ServiceConfiguration),
            ("Gemini API error: 429", ErrorKind::UpstreamService),
            ("Unexpected token < in JSON at position 0", ErrorKind::MalformedResponse),
            ("Internal Server Error", ErrorKind::Transport),
        ];
        for (message, expected) in cases {
            assert_eq!(refine(message).unwrap().kind, expected, "{message}");
        }
    }

    #[test]
    fn unmatched_message_passes_through_unchanged() {
        let error = PortError::Unknown("something oddly specific".to_string());
        let notice = normalize(&error);
        assert_eq!(notice.kind, ErrorKind::Unknown);
        assert_eq!(notice.message, "something oddly specific");
    }

    #[test]
    fn empty_message_falls_back_to_generic_text() {
        let notice = normalize(&PortError::Transport("  ".to_string()));
        assert_eq!(notice.kind, ErrorKind::Unknown);
        assert!(!notice.message.trim().is_empty());
    }

    #[test]
    fn cancellation_keeps_its_own_wording() {
        let notice = normalize(&PortError::Cancelled);
        assert_eq!(notice.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn classify_picks_the_matching_variant() {
        assert!(matches!(
            classify_backend_message("GEMINI_API_KEY missing from configuration"),
            PortError::ServiceConfiguration(_)
        ));
        assert!(matches!(
            classify_backend_message("Gemini API error: model overloaded"),
            PortError::UpstreamService(_)
        ));
        assert!(matches!(
            classify_backend_message("totally novel failure"),
            PortError::Unknown(_)
        ));
    }
}
