//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the tutoring client's core.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete transport used to reach the backend.

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

use crate::domain::{ChatMessage, LessonContext};

//=========================================================================================
// Actions
//=========================================================================================

/// The string tag identifying which backend operation a JSON request invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AnalyzeMaterial,
    Chat,
    GenerateQuestion,
    CheckAnswer,
    GetSummary,
}

impl Action {
    /// The wire tag placed in the `action` field of the request body.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AnalyzeMaterial => "analyze_material",
            Action::Chat => "chat",
            Action::GenerateQuestion => "generate_question",
            Action::CheckAnswer => "check_answer",
            Action::GetSummary => "get_summary",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// The variants mirror the failure kinds a caller can meaningfully react to,
/// abstracting away the concrete errors of the underlying transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    /// Caller-supplied input failed a local precondition; never reached the network.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Network failure, non-success HTTP status, or an unreadable response body.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The backend reported a missing or invalid service configuration.
    #[error("Service not configured: {0}")]
    ServiceConfiguration(String),
    /// The backend reported a transient failure from the upstream AI provider.
    #[error("Upstream AI service error: {0}")]
    UpstreamService(String),
    /// A successful response carried a body that could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// The operation was cancelled before it settled.
    #[error("Operation cancelled")]
    Cancelled,
    /// A catch-all for failures that fit no other classification.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The incremental text deltas of one streaming chat reply, in arrival order.
pub type ChatStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Sends one single-shot JSON action request and returns the parsed
    /// response envelope. Used by every operation except chat.
    async fn invoke(&self, action: Action, payload: Value) -> PortResult<Value>;

    /// Starts a streaming chat completion and returns the delta stream.
    /// Deltas are yielded in the exact order they are extracted from the
    /// wire frames; the stream ends at the terminator frame or when the
    /// response body is exhausted.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        lesson_context: Option<&LessonContext>,
    ) -> PortResult<ChatStream>;
}
