//! services/tutor/src/adapters/http.rs
//!
//! This module contains the HTTP adapter for the tutor backend endpoint.
//! It implements the `TutorBackend` port from the `core` crate: one-shot
//! action requests as plain JSON POSTs, and the chat action as a raw POST
//! whose response body is consumed incrementally through the frame decoder.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::adapters::sse::{Frame, FrameDecoder};
use crate::config::Config;
use crate::error::ClientError;
use tutor_core::{
    domain::{ChatMessage, LessonContext},
    normalize,
    ports::{Action, ChatStream, PortError, PortResult, TutorBackend},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TutorBackend` port over HTTP.
#[derive(Clone)]
pub struct HttpBackendAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    request_timeout: Duration,
}

impl HttpBackendAdapter {
    /// Creates a new `HttpBackendAdapter` from the loaded configuration.
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Builds a POST to the backend endpoint with the credential headers
    /// attached. Every action, streaming or not, goes through here.
    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .json(body)
    }
}

/// Classifies the failure text of a non-success response or error envelope.
/// Messages that match no known fragment default to a transport failure,
/// since they arrived on a broken exchange.
fn classify_failure(message: String) -> PortError {
    match normalize::classify_backend_message(&message) {
        PortError::Unknown(text) => PortError::Transport(text),
        classified => classified,
    }
}

/// Pulls the most useful failure message out of a raw response body.
fn failure_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(normalize::message_from_envelope)
        .unwrap_or_else(|| format!("HTTP {status} from tutor backend: {body}"))
}

//=========================================================================================
// `TutorBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl TutorBackend for HttpBackendAdapter {
    /// Sends one single-shot action request and returns the parsed JSON
    /// envelope, classifying every failure shape into a `PortError`.
    async fn invoke(&self, action: Action, payload: Value) -> PortResult<Value> {
        let mut body = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(PortError::Validation(format!(
                    "action payload must be a JSON object, got {other}"
                )))
            }
        };
        body.insert("action".to_string(), Value::String(action.as_str().to_string()));

        let response = self
            .post(&Value::Object(body))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("request for '{action}' failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PortError::Transport(format!("failed to read '{action}' response: {e}")))?;

        if !status.is_success() {
            return Err(classify_failure(failure_message(status, &text)));
        }

        let value = serde_json::from_str::<Value>(&text).map_err(|e| {
            PortError::MalformedResponse(format!("'{action}' response is not valid JSON: {e}"))
        })?;

        // A 2xx body can still carry a conventional error envelope.
        if value.get("error").is_some() {
            let message = normalize::message_from_envelope(&value)
                .unwrap_or_else(|| format!("backend reported an error for '{action}'"));
            return Err(classify_failure(message));
        }

        Ok(value)
    }

    /// Starts the streaming chat exchange and returns the delta stream.
    ///
    /// A non-success status before streaming begins is read to completion as
    /// text and classified like a one-shot failure. Once the body stream is
    /// open, chunks are fed through a `FrameDecoder`; mid-stream transport
    /// errors end the stream with a `Transport` item, while malformed frames
    /// are skipped inside the decoder.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        lesson_context: Option<&LessonContext>,
    ) -> PortResult<ChatStream> {
        let body = serde_json::json!({
            "action": Action::Chat.as_str(),
            "messages": messages,
            "lessonContext": lesson_context,
        });

        let response = self
            .post(&body)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(failure_message(status, &text)));
        }

        let mut chunks = response.bytes_stream();
        let stream = try_stream! {
            let mut decoder = FrameDecoder::new();
            'read: while let Some(chunk) = chunks.next().await {
                let chunk = chunk
                    .map_err(|e| PortError::Transport(format!("chat stream read failed: {e}")))?;
                for frame in decoder.push(&chunk) {
                    match frame {
                        Frame::Delta(delta) => yield delta,
                        Frame::Done => break 'read,
                    }
                }
            }
            if let Some(tail) = decoder.finish() {
                debug!(bytes = tail.len(), "discarding unterminated chat stream tail");
            }
        };

        Ok(Box::pin(stream))
    }
}
