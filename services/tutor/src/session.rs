//! services/tutor/src/session.rs
//!
//! The orchestration layer: wraps the backend port with per-operation state
//! tracking, input validation, cancellation, and failure normalization, and
//! exposes the five public tutoring operations.
//!
//! Each operation comes in two flavors. The `try_` methods return
//! `PortResult<T>` and let the caller react to the failure kind. The plain
//! methods implement the swallow-and-default policy a prototype UI wants:
//! every failure is normalized into a single notice, logged, recorded on the
//! session state, and replaced by a safe default value, so a caller never
//! needs its own error handling around them.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::state::OperationState;
use tutor_core::{
    domain::{AnswerVerdict, ChatMessage, LessonContext, Question, TopicAnalysis},
    normalize::{normalize, Notice},
    ports::{Action, PortError, PortResult, TutorBackend},
};

/// How many questions a generation call asks for when the caller does not say.
const DEFAULT_QUESTION_COUNT: usize = 10;

/// The safe verdict returned when answer checking fails for any reason.
const CHECK_ANSWER_FALLBACK: &str = "Unable to check answer";

//=========================================================================================
// The Session
//=========================================================================================

/// One tutoring session: a backend handle, the observable operation state,
/// and a cancellation token covering every in-flight call.
pub struct TutorSession {
    backend: Arc<dyn TutorBackend>,
    state: OperationState,
    cancel: CancellationToken,
}

impl TutorSession {
    pub fn new(backend: Arc<dyn TutorBackend>) -> Self {
        Self::with_cancellation(backend, CancellationToken::new())
    }

    /// Creates a session whose operations settle with `Cancelled` once the
    /// given token fires, e.g. when the surrounding view goes away.
    pub fn with_cancellation(backend: Arc<dyn TutorBackend>, cancel: CancellationToken) -> Self {
        Self {
            backend,
            state: OperationState::default(),
            cancel,
        }
    }

    /// Cancels every in-flight and future operation on this session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    // --- Observable state -------------------------------------------------

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.is_streaming()
    }

    pub fn streamed_content(&self) -> String {
        self.state.streamed_content()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.state.last_notice()
    }

    //=====================================================================================
    // Fallible Operations
    //=====================================================================================

    /// Analyzes raw study material into a topic breakdown.
    ///
    /// Empty or whitespace-only material is rejected locally; no request is
    /// dispatched for it.
    pub async fn try_analyze_material(&self, material: &str) -> PortResult<TopicAnalysis> {
        let _busy = self.state.begin_loading();

        if material.trim().is_empty() {
            return Err(PortError::Validation(
                "Please provide study material to analyze.".to_string(),
            ));
        }

        let value = self
            .dispatch(Action::AnalyzeMaterial, json!({ "material": material }))
            .await?;
        decode(value, "topic analysis")
    }

    /// Runs one streaming chat turn, returning the full concatenated reply.
    ///
    /// Every delta is appended to the session accumulator and handed to
    /// `on_delta` in arrival order before the next one is read.
    pub async fn try_chat<F>(
        &self,
        messages: &[ChatMessage],
        lesson_context: Option<&LessonContext>,
        mut on_delta: F,
    ) -> PortResult<String>
    where
        F: FnMut(&str),
    {
        let _busy = self.state.begin_streaming();

        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(PortError::Cancelled),
            opened = self.backend.stream_chat(messages, lesson_context) => opened?,
        };

        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PortError::Cancelled),
                next = stream.next() => next,
            };
            let Some(delta) = next else { break };
            let delta = delta?;
            reply.push_str(&delta);
            self.state.append_delta(&delta);
            on_delta(&delta);
        }

        Ok(reply)
    }

    /// Generates up to `count` practice questions for the lesson context.
    ///
    /// The backend returning fewer questions than requested is an accepted
    /// partial result, surfaced only through a warning; more than requested
    /// is truncated.
    pub async fn try_generate_questions(
        &self,
        lesson_context: &LessonContext,
        count: Option<usize>,
    ) -> PortResult<Vec<Question>> {
        let requested = count.unwrap_or(DEFAULT_QUESTION_COUNT);
        let _busy = self.state.begin_loading();

        let value = self
            .dispatch(
                Action::GenerateQuestion,
                json!({ "lessonContext": lesson_context, "count": requested }),
            )
            .await?;

        #[derive(Deserialize)]
        struct QuestionsEnvelope {
            #[serde(default)]
            questions: Vec<Question>,
        }
        let envelope: QuestionsEnvelope = decode(value, "question list")?;

        let mut questions = envelope.questions;
        if questions.len() < requested {
            warn!(
                requested,
                returned = questions.len(),
                "backend under-delivered questions; keeping the partial set"
            );
        }
        questions.truncate(requested);
        Ok(questions)
    }

    /// Checks a learner's answer against the expected one.
    pub async fn try_check_answer(
        &self,
        question: &str,
        options: Option<&[String]>,
        correct_answer: &str,
        user_answer: &str,
    ) -> PortResult<AnswerVerdict> {
        let _busy = self.state.begin_loading();

        let value = self
            .dispatch(
                Action::CheckAnswer,
                json!({
                    "question": {
                        "question": question,
                        "options": options,
                        "correctAnswer": correct_answer,
                        "userAnswer": user_answer,
                    }
                }),
            )
            .await?;
        decode(value, "answer verdict")
    }

    /// Summarizes the session for the given lesson context.
    pub async fn try_session_summary(&self, lesson_context: &LessonContext) -> PortResult<String> {
        let _busy = self.state.begin_loading();

        let value = self
            .dispatch(Action::GetSummary, json!({ "lessonContext": lesson_context }))
            .await?;

        #[derive(Deserialize)]
        struct SummaryEnvelope {
            #[serde(default)]
            summary: String,
        }
        let envelope: SummaryEnvelope = decode(value, "session summary")?;
        Ok(envelope.summary)
    }

    //=====================================================================================
    // Defaulting Operations (swallow-and-default policy)
    //=====================================================================================

    /// Like `try_analyze_material`, but failures become `None`.
    pub async fn analyze_material(&self, material: &str) -> Option<TopicAnalysis> {
        match self.try_analyze_material(material).await {
            Ok(analysis) => Some(analysis),
            Err(error) => {
                self.report(&error);
                None
            }
        }
    }

    /// Like `try_chat`, but a failed stream settles with whatever text was
    /// accumulated before the failure.
    pub async fn chat<F>(
        &self,
        messages: &[ChatMessage],
        lesson_context: Option<&LessonContext>,
        on_delta: F,
    ) -> String
    where
        F: FnMut(&str),
    {
        match self.try_chat(messages, lesson_context, on_delta).await {
            Ok(reply) => reply,
            Err(error) => {
                self.report(&error);
                self.state.streamed_content()
            }
        }
    }

    /// Like `try_generate_questions`, but failures become an empty list.
    pub async fn generate_questions(
        &self,
        lesson_context: &LessonContext,
        count: Option<usize>,
    ) -> Vec<Question> {
        match self.try_generate_questions(lesson_context, count).await {
            Ok(questions) => questions,
            Err(error) => {
                self.report(&error);
                Vec::new()
            }
        }
    }

    /// Like `try_check_answer`, but failures become a safe "not correct"
    /// verdict instead of an error.
    pub async fn check_answer(
        &self,
        question: &str,
        options: Option<&[String]>,
        correct_answer: &str,
        user_answer: &str,
    ) -> AnswerVerdict {
        match self
            .try_check_answer(question, options, correct_answer, user_answer)
            .await
        {
            Ok(verdict) => verdict,
            Err(error) => {
                self.report(&error);
                AnswerVerdict {
                    is_correct: false,
                    feedback: CHECK_ANSWER_FALLBACK.to_string(),
                }
            }
        }
    }

    /// Like `try_session_summary`, but failures become an empty summary.
    pub async fn session_summary(&self, lesson_context: &LessonContext) -> String {
        match self.try_session_summary(lesson_context).await {
            Ok(summary) => summary,
            Err(error) => {
                self.report(&error);
                String::new()
            }
        }
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    /// One-shot dispatch with cancellation racing the round trip.
    async fn dispatch(&self, action: Action, payload: Value) -> PortResult<Value> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PortError::Cancelled),
            result = self.backend.invoke(action, payload) => result,
        }
    }

    /// The failure side channel: normalize once, log once, record once.
    fn report(&self, error: &PortError) {
        let notice = normalize(error);
        warn!(kind = ?notice.kind, "{}", notice.message);
        self.state.record_notice(notice);
    }
}

/// Decodes a response envelope into its typed form.
fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> PortResult<T> {
    serde_json::from_value(value).map_err(|e| {
        PortError::MalformedResponse(format!("{what} did not match the expected shape: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tutor_core::normalize::ErrorKind;
    use tutor_core::ports::ChatStream;

    /// A hand-rolled backend stub: records every one-shot invocation and
    /// replays canned results.
    struct StubBackend {
        calls: Mutex<Vec<Action>>,
        response: PortResult<Value>,
        deltas: Vec<PortResult<String>>,
    }

    impl StubBackend {
        fn returning(response: PortResult<Value>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response,
                deltas: Vec::new(),
            }
        }

        fn streaming(deltas: Vec<PortResult<String>>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                response: Ok(Value::Null),
                deltas,
            }
        }

        fn call_count(&self) -> usize {
            match self.calls.lock() {
                Ok(calls) => calls.len(),
                Err(poisoned) => poisoned.into_inner().len(),
            }
        }
    }

    #[async_trait]
    impl TutorBackend for StubBackend {
        async fn invoke(&self, action: Action, _payload: Value) -> PortResult<Value> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(action);
            }
            self.response.clone()
        }

        async fn stream_chat(
            &self,
            _messages: &[ChatMessage],
            _lesson_context: Option<&LessonContext>,
        ) -> PortResult<ChatStream> {
            Ok(Box::pin(futures::stream::iter(self.deltas.clone())))
        }
    }

    fn session_with(backend: StubBackend) -> (TutorSession, Arc<StubBackend>) {
        let backend = Arc::new(backend);
        (TutorSession::new(backend.clone()), backend)
    }

    fn algebra_context() -> LessonContext {
        LessonContext {
            topic: "Algebra".to_string(),
            subtopic: None,
            difficulty: "easy".to_string(),
            learning_style: "visual".to_string(),
        }
    }

    fn question_json(name: &str) -> Value {
        json!({
            "type": "short_answer",
            "question": format!("What is {name}?"),
            "correctAnswer": "x",
            "explanation": "because",
            "difficulty": "easy",
            "concept": name,
        })
    }

    #[tokio::test]
    async fn check_answer_failure_yields_safe_default_verdict() {
        let (session, _) = session_with(StubBackend::returning(Err(PortError::Transport(
            "connection reset".to_string(),
        ))));

        let verdict = session.check_answer("Q?", None, "x", "y").await;
        assert_eq!(
            verdict,
            AnswerVerdict {
                is_correct: false,
                feedback: "Unable to check answer".to_string(),
            }
        );
        assert!(session.last_notice().is_some());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn generate_questions_never_exceeds_requested_count() {
        let overfull: Vec<Value> = (0..12).map(|i| question_json(&format!("q{i}"))).collect();
        let (session, _) = session_with(StubBackend::returning(Ok(
            json!({ "questions": overfull }),
        )));

        let questions = session
            .generate_questions(&algebra_context(), Some(5))
            .await;
        assert_eq!(questions.len(), 5);
    }

    #[tokio::test]
    async fn under_delivered_questions_are_kept_as_partial_result() {
        let three: Vec<Value> = (0..3).map(|i| question_json(&format!("q{i}"))).collect();
        let (session, _) =
            session_with(StubBackend::returning(Ok(json!({ "questions": three }))));

        let questions = session
            .generate_questions(&algebra_context(), Some(5))
            .await;
        assert_eq!(questions.len(), 3);
        // Partial delivery is not a failure; no notice is recorded.
        assert!(session.last_notice().is_none());
    }

    #[tokio::test]
    async fn chat_delivers_deltas_in_order_and_accumulates() {
        let (session, _) = session_with(StubBackend::streaming(vec![
            Ok("A".to_string()),
            Ok("B".to_string()),
        ]));

        let seen = Mutex::new(Vec::new());
        let reply = session
            .chat(&[ChatMessage::user("hi")], None, |delta| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(delta.to_string());
                }
            })
            .await;

        assert_eq!(reply, "AB");
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(session.streamed_content(), "AB");
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn failed_chat_settles_with_partial_text() {
        let (session, _) = session_with(StubBackend::streaming(vec![
            Ok("partial".to_string()),
            Err(PortError::Transport("stream died".to_string())),
        ]));

        let reply = session.chat(&[ChatMessage::user("hi")], None, |_| {}).await;
        assert_eq!(reply, "partial");
        assert!(session.last_notice().is_some());
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn busy_flags_reset_after_success_and_failure() {
        let (ok_session, _) = session_with(StubBackend::returning(Ok(json!({ "summary": "s" }))));
        ok_session.session_summary(&algebra_context()).await;
        assert!(!ok_session.is_loading());

        let (err_session, _) = session_with(StubBackend::returning(Err(PortError::Unknown(
            "boom".to_string(),
        ))));
        err_session.session_summary(&algebra_context()).await;
        err_session.session_summary(&algebra_context()).await;
        assert!(!err_session.is_loading());
    }

    #[tokio::test]
    async fn blank_material_is_rejected_without_a_backend_call() {
        let (session, backend) = session_with(StubBackend::returning(Ok(json!({}))));

        assert!(session.analyze_material("").await.is_none());
        assert!(session.analyze_material("   ").await.is_none());

        assert_eq!(backend.call_count(), 0);
        let notice = session.last_notice().expect("validation notice recorded");
        assert_eq!(notice.kind, ErrorKind::Validation);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn analyze_material_decodes_a_full_topic_analysis() {
        let (session, _) = session_with(StubBackend::returning(Ok(json!({
            "title": "Photosynthesis",
            "topics": [{
                "name": "Photosynthesis",
                "subtopics": ["Light reactions"],
                "keyConcepts": ["chlorophyll"],
                "difficulty": "medium",
                "estimatedMinutes": 15,
                "order": 1,
            }],
            "overallDifficulty": "medium",
            "totalEstimatedMinutes": 15,
            "learningObjectives": ["Explain the light reactions"],
            "prerequisites": [],
            "conceptMap": { "chlorophyll": ["light reactions"] },
        }))));

        let analysis = session
            .analyze_material("Photosynthesis converts light into chemical energy.")
            .await
            .expect("analysis succeeds");
        assert_eq!(analysis.topics[0].name, "Photosynthesis");
        assert_eq!(analysis.total_estimated_minutes, 15);
    }

    #[tokio::test]
    async fn cancelled_session_settles_operations_with_cancelled() {
        let (session, backend) = session_with(StubBackend::returning(Ok(json!({}))));
        session.cancel();

        let result = session.try_check_answer("Q?", None, "x", "y").await;
        assert!(matches!(result, Err(PortError::Cancelled)));
        assert_eq!(backend.call_count(), 0);
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn configuration_failure_is_classified_for_the_notice() {
        let (session, _) = session_with(StubBackend::returning(Err(
            PortError::ServiceConfiguration("GEMINI_API_KEY is not configured".to_string()),
        )));

        assert!(session
            .analyze_material("some perfectly good material")
            .await
            .is_none());
        let notice = session.last_notice().expect("notice recorded");
        assert_eq!(notice.kind, ErrorKind::ServiceConfiguration);
    }
}
