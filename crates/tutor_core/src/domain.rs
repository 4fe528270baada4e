//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the tutoring client.
//! These are transient, request-scoped value objects; nothing in this
//! module is persisted or mutated after it crosses the backend boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The author of a single chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation supplied to the chat operation.
/// The caller owns the sequence and appends to it between turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Descriptive context for the current lesson, passed by value into the
/// chat and question-generation calls. Never mutated by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContext {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,
    pub difficulty: String,
    pub learning_style: String,
}

/// One topic in an analyzed study material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOutline {
    pub name: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    pub difficulty: String,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub order: u32,
}

/// The result of analyzing raw study material. Created fresh per call;
/// ownership transfers entirely to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAnalysis {
    pub title: String,
    pub topics: Vec<TopicOutline>,
    pub overall_difficulty: String,
    #[serde(default)]
    pub total_estimated_minutes: u32,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub concept_map: HashMap<String, Vec<String>>,
}

/// The shape of a generated practice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    ShortAnswer,
}

/// A single generated practice question. `options` is present iff the
/// question is multiple choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: String,
    pub concept: String,
}

/// The terminal result of checking a learner's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerVerdict {
    pub is_correct: bool,
    pub feedback: String,
}
