//! Text-generation backends for the two debate roles.
//!
//! The challenger backend produces skeptical openings and follow-up
//! questions; the defender backend produces apologetic responses, including
//! the expert-coaching variant. Both are remote HTTP services hidden behind
//! capability traits so the orchestrator never depends on a concrete wire
//! format.

mod challenger;
mod defender;

pub use challenger::ChallengerClient;
pub use defender::DefenderClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GeneratorResult;
use crate::storage::{DebateMessage, SenderType};

/// Message in a role-tagged chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Map a session's message log onto chat roles, preserving creation order.
///
/// `USER` rows become `user` turns; everything else (AI, plus any legacy
/// EXPERT rows) maps to `assistant`. The sequence is never re-sorted or
/// deduplicated.
pub fn chat_history(history: &[DebateMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|msg| match msg.sender_type {
            SenderType::User => ChatMessage::user(&msg.content),
            _ => ChatMessage::assistant(&msg.content),
        })
        .collect()
}

/// Generator of skeptical content: debate openings and follow-up questions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Challenger: Send + Sync {
    /// Generate the opening challenge that introduces a topic.
    async fn generate_opening(&self, topic: &str) -> GeneratorResult<String>;

    /// Generate a follow-up question probing the user's reply to the prior
    /// challenge.
    async fn generate_follow_up(
        &self,
        prior_question: &str,
        user_reply: &str,
        topic: &str,
    ) -> GeneratorResult<String>;

    /// Probe the backend with a minimal generation.
    async fn health_check(&self) -> bool;
}

/// Generator of defensive content: apologetic replies and expert coaching.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Defender: Send + Sync {
    /// Generate an apologetic response to a skeptical question, with the
    /// full ordered history as context.
    async fn generate_response(
        &self,
        question: &str,
        history: &[DebateMessage],
        topic: &str,
    ) -> GeneratorResult<String>;

    /// Generate the ideal expert response to a skeptical question given the
    /// user's own attempt.
    async fn generate_expert_response(
        &self,
        question: &str,
        user_attempt: &str,
        history: &[DebateMessage],
        topic: &str,
    ) -> GeneratorResult<String>;

    /// Probe the backend with a minimal generation.
    async fn health_check(&self) -> bool;
}
