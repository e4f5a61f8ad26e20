//! Pure turn-state classification.
//!
//! The debate has no stored "whose turn is it" flag. The next required step
//! is derived entirely from the session's fixed role and the sender of the
//! last conversational message, so the decision is a pure function that can
//! be tested without storage or network.

use crate::storage::SenderType;

/// Which side of the debate the human argues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The human defends the topic; the AI challenges.
    Apologist,
    /// The human challenges; the AI defends.
    Skeptic,
}

impl Role {
    /// Derive the role from a session's stored flag.
    pub fn from_session(is_user_apologist: bool) -> Self {
        if is_user_apologist {
            Role::Apologist
        } else {
            Role::Skeptic
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Apologist => write!(f, "apologist"),
            Role::Skeptic => write!(f, "skeptic"),
        }
    }
}

/// The next step the orchestrator must take for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Generate the opening challenge that introduces the topic.
    OpeningChallenge,
    /// Wait for the human; no generation happens.
    AwaitUser,
    /// Generate a follow-up challenge to the human's reply.
    FollowUpChallenge,
    /// Generate a defense of the topic against the human's question.
    DefendReply,
}

/// Classify the next step from the role and the last conversational sender.
///
/// Legacy `EXPERT` rows count as AI output here; they never put the
/// conversation into a state where the orchestrator would generate again.
pub fn classify(role: Role, last: Option<SenderType>) -> NextStep {
    match (role, last) {
        (Role::Apologist, None) => NextStep::OpeningChallenge,
        (Role::Apologist, Some(SenderType::User)) => NextStep::FollowUpChallenge,
        (Role::Apologist, Some(_)) => NextStep::AwaitUser,
        (Role::Skeptic, None) => NextStep::AwaitUser,
        (Role::Skeptic, Some(SenderType::User)) => NextStep::DefendReply,
        (Role::Skeptic, Some(_)) => NextStep::AwaitUser,
    }
}
