use crate::client_state;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

/// Conversation of the optimize page, carried in a hidden form field.
///
/// Images are never part of the history; only text survives a round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: TurnRole::Assistant,
            content: content.into(),
        });
    }

    /// Drop the oldest turns until at most `max_turns` remain.
    ///
    /// Turns are removed in user/assistant pairs so the history never starts
    /// with an orphaned assistant reply.
    pub fn trim_to(&mut self, max_turns: usize) {
        if self.turns.len() <= max_turns {
            return;
        }

        let mut excess = self.turns.len() - max_turns;
        if excess % 2 == 1 {
            excess += 1;
        }
        let excess = excess.min(self.turns.len());
        self.turns.drain(..excess);

        if self
            .turns
            .first()
            .is_some_and(|t| t.role == TurnRole::Assistant)
        {
            self.turns.remove(0);
        }
    }

    /// Encode for a hidden field, dropping the oldest pairs until the token
    /// is at most `max_bytes` long
    pub fn encode_within(&mut self, max_bytes: usize) -> Result<String> {
        loop {
            let token = client_state::encode(self)?;
            if token.len() <= max_bytes || self.turns.is_empty() {
                return Ok(token);
            }
            self.trim_to(self.turns.len().saturating_sub(2));
            tracing::debug!(turns = self.turns.len(), "Dropped oldest turns to fit the state token");
        }
    }
}
