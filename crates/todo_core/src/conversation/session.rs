use crate::error::AppError;
use crate::keyboard::SelectionKeyboard;
use crate::model::CalendarDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingJobText,
    AwaitingDateForAdd,
    AwaitingDateForShow,
    AwaitingDateForDone,
    AwaitingKeySelection,
}

/// Draft task built across the `/newitem` turns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub description: String,
    pub date: Option<CalendarDate>,
}

/// Who shares one state machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationScope {
    /// One state, draft and keyboard for every chat. A second chat's message
    /// continues whatever operation the first chat started.
    #[default]
    Global,
    /// Each chat gets its own state, draft and keyboard.
    PerChat,
}

impl ConversationScope {
    /// Key of the session that serves `chat_id`.
    pub fn session_key(self, chat_id: i64) -> Option<i64> {
        match self {
            Self::Global => None,
            Self::PerChat => Some(chat_id),
        }
    }
}

impl FromStr for ConversationScope {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "global" => Ok(Self::Global),
            "per_chat" | "chat" => Ok(Self::PerChat),
            other => Err(AppError::invalid_input(format!(
                "unknown conversation scope: {other}"
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    pub state: ConversationState,
    pub pending: PendingItem,
    pub keyboard: SelectionKeyboard,
}

impl Session {
    pub fn is_idle(&self) -> bool {
        self.state == ConversationState::Idle
    }

    /// Drops the in-flight operation: back to idle, draft discarded, keyboard hidden.
    pub fn reset(&mut self) {
        self.keyboard.hide();
        self.pending = PendingItem::default();
        self.state = ConversationState::Idle;
    }
}
