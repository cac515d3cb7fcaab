use crate::model::CalendarDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "Job")]
    pub description: String,
    #[serde(rename = "Done", default)]
    pub done: bool,
}

impl Task {
    pub fn new<D: Into<String>>(description: D) -> Self {
        Self {
            description: description.into(),
            done: false,
        }
    }

    pub fn status_label(&self) -> &'static str {
        if self.done { "Done" } else { "TODO" }
    }
}

/// Identifies the ordered task list of one subscriber on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    #[serde(rename = "ChatID")]
    pub chat_id: i64,
    #[serde(rename = "Date")]
    pub date: CalendarDate,
}

impl TaskKey {
    pub fn new(chat_id: i64, date: CalendarDate) -> Self {
        Self { chat_id, date }
    }
}
