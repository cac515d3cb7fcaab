//! The state machine behind every chat reply.

pub mod replies;
mod session;

pub use session::{ConversationScope, ConversationState, PendingItem, Session};

use crate::error::AppError;
use crate::keyboard::KeyboardDirective;
use crate::model::CalendarDate;
use crate::reminder::Reminders;
use crate::storage::Store;
use crate::task_api;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    NewItem,
    Items,
    Cancel,
    Subscribe,
    Unsubscribe,
    Done,
    Unknown(String),
}

impl Command {
    pub fn parse(name: &str) -> Self {
        match name {
            "start" => Self::Start,
            "newitem" => Self::NewItem,
            "items" => Self::Items,
            "cancel" => Self::Cancel,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "done" => Self::Done,
            other => Self::Unknown(other.to_string()),
        }
    }
}

pub struct Conversation {
    store: Arc<dyn Store>,
    reminders: Reminders,
    scope: ConversationScope,
    sessions: HashMap<Option<i64>, Session>,
}

impl Conversation {
    pub fn new(store: Arc<dyn Store>, reminders: Reminders, scope: ConversationScope) -> Self {
        Self {
            store,
            reminders,
            scope,
            sessions: HashMap::new(),
        }
    }

    pub fn scope(&self) -> ConversationScope {
        self.scope
    }

    pub fn reminders(&self) -> &Reminders {
        &self.reminders
    }

    pub fn state(&self, chat_id: i64) -> ConversationState {
        self.session(chat_id)
            .map(|session| session.state)
            .unwrap_or_default()
    }

    pub fn pending(&self, chat_id: i64) -> Option<&PendingItem> {
        self.session(chat_id).map(|session| &session.pending)
    }

    fn session(&self, chat_id: i64) -> Option<&Session> {
        self.sessions.get(&self.scope.session_key(chat_id))
    }

    /// Restarts reminder units for every persisted subscriber.
    pub fn restore_subscriptions(&mut self) -> Result<usize, AppError> {
        let subscribers = self.store.subscribers()?;
        let mut started = 0;
        for chat_id in subscribers {
            if self.reminders.start(chat_id) {
                started += 1;
            }
        }
        info!(count = started, "subscriptions restored");
        Ok(started)
    }

    pub fn handle_command(&mut self, name: &str, chat_id: i64) -> String {
        let command = Command::parse(name);
        debug!(chat_id, ?command, "command received");

        let key = self.scope.session_key(chat_id);
        let session = self.sessions.entry(key).or_default();
        if !session.is_idle() {
            return match command {
                Command::Cancel => {
                    session.reset();
                    replies::CANCELLED.to_string()
                }
                _ => replies::BUSY.to_string(),
            };
        }

        match command {
            Command::Start => replies::START.to_string(),
            Command::NewItem => {
                session.state = ConversationState::AwaitingJobText;
                replies::ENTER_JOB.to_string()
            }
            Command::Items => {
                session.state = ConversationState::AwaitingDateForShow;
                replies::ENTER_SHOW_DATE.to_string()
            }
            Command::Done => {
                session.state = ConversationState::AwaitingDateForDone;
                replies::ENTER_DONE_DATE.to_string()
            }
            Command::Cancel => replies::IDLE_ALREADY.to_string(),
            Command::Subscribe => self.subscribe(chat_id),
            Command::Unsubscribe => self.unsubscribe(chat_id),
            Command::Unknown(_) => replies::UNKNOWN_COMMAND.to_string(),
        }
    }

    pub fn handle_text(&mut self, text: &str, chat_id: i64) -> String {
        let key = self.scope.session_key(chat_id);
        let session = self.sessions.entry(key).or_default();
        on_text(session, self.store.as_ref(), chat_id, text)
    }

    /// Keyboard change to attach to the reply going to `chat_id`.
    pub fn keyboard_directive(&self, chat_id: i64) -> KeyboardDirective {
        self.session(chat_id)
            .map(|session| session.keyboard.directive())
            .unwrap_or(KeyboardDirective::None)
    }

    /// Call once the reply carrying [`Self::keyboard_directive`] was handed off.
    pub fn commit_keyboard(&mut self, chat_id: i64) {
        let key = self.scope.session_key(chat_id);
        if let Some(session) = self.sessions.get_mut(&key) {
            session.keyboard.commit();
        }
    }

    fn subscribe(&mut self, chat_id: i64) -> String {
        if self.reminders.is_subscribed(chat_id) {
            return replies::ALREADY_SUBSCRIBED.to_string();
        }

        self.reminders.start(chat_id);
        let mut reply = replies::SUBSCRIBED.to_string();
        if let Err(err) = self.store.remember_subscriber(chat_id) {
            warn!(chat_id, error = %err, "subscription not persisted");
            reply.push_str(&format!(
                " But subscription was not placed in database. Error: {err}"
            ));
        }
        reply
    }

    fn unsubscribe(&mut self, chat_id: i64) -> String {
        if !self.reminders.stop(chat_id) {
            return replies::NOT_SUBSCRIBED.to_string();
        }

        let mut reply = replies::UNSUBSCRIBED.to_string();
        if let Err(err) = self.store.forget_subscriber(chat_id) {
            warn!(chat_id, error = %err, "unsubscription not persisted");
            reply.push_str(&format!(
                " But subscription was not removed from database. Error: {err}"
            ));
        }
        reply
    }

    pub async fn shutdown(&mut self) {
        self.reminders.shutdown().await;
    }
}

fn on_text(session: &mut Session, store: &dyn Store, chat_id: i64, text: &str) -> String {
    match session.state {
        ConversationState::Idle => replies::IDLE_HINT.to_string(),
        ConversationState::AwaitingJobText => {
            let description = text.trim();
            if description.is_empty() {
                return replies::ENTER_JOB.to_string();
            }
            session.pending = PendingItem {
                description: description.to_string(),
                date: None,
            };
            session.state = ConversationState::AwaitingDateForAdd;
            replies::ENTER_DATE.to_string()
        }
        ConversationState::AwaitingDateForAdd => {
            let Some(date) = parse_date(text, chat_id) else {
                return replies::BAD_DATE.to_string();
            };
            session.pending.date = Some(date);
            let draft = std::mem::take(&mut session.pending);
            session.state = ConversationState::Idle;
            match task_api::add_job(store, chat_id, date, &draft.description) {
                Ok(_) => replies::JOB_ADDED.to_string(),
                Err(err) => storage_failure(session, chat_id, &err),
            }
        }
        ConversationState::AwaitingDateForShow => {
            let Some(date) = parse_date(text, chat_id) else {
                return replies::BAD_DATE.to_string();
            };
            session.state = ConversationState::Idle;
            match task_api::digest_for(store, chat_id, date) {
                Ok(digest) => digest,
                Err(err) => storage_failure(session, chat_id, &err),
            }
        }
        ConversationState::AwaitingDateForDone => {
            let Some(date) = parse_date(text, chat_id) else {
                return replies::BAD_DATE.to_string();
            };
            let tasks = match task_api::jobs_for(store, chat_id, date) {
                Ok(tasks) => tasks,
                Err(err) => return storage_failure(session, chat_id, &err),
            };
            let (prompt, selectable) = session.keyboard.build(date, &tasks);
            session.state = if selectable {
                ConversationState::AwaitingKeySelection
            } else {
                ConversationState::Idle
            };
            prompt
        }
        ConversationState::AwaitingKeySelection => {
            let selection = match parse_selection(text, session.keyboard.items_count()) {
                Ok(selection) => selection,
                Err(err) => {
                    debug!(chat_id, error = %err, "selection rejected");
                    return replies::PRESS_BUTTON.to_string();
                }
            };

            let target = session
                .keyboard
                .date()
                .zip(session.keyboard.resolve_index(selection));
            session.keyboard.hide();
            session.state = ConversationState::Idle;

            let Some((date, index)) = target else {
                return replies::OPERATION_CANCELED.to_string();
            };
            match task_api::complete_job(store, chat_id, date, index) {
                Ok(_) => replies::WELL_DONE.to_string(),
                Err(err) => storage_failure(session, chat_id, &err),
            }
        }
    }
}

fn parse_date(text: &str, chat_id: i64) -> Option<CalendarDate> {
    match CalendarDate::parse(text) {
        Ok(date) => Some(date),
        Err(err) => {
            debug!(chat_id, error = %err, "date rejected");
            None
        }
    }
}

/// Accepts `0..=count`; `0` means cancel.
fn parse_selection(text: &str, count: usize) -> Result<usize, AppError> {
    let number: i64 = text
        .trim()
        .parse()
        .map_err(|_| AppError::selection_out_of_range(format!("{text:?} is not a number")))?;
    usize::try_from(number)
        .ok()
        .filter(|selection| *selection <= count)
        .ok_or_else(|| {
            AppError::selection_out_of_range(format!("{number} is outside 0..={count}"))
        })
}

fn storage_failure(session: &mut Session, chat_id: i64, err: &AppError) -> String {
    warn!(chat_id, error = %err, "task store operation failed");
    session.reset();
    match err {
        AppError::StorageRead(_) => replies::READ_FAILED.to_string(),
        _ => replies::WRITE_FAILED.to_string(),
    }
}
