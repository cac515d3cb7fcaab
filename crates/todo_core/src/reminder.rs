//! Per-subscriber reminder units.
//!
//! Each subscribed chat gets its own tokio task that waits for the first fire,
//! then sends the day's digest on every interval tick until cancelled.

use crate::error::AppError;
use crate::model::CalendarDate;
use crate::outbound::{OutboundMessage, SerialSender};
use crate::storage::Store;
use crate::task_api;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use time::macros::time;
use time::{OffsetDateTime, Time, UtcOffset};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound for the first delay and the interval.
pub const MAX_SCHEDULE_SPAN: Duration = Duration::from_secs(366 * 24 * 60 * 60);
const READ_FAILURE_NOTICE: &str = "Could not read from database.";

/// When the first digest of a fresh subscription goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstFire {
    DailyAt(Time),
    After(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub first_fire: FirstFire,
    pub interval: Duration,
    /// Offset used for "local" wall-clock time and for today's date.
    pub offset: UtcOffset,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            first_fire: FirstFire::DailyAt(time!(9:00)),
            interval: DEFAULT_INTERVAL,
            offset: UtcOffset::UTC,
        }
    }
}

impl ReminderPolicy {
    pub fn daily_at(hour: u8, minute: u8, interval: Duration) -> Result<Self, AppError> {
        let at = Time::from_hms(hour, minute, 0)
            .map_err(|err| AppError::invalid_input(format!("reminder time: {err}")))?;
        Self::new(FirstFire::DailyAt(at), interval)
    }

    pub fn after(delay: Duration, interval: Duration) -> Result<Self, AppError> {
        Self::new(FirstFire::After(delay), interval)
    }

    fn new(first_fire: FirstFire, interval: Duration) -> Result<Self, AppError> {
        if interval.is_zero() {
            return Err(AppError::invalid_input("reminder interval must be positive"));
        }
        if interval > MAX_SCHEDULE_SPAN {
            return Err(AppError::invalid_input(format!(
                "reminder interval must not exceed {} seconds",
                MAX_SCHEDULE_SPAN.as_secs()
            )));
        }
        if let FirstFire::After(delay) = first_fire
            && delay > MAX_SCHEDULE_SPAN
        {
            return Err(AppError::invalid_input(format!(
                "reminder first delay must not exceed {} seconds",
                MAX_SCHEDULE_SPAN.as_secs()
            )));
        }
        Ok(Self {
            first_fire,
            interval,
            offset: UtcOffset::UTC,
        })
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    pub fn first_delay(&self, now: OffsetDateTime) -> Duration {
        match self.first_fire {
            FirstFire::After(delay) => delay,
            FirstFire::DailyAt(at) => {
                let today = now.replace_time(at);
                let next = if today > now {
                    today
                } else {
                    today + time::Duration::days(1)
                };
                (next - now).unsigned_abs()
            }
        }
    }
}

struct ReminderUnit {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Reminders {
    store: Arc<dyn Store>,
    sender: SerialSender,
    policy: ReminderPolicy,
    units: HashMap<i64, ReminderUnit>,
}

impl Reminders {
    pub fn new(store: Arc<dyn Store>, sender: SerialSender, policy: ReminderPolicy) -> Self {
        Self {
            store,
            sender,
            policy,
            units: HashMap::new(),
        }
    }

    pub fn is_subscribed(&self, chat_id: i64) -> bool {
        self.units.contains_key(&chat_id)
    }

    pub fn active(&self) -> Vec<i64> {
        let mut chats: Vec<i64> = self.units.keys().copied().collect();
        chats.sort_unstable();
        chats
    }

    /// Spawns a unit for `chat_id`. Returns false if one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, chat_id: i64) -> bool {
        if self.units.contains_key(&chat_id) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_unit(
            chat_id,
            self.store.clone(),
            self.sender.clone(),
            self.policy,
            cancel.clone(),
        ));
        self.units.insert(chat_id, ReminderUnit { cancel, handle });
        info!(chat_id, "reminder started");
        true
    }

    pub fn stop(&mut self, chat_id: i64) -> bool {
        match self.units.remove(&chat_id) {
            Some(unit) => {
                unit.cancel.cancel();
                info!(chat_id, "reminder stopped");
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&mut self) {
        let units: Vec<(i64, ReminderUnit)> = self.units.drain().collect();
        for (_, unit) in &units {
            unit.cancel.cancel();
        }
        for (chat_id, unit) in units {
            if let Err(err) = unit.handle.await {
                warn!(chat_id, error = %err, "reminder task ended abnormally");
            }
        }
    }
}

impl Drop for Reminders {
    fn drop(&mut self) {
        for unit in self.units.values() {
            unit.cancel.cancel();
        }
    }
}

async fn run_unit(
    chat_id: i64,
    store: Arc<dyn Store>,
    sender: SerialSender,
    policy: ReminderPolicy,
    cancel: CancellationToken,
) {
    let delay = policy.first_delay(policy.now());
    debug!(chat_id, delay_secs = delay.as_secs(), "first reminder scheduled");

    let Some(start) = Instant::now().checked_add(delay) else {
        warn!(chat_id, delay_secs = delay.as_secs(), "first reminder is out of range");
        return;
    };
    let mut ticker = tokio::time::interval_at(start, policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = deliver_digest(chat_id, store.clone(), &sender, &policy) => {}
        }
    }
}

async fn deliver_digest(
    chat_id: i64,
    store: Arc<dyn Store>,
    sender: &SerialSender,
    policy: &ReminderPolicy,
) {
    let today = CalendarDate::from(policy.now().date());
    let read = tokio::task::spawn_blocking(move || {
        task_api::digest_for(store.as_ref(), chat_id, today)
    })
    .await
    .map_err(|err| AppError::storage_read(format!("reminder read task failed: {err}")))
    .and_then(|digest| digest);
    let text = match read {
        Ok(text) => text,
        Err(err) => {
            warn!(chat_id, error = %err, "could not read tasks for reminder");
            READ_FAILURE_NOTICE.to_string()
        }
    };

    if let Err(err) = sender.send(&OutboundMessage::text(chat_id, text)).await {
        warn!(chat_id, error = %err, "could not deliver reminder");
    }
}
