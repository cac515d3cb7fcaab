//! Sequential dispatch loop between a transport's inbound channel and the
//! conversation.

use crate::conversation::Conversation;
use crate::outbound::{OutboundMessage, SerialSender};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn new<T: Into<String>>(chat_id: i64, text: T) -> Self {
        Self {
            chat_id,
            text: text.into(),
        }
    }
}

/// Command name of a `/name` or `/name@botname` message.
pub fn parse_command(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix('/')?;
    let token = rest.split_whitespace().next().unwrap_or_default();
    let name = token.split_once('@').map_or(token, |(name, _)| name);
    Some(name)
}

impl Conversation {
    /// Routes one message and builds the reply carrying the pending keyboard change.
    ///
    /// The caller must call [`Conversation::commit_keyboard`] after handing the
    /// reply to the transport.
    pub fn handle_message(&mut self, message: &InboundMessage) -> OutboundMessage {
        let text = match parse_command(&message.text) {
            Some(name) => self.handle_command(name, message.chat_id),
            None => self.handle_text(&message.text, message.chat_id),
        };
        OutboundMessage {
            chat_id: message.chat_id,
            text,
            keyboard: self.keyboard_directive(message.chat_id),
        }
    }
}

/// Handles messages one at a time until the channel closes or `cancel` fires.
pub async fn run_dispatch(
    conversation: &mut Conversation,
    mut inbound: mpsc::Receiver<InboundMessage>,
    sender: SerialSender,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        debug!(chat_id = message.chat_id, "message received");
        let reply = conversation.handle_message(&message);
        if let Err(err) = sender.send(&reply).await {
            warn!(chat_id = message.chat_id, error = %err, "could not deliver reply");
        }
        conversation.commit_keyboard(message.chat_id);
    }
    info!("dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::{InboundMessage, parse_command, run_dispatch};
    use crate::conversation::{Conversation, ConversationScope, replies};
    use crate::keyboard::KeyboardDirective;
    use crate::model::{CalendarDate, Task, TaskKey};
    use crate::outbound::SerialSender;
    use crate::outbound::test_support::RecordingOutbound;
    use crate::reminder::{ReminderPolicy, Reminders};
    use crate::storage::{MemoryStore, Store, TaskStore};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (Arc<MemoryStore>, Arc<RecordingOutbound>, SerialSender, Conversation) {
        let store = Arc::new(MemoryStore::new());
        let outbound = Arc::new(RecordingOutbound::default());
        let sender = SerialSender::new(outbound.clone());
        let policy =
            ReminderPolicy::after(Duration::from_secs(60), Duration::from_secs(60)).unwrap();
        let shared: Arc<dyn Store> = store.clone();
        let reminders = Reminders::new(shared.clone(), sender.clone(), policy);
        let conversation = Conversation::new(shared, reminders, ConversationScope::Global);
        (store, outbound, sender, conversation)
    }

    #[test]
    fn parse_command_strips_prefix_and_bot_name() {
        assert_eq!(parse_command("/start"), Some("start"));
        assert_eq!(parse_command("/done@todo_bot"), Some("done"));
        assert_eq!(parse_command("/items extra words"), Some("items"));
        assert_eq!(parse_command("/"), Some(""));
        assert_eq!(parse_command("15-03-2025"), None);
        assert_eq!(parse_command("not /a command"), None);
    }

    #[test]
    fn bare_slash_is_an_unknown_command() {
        let (_store, _outbound, _sender, mut conversation) = setup();
        let reply = conversation.handle_message(&InboundMessage::new(1, "/"));
        assert_eq!(reply.text, replies::UNKNOWN_COMMAND);
    }

    #[tokio::test]
    async fn dispatch_replies_in_order_with_keyboard_changes() {
        let (store, outbound, sender, mut conversation) = setup();
        let date = CalendarDate::new(2025, 3, 15).unwrap();
        store
            .put(&TaskKey::new(9, date), &[Task::new("Learn Go")])
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        for text in ["/done", "15-03-2025", "1", "/items", "15-03-2025"] {
            tx.send(InboundMessage::new(9, text)).await.unwrap();
        }
        drop(tx);

        run_dispatch(&mut conversation, rx, sender, CancellationToken::new()).await;

        let sent = outbound.messages_for(9);
        let texts: Vec<&str> = sent.iter().map(|message| message.text.as_str()).collect();
        assert_eq!(texts[0], replies::ENTER_DONE_DATE);
        assert!(texts[1].ends_with("0. Cancel\n1. Learn Go\n"));
        assert_eq!(texts[2], replies::WELL_DONE);
        assert_eq!(texts[4], "1. Learn Go - Done\n");

        assert_eq!(sent[0].keyboard, KeyboardDirective::None);
        assert_eq!(
            sent[1].keyboard,
            KeyboardDirective::Show(vec![vec!["0".to_string(), "1".to_string()]])
        );
        assert_eq!(sent[2].keyboard, KeyboardDirective::Hide);
        assert_eq!(sent[3].keyboard, KeyboardDirective::None);
    }

    #[tokio::test]
    async fn failed_sends_still_commit_keyboard() {
        let (store, outbound, sender, mut conversation) = setup();
        let date = CalendarDate::new(2025, 3, 15).unwrap();
        store.put(&TaskKey::new(9, date), &[Task::new("a")]).unwrap();
        outbound.fail.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(8);
        tx.send(InboundMessage::new(9, "/done")).await.unwrap();
        tx.send(InboundMessage::new(9, "15-03-2025")).await.unwrap();
        drop(tx);
        run_dispatch(&mut conversation, rx, sender, CancellationToken::new()).await;

        assert!(outbound.messages().is_empty());
        assert_eq!(
            conversation.keyboard_directive(9),
            KeyboardDirective::None
        );
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let (_store, outbound, sender, mut conversation) = setup();
        let (_tx, rx) = mpsc::channel::<InboundMessage>(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_dispatch(&mut conversation, rx, sender, cancel).await;
        assert!(outbound.messages().is_empty());
    }
}
