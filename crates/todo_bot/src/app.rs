//! Wires config, store, transport, reminders and the dispatch loop together.

use crate::cli::Command;
use crate::transport::console::{self, ConsoleOutbound};
use crate::transport::telegram::{self, TelegramClient};
use std::sync::Arc;
use time::UtcOffset;
use todo_core::config::BotConfig;
use todo_core::conversation::Conversation;
use todo_core::dispatch::{InboundMessage, run_dispatch};
use todo_core::error::AppError;
use todo_core::outbound::{Outbound, SerialSender};
use todo_core::reminder::Reminders;
use todo_core::storage::open_store;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const INBOUND_CAPACITY: usize = 64;

enum Transport {
    Console { chat_id: i64 },
    Telegram(Arc<TelegramClient>),
}

impl Transport {
    /// Validates transport settings before anything touches the store.
    fn resolve(command: Command, config: &BotConfig) -> Result<Self, AppError> {
        match command {
            Command::Console { chat_id } => Ok(Self::Console { chat_id }),
            Command::Telegram => {
                let token = config.telegram_token()?;
                let client = TelegramClient::new(&config.telegram_api_base, &token)?;
                Ok(Self::Telegram(Arc::new(client)))
            }
        }
    }
}

/// Runs the bot until the transport's input ends or the process is interrupted.
///
/// `offset` is the local UTC offset, resolved before the runtime started.
pub async fn run(config: BotConfig, command: Command, offset: UtcOffset) -> Result<(), AppError> {
    let policy = config.reminder_policy()?.with_offset(offset);
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel::<InboundMessage>(INBOUND_CAPACITY);

    let transport = Transport::resolve(command, &config)?;
    let store = open_store(config.store_backend, &config.store_path()?)?;

    let (outbound, producer): (Arc<dyn Outbound>, JoinHandle<()>) = match transport {
        Transport::Console { chat_id } => {
            let producer_cancel = cancel.clone();
            let producer = tokio::spawn(async move {
                let stdin = BufReader::new(tokio::io::stdin());
                if let Err(err) = console::read_lines(stdin, chat_id, tx, producer_cancel).await {
                    warn!(error = %err, "console input failed");
                }
            });
            let outbound: Arc<dyn Outbound> = Arc::new(ConsoleOutbound::stdout());
            (outbound, producer)
        }
        Transport::Telegram(client) => {
            let producer = tokio::spawn(telegram::poll_inbound(client.clone(), tx, cancel.clone()));
            let outbound: Arc<dyn Outbound> = client;
            (outbound, producer)
        }
    };

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            interrupt.cancel();
        }
    });

    let sender = SerialSender::new(outbound);
    let reminders = Reminders::new(store.clone(), sender.clone(), policy);
    let mut conversation = Conversation::new(store, reminders, config.conversation_scope);
    if let Err(err) = conversation.restore_subscriptions() {
        warn!(error = %err, "could not restore subscriptions");
    }

    info!(scope = ?conversation.scope(), "bot started");
    run_dispatch(&mut conversation, rx, sender, cancel.clone()).await;

    cancel.cancel();
    conversation.shutdown().await;
    producer.abort();
    info!("bot stopped");
    Ok(())
}
