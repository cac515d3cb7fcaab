//! Line-oriented stdin/stdout transport for a single chat.
//!
//! Every non-empty input line is one message from `chat_id`. Replies go to
//! stdout; keyboard changes are printed as bracketed lines. Logging stays on
//! stderr.

use async_trait::async_trait;
use todo_core::dispatch::InboundMessage;
use todo_core::error::AppError;
use todo_core::keyboard::KeyboardDirective;
use todo_core::outbound::{Outbound, OutboundMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Renders one reply the way it appears on the console.
pub fn render(message: &OutboundMessage) -> String {
    let mut rendered = message.text.trim_end_matches('\n').to_string();
    rendered.push('\n');
    match &message.keyboard {
        KeyboardDirective::Show(rows) => {
            let labels: Vec<&str> = rows.iter().flatten().map(String::as_str).collect();
            rendered.push_str(&format!("[keyboard: {}]\n", labels.join(" ")));
        }
        KeyboardDirective::Hide => rendered.push_str("[keyboard removed]\n"),
        KeyboardDirective::None => {}
    }
    rendered
}

pub struct ConsoleOutbound<W> {
    writer: Mutex<W>,
}

impl ConsoleOutbound<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleOutbound<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Outbound for ConsoleOutbound<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: &OutboundMessage) -> Result<(), AppError> {
        let mut writer = self.writer.lock().await;
        writer
            .write_all(render(message).as_bytes())
            .await
            .map_err(|err| AppError::send(format!("failed to write to stdout: {err}")))?;
        writer
            .flush()
            .await
            .map_err(|err| AppError::send(format!("failed to flush stdout: {err}")))
    }
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Forwards input lines as messages from `chat_id` until EOF, `exit`/`quit`,
/// cancellation, or the dispatch side going away.
pub async fn read_lines<R>(
    reader: R,
    chat_id: i64,
    inbound: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            line = lines.next_line() => line
                .map_err(|err| AppError::io(format!("failed to read from stdin: {err}")))?,
        };

        let Some(line) = line else {
            info!("stdin closed");
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            info!("console session ended");
            return Ok(());
        }

        if inbound
            .send(InboundMessage::new(chat_id, line))
            .await
            .is_err()
        {
            return Ok(());
        }
    }
}
