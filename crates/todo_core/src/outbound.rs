use crate::error::AppError;
use crate::keyboard::KeyboardDirective;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: KeyboardDirective,
}

impl OutboundMessage {
    pub fn text<T: Into<String>>(chat_id: i64, text: T) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: KeyboardDirective::None,
        }
    }
}

/// Transport-specific delivery. Implementations need not be safe for
/// concurrent use; callers go through [`SerialSender`].
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), AppError>;
}

/// Process-wide send path: at most one send is in flight at a time.
#[derive(Clone)]
pub struct SerialSender {
    inner: Arc<dyn Outbound>,
    lock: Arc<Mutex<()>>,
}

impl SerialSender {
    pub fn new(inner: Arc<dyn Outbound>) -> Self {
        Self {
            inner,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn send(&self, message: &OutboundMessage) -> Result<(), AppError> {
        let _guard = self.lock.lock().await;
        self.inner.send(message).await
    }
}
