//! Seam to the messaging host

use crate::error::Result;
use crate::types::{MessageId, ThreadId};
use async_trait::async_trait;

/// Host-assigned handle of a message this crate sent
///
/// The interim status message's handle is kept until it is retracted or abandoned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub String);

/// Binary attachment
#[derive(Clone, Debug)]
pub struct Attachment {
    /// File name shown to recipients
    pub file_name: String,
    /// File contents
    pub data: Vec<u8>,
}

/// A message to send
#[derive(Clone, Debug)]
pub struct OutgoingMessage {
    /// Text body (or attachment caption)
    pub body: String,
    /// Optional attachment
    pub attachment: Option<Attachment>,
}

impl OutgoingMessage {
    /// Plain text message
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attachment: None,
        }
    }

    /// Captioned attachment
    pub fn with_attachment(body: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            body: body.into(),
            attachment: Some(attachment),
        }
    }
}

/// Messaging host operations the pipeline relies on
///
/// Delivery semantics (ordering, retries) belong to the implementation. Errors should be
/// reported as [`Error::Delivery`](crate::Error::Delivery).
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `message` to `thread`, optionally as a reply to `reply_to`
    async fn send(
        &self,
        message: OutgoingMessage,
        thread: &ThreadId,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageHandle>;

    /// Retract a previously sent message
    async fn unsend(&self, handle: &MessageHandle) -> Result<()>;
}
