//! In-memory stand-ins for the messaging host and the network components

use async_trait::async_trait;
use media_fetch::types::{MessageId, ThreadId};
use media_fetch::{
    Attachment, CancellationToken, DownloadError, Downloader, Error, MediaReference,
    MediaResolver, MessageHandle, Messenger, OutgoingMessage, Query, ResolutionError,
    StreamLocation,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A message the fake host accepted
#[derive(Clone, Debug)]
pub struct SentMessage {
    pub handle: MessageHandle,
    pub thread: ThreadId,
    pub reply_to: Option<MessageId>,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Which host operations should fail
#[derive(Clone, Copy, Debug, Default)]
pub struct HostFailures {
    /// Text messages without a reply target (the status message)
    pub status: bool,
    /// Messages carrying an attachment
    pub attachments: bool,
    /// Retractions
    pub unsend: bool,
    /// Never answer the status message
    pub hang_status: bool,
    /// Never answer text replies (prompt or failure)
    pub hang_replies: bool,
}

/// Runs while the host receives the attachment, before it answers
pub type AttachmentHook = Box<dyn Fn() + Send + Sync>;

/// Messenger that records everything it is asked to do
#[derive(Default)]
pub struct RecordingMessenger {
    failures: HostFailures,
    next_handle: AtomicU64,
    sent: Mutex<Vec<SentMessage>>,
    unsent: Mutex<Vec<MessageHandle>>,
    on_attachment: Option<AttachmentHook>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: HostFailures) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    pub fn on_attachment(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_attachment = Some(Box::new(hook));
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn unsent(&self) -> Vec<MessageHandle> {
        self.unsent.lock().unwrap().clone()
    }

    /// Plain messages sent to the thread without a reply target
    pub fn status_messages(&self) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.attachment.is_none() && m.reply_to.is_none())
            .collect()
    }

    /// Plain replies to the triggering message (prompt or failure)
    pub fn text_replies(&self) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.attachment.is_none() && m.reply_to.is_some())
            .collect()
    }

    pub fn attachments(&self) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.attachment.is_some())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        message: OutgoingMessage,
        thread: &ThreadId,
        reply_to: Option<&MessageId>,
    ) -> media_fetch::Result<MessageHandle> {
        let is_status = message.attachment.is_none() && reply_to.is_none();
        let is_reply = message.attachment.is_none() && reply_to.is_some();
        if (is_status && self.failures.hang_status) || (is_reply && self.failures.hang_replies) {
            std::future::pending::<()>().await;
        }
        if message.attachment.is_some() {
            if let Some(hook) = &self.on_attachment {
                hook();
            }
        }
        if (is_status && self.failures.status)
            || (message.attachment.is_some() && self.failures.attachments)
        {
            return Err(Error::Delivery("host rejected message".into()));
        }

        let n = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let handle = MessageHandle(format!("msg-{n}"));
        self.sent.lock().unwrap().push(SentMessage {
            handle: handle.clone(),
            thread: thread.clone(),
            reply_to: reply_to.cloned(),
            body: message.body,
            attachment: message.attachment,
        });
        Ok(handle)
    }

    async fn unsend(&self, handle: &MessageHandle) -> media_fetch::Result<()> {
        if self.failures.unsend {
            return Err(Error::Delivery("host refused to retract".into()));
        }
        self.unsent.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

/// Resolver returning canned answers and counting calls
pub struct StaticResolver {
    reference: Option<MediaReference>,
    location: Option<StreamLocation>,
    pub resolve_calls: AtomicUsize,
    pub locate_calls: AtomicUsize,
}

impl StaticResolver {
    pub fn new(reference: MediaReference, location: StreamLocation) -> Self {
        Self {
            reference: Some(reference),
            location: Some(location),
            resolve_calls: AtomicUsize::new(0),
            locate_calls: AtomicUsize::new(0),
        }
    }

    /// Stage 1 finds nothing
    pub fn empty() -> Self {
        Self {
            reference: None,
            location: None,
            resolve_calls: AtomicUsize::new(0),
            locate_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MediaResolver for StaticResolver {
    async fn resolve(&self, query: &Query) -> media_fetch::Result<MediaReference> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.reference.clone().ok_or_else(|| {
            ResolutionError::NotFound {
                query: query.to_string(),
            }
            .into()
        })
    }

    async fn locate(&self, _reference: &MediaReference) -> media_fetch::Result<StreamLocation> {
        self.locate_calls.fetch_add(1, Ordering::SeqCst);
        self.location
            .clone()
            .ok_or_else(|| ResolutionError::NoStream.into())
    }
}

/// How a [`ScriptedDownloader`] run ends after writing its chunks
#[derive(Clone, Copy, Debug)]
pub enum Ending {
    /// Flush, close and succeed
    Complete,
    /// Fail as if the connection dropped
    Interrupt,
    /// Never finish (until dropped)
    Hang,
}

/// Downloader that writes fixed chunks and then ends as scripted
pub struct ScriptedDownloader {
    chunks: Vec<Vec<u8>>,
    ending: Ending,
    pub calls: AtomicUsize,
}

impl ScriptedDownloader {
    pub fn new(chunks: Vec<Vec<u8>>, ending: Ending) -> Self {
        Self {
            chunks,
            ending,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Downloader for ScriptedDownloader {
    async fn download(
        &self,
        _location: &StreamLocation,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        _cancel: &CancellationToken,
    ) -> media_fetch::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut written = 0u64;
        for chunk in &self.chunks {
            sink.write_all(chunk).await?;
            written += chunk.len() as u64;
        }
        // Make partial bytes visible on disk before failing
        sink.flush().await?;

        match self.ending {
            Ending::Complete => {
                sink.shutdown().await?;
                Ok(written)
            }
            Ending::Interrupt => Err(DownloadError::Interrupted {
                bytes_written: written,
                reason: "connection reset by peer".into(),
            }
            .into()),
            Ending::Hang => std::future::pending().await,
        }
    }
}
