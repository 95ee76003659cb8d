//! Pipeline orchestrator
//!
//! Runs one invocation end to end and presents exactly one outcome to the user:
//! a prompt (empty query), status + attachment (success), or status + failure message.
//!
//! The stages resolve -> locate -> download -> deliver run as one sequential future. That
//! future is raced against the caller's [`CancellationToken`] and the optional invocation
//! deadline; whichever finishes first decides the result, and the losers are dropped, which
//! stops any in-flight network read. The status message is raced the same way. Cleanup then
//! always runs on the invocation's own state, outside the raced future, so no path can skip it.
//!
//! Every message sent to the host is bounded by `messages.send_timeout`. A host that never
//! answers costs at most that long and cannot hold a transient file on disk.

use crate::command::Command;
use crate::config::Config;
use crate::downloader::{Downloader, HttpDownloader};
use crate::error::{Error, Result};
use crate::messenger::{Attachment, MessageHandle, Messenger, OutgoingMessage};
use crate::resolver::{HttpResolver, MediaResolver};
use crate::store::{OpenMode, TransientBlob, TransientStore, attachment_name};
use crate::types::{Event, InvocationId, MessageId, Outcome, Query, Stage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Per-invocation state, owned by [`MediaPipeline::handle_with_cancel`]
struct Invocation {
    id: InvocationId,
    stage: Stage,
    /// Set before the file is created, so cleanup sees it whatever happens next
    blob: Option<TransientBlob>,
    /// File creation still running on its own task
    creating: Option<JoinHandle<Result<()>>>,
}

/// Result of a successful stage run
struct Delivery {
    title: String,
    bytes: u64,
}

/// Search-and-send orchestrator (cloneable - all fields are Arc-wrapped)
///
/// Holds no per-invocation state; any number of invocations may run concurrently on one
/// instance.
#[derive(Clone)]
pub struct MediaPipeline {
    config: Arc<Config>,
    resolver: Arc<dyn MediaResolver>,
    downloader: Arc<dyn Downloader>,
    store: TransientStore,
    messenger: Arc<dyn Messenger>,
    event_tx: broadcast::Sender<Event>,
}

impl MediaPipeline {
    /// Create a pipeline talking to the configured upstream over HTTP
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or an HTTP client cannot be
    /// built.
    pub fn new(config: Config, messenger: Arc<dyn Messenger>) -> Result<Self> {
        config.validate()?;
        let resolver = Arc::new(HttpResolver::new(config.resolver.clone())?);
        let downloader = Arc::new(HttpDownloader::new(config.download.clone())?);
        Self::with_components(config, resolver, downloader, messenger)
    }

    /// Create a pipeline from explicit components
    pub fn with_components(
        config: Config,
        resolver: Arc<dyn MediaResolver>,
        downloader: Arc<dyn Downloader>,
        messenger: Arc<dyn Messenger>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = TransientStore::new(&config.store);

        Ok(Self {
            config: Arc::new(config),
            resolver,
            downloader,
            store,
            messenger,
            event_tx,
        })
    }

    /// Subscribe to invocation events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The transient store used for downloads
    pub fn store(&self) -> &TransientStore {
        &self.store
    }

    /// Handle one command with no external cancellation
    pub async fn handle(&self, command: &Command) -> Outcome {
        self.handle_with_cancel(command, CancellationToken::new())
            .await
    }

    /// Handle one command, aborting the in-flight stage if `cancel` fires
    ///
    /// Never returns an error: every failure is logged, reported to the user with the
    /// configured failure text, and summarized in the returned [`Outcome`].
    pub async fn handle_with_cancel(&self, command: &Command, cancel: CancellationToken) -> Outcome {
        let mut inv = Invocation {
            id: InvocationId::new(),
            stage: Stage::Validating,
            blob: None,
            creating: None,
        };
        let deadline = self
            .config
            .invocation_timeout
            .map(|limit| Instant::now() + limit);
        self.emit(Event::StageEntered {
            id: inv.id,
            stage: Stage::Validating,
        });

        let query = match command.query() {
            Ok(query) => query,
            Err(e) => {
                debug!(invocation_id = %inv.id, kind = e.kind(), error = %e, "prompting for input");
                self.reply(inv.id, command, self.config.messages.prompt.clone())
                    .await;
                self.transition(inv.id, &mut inv.stage, Stage::Done);
                return Outcome::Prompted;
            }
        };

        info!(invocation_id = %inv.id, query = %query, "media fetch started");
        self.transition(inv.id, &mut inv.stage, Stage::ResolvingRef);

        let mut status = None;
        let result = match self
            .bounded(self.send_status(inv.id, command, &query), &cancel, deadline)
            .await
        {
            Ok(handle) => {
                status = handle;
                self.bounded(
                    self.run_stages(&mut inv, command, &query, &cancel),
                    &cancel,
                    deadline,
                )
                .await
                .and_then(|r| r)
            }
            Err(e) => Err(e),
        };

        let (outcome, delivered) = match result {
            Ok(delivery) => {
                info!(
                    invocation_id = %inv.id,
                    title = %delivery.title,
                    bytes = delivery.bytes,
                    "media delivered"
                );
                self.emit(Event::Delivered {
                    id: inv.id,
                    title: delivery.title.clone(),
                    bytes: delivery.bytes,
                });
                let outcome = Outcome::Delivered {
                    title: delivery.title,
                    bytes: delivery.bytes,
                };
                (outcome, true)
            }
            Err(e) => {
                let stage = inv.stage;
                error!(
                    invocation_id = %inv.id,
                    stage = %stage,
                    kind = e.kind(),
                    error = %e,
                    "media fetch failed"
                );
                self.emit(Event::Failed {
                    id: inv.id,
                    stage,
                    kind: e.kind().to_string(),
                });
                self.transition(inv.id, &mut inv.stage, Stage::Failed);
                // Sent even after cancellation; bounded by the send timeout only
                self.reply(inv.id, command, self.config.messages.failure.clone())
                    .await;
                let outcome = Outcome::Failed {
                    stage,
                    kind: e.kind(),
                };
                (outcome, false)
            }
        };

        // The status message stays visible unless the attachment went out
        let retract = if delivered { status } else { None };
        self.cleanup(&mut inv, retract).await;
        self.transition(inv.id, &mut inv.stage, Stage::Done);
        outcome
    }

    /// Run `work` unless `cancel` fires or `deadline` passes first
    ///
    /// The losing future is dropped.
    async fn bounded<T>(
        &self,
        work: impl Future<Output = T>,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<T> {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = expired => Err(Error::DeadlineExceeded(
                self.config.invocation_timeout.unwrap_or_default(),
            )),
            r = work => Ok(r),
        }
    }

    /// Resolve, locate, download and deliver, in order
    ///
    /// `inv.stage` always names the stage currently running. `inv.blob` is set before the
    /// transient file is created, and the creation runs on its own task held in
    /// `inv.creating`, so the caller can clean up after this future is dropped at any point.
    async fn run_stages(
        &self,
        inv: &mut Invocation,
        command: &Command,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Delivery> {
        let reference = self.resolver.resolve(query).await?;
        debug!(
            invocation_id = %inv.id,
            title = %reference.title,
            duration = %reference.duration,
            "query resolved"
        );

        self.transition(inv.id, &mut inv.stage, Stage::ResolvingStream);
        let location = self.resolver.locate(&reference).await?;
        debug!(invocation_id = %inv.id, %location, "stream located");

        self.transition(inv.id, &mut inv.stage, Stage::Downloading);
        let blob = self.store.blob_for(inv.id);
        let creating = inv.creating.insert(self.spawn_create(&blob));
        inv.blob = Some(blob.clone());
        let created = creating
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))
            .and_then(|r| r);
        inv.creating = None;
        if let Err(e) = created {
            // Whatever is at that path was not created by this invocation
            inv.blob = None;
            return Err(e);
        }
        self.emit(Event::BlobAllocated {
            id: inv.id,
            path: blob.path().to_path_buf(),
        });

        let mut file = self.store.open(&blob, OpenMode::Write).await?;
        let written = self
            .downloader
            .download(&location, &mut file, cancel)
            .await?;
        drop(file);
        debug!(invocation_id = %inv.id, bytes = written, "download finished");

        self.transition(inv.id, &mut inv.stage, Stage::Delivering);
        let data = self.store.read_all(&blob).await?;
        let bytes = data.len() as u64;
        let attachment = Attachment {
            file_name: attachment_name(&reference.title, self.store.extension()),
            data,
        };

        self.send(
            OutgoingMessage::with_attachment(reference.caption(), attachment),
            command,
            command.message_id.as_ref(),
        )
        .await
        .map_err(|e| match e {
            Error::Delivery(_) => e,
            other => Error::Delivery(other.to_string()),
        })?;

        Ok(Delivery {
            title: reference.title,
            bytes,
        })
    }

    /// Delete the transient file (if any) and retract the status message (if given)
    ///
    /// Both actions are best-effort: failures are logged and never change the outcome.
    async fn cleanup(&self, inv: &mut Invocation, retract: Option<MessageHandle>) {
        self.transition(inv.id, &mut inv.stage, Stage::Cleanup);

        // Let an abandoned creation land first, or it could recreate the file after deletion
        if let Some(creating) = inv.creating.take() {
            if let Err(e) = creating.await {
                warn!(invocation_id = %inv.id, error = %e, "transient file creation task failed");
            }
        }

        if let Some(blob) = inv.blob.take() {
            let removed = match self.store.delete(&blob).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!(
                        invocation_id = %inv.id,
                        kind = e.kind(),
                        error = %e,
                        "failed to delete transient file"
                    );
                    false
                }
            };
            self.emit(Event::BlobDeleted {
                id: inv.id,
                removed,
            });
        }

        if let Some(handle) = retract {
            let limit = self.config.messages.send_timeout;
            let retracted = tokio::time::timeout(limit, self.messenger.unsend(&handle))
                .await
                .unwrap_or_else(|_| Err(host_timeout(limit)));
            match retracted {
                Ok(()) => self.emit(Event::StatusRetracted { id: inv.id }),
                Err(e) => {
                    warn!(invocation_id = %inv.id, error = %e, "failed to retract status message");
                }
            }
        }
    }

    /// Send the interim status message; failure is logged and tolerated
    async fn send_status(
        &self,
        id: InvocationId,
        command: &Command,
        query: &Query,
    ) -> Option<MessageHandle> {
        let text = self.config.messages.searching_for(query.as_str());
        match self.send(OutgoingMessage::text(text), command, None).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(invocation_id = %id, error = %e, "failed to send status message");
                None
            }
        }
    }

    /// Reply to the triggering message with plain text; failure is logged and tolerated
    async fn reply(&self, id: InvocationId, command: &Command, body: String) {
        if let Err(e) = self
            .send(
                OutgoingMessage::text(body),
                command,
                command.message_id.as_ref(),
            )
            .await
        {
            warn!(invocation_id = %id, error = %e, "failed to send reply");
        }
    }

    /// One host send, bounded by the configured send timeout
    async fn send(
        &self,
        message: OutgoingMessage,
        command: &Command,
        reply_to: Option<&MessageId>,
    ) -> Result<MessageHandle> {
        let limit = self.config.messages.send_timeout;
        tokio::time::timeout(
            limit,
            self.messenger.send(message, &command.thread_id, reply_to),
        )
        .await
        .unwrap_or_else(|_| Err(host_timeout(limit)))
    }

    /// Create the blob's file on its own task, which survives this invocation being dropped
    fn spawn_create(&self, blob: &TransientBlob) -> JoinHandle<Result<()>> {
        let store = self.store.clone();
        let blob = blob.clone();
        tokio::spawn(async move { store.create(&blob).await })
    }

    fn transition(&self, id: InvocationId, stage: &mut Stage, next: Stage) {
        debug!(invocation_id = %id, from = %stage, to = %next, "stage transition");
        *stage = next;
        self.emit(Event::StageEntered { id, stage: next });
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }
}

fn host_timeout(limit: Duration) -> Error {
    Error::Delivery(format!("host did not answer within {limit:?}"))
}
