//! # media-fetch
//!
//! Search-and-send media pipeline for chat bot commands.
//!
//! Given a free-text query, the pipeline resolves it to a remote media item (two lookups
//! against an upstream search API), streams the item into a per-invocation transient file,
//! sends it back as a captioned attachment, and removes the file whatever happened.
//!
//! ## Design Philosophy
//!
//! - **One outcome per invocation** - the user sees a prompt, a success, or one uniform failure
//! - **Guaranteed cleanup** - every transient file is deleted on every path, cancellation included
//! - **Library-first** - the messaging host plugs in through the [`Messenger`] trait
//! - **Event-driven** - consumers subscribe to stage events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use media_fetch::{Command, Config, MediaPipeline, MessageHandle, Messenger, OutgoingMessage};
//! use media_fetch::types::{MessageId, ThreadId};
//!
//! struct ConsoleMessenger;
//!
//! #[async_trait]
//! impl Messenger for ConsoleMessenger {
//!     async fn send(
//!         &self,
//!         message: OutgoingMessage,
//!         thread: &ThreadId,
//!         _reply_to: Option<&MessageId>,
//!     ) -> media_fetch::Result<MessageHandle> {
//!         println!("[{}] {}", thread.0, message.body);
//!         Ok(MessageHandle("1".into()))
//!     }
//!
//!     async fn unsend(&self, _handle: &MessageHandle) -> media_fetch::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = MediaPipeline::new(Config::default(), Arc::new(ConsoleMessenger))?;
//!
//!     let command = Command::new("thread-1", None, vec!["moonlight".into()]);
//!     let outcome = pipeline.handle(&command).await;
//!     println!("{outcome:?}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Inbound command parsing and metadata
pub mod command;
/// Configuration types
pub mod config;
/// Streaming media download
pub mod downloader;
/// Error types
pub mod error;
/// Messaging host seam
pub mod messenger;
/// Invocation orchestrator
pub mod pipeline;
/// Two-stage media resolution
pub mod resolver;
/// Transient file storage
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use command::{Command, CommandInfo};
pub use config::Config;
pub use downloader::{Downloader, HttpDownloader};
pub use error::{DownloadError, Error, NetworkError, ResolutionError, Result};
pub use messenger::{Attachment, MessageHandle, Messenger, OutgoingMessage};
pub use pipeline::MediaPipeline;
pub use resolver::{HttpResolver, MediaResolver};
pub use store::{TransientBlob, TransientStore};
pub use types::{Event, InvocationId, MediaReference, Outcome, Query, Stage, StreamLocation};

pub use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal.
///
/// Pass clones of `token` (or child tokens) to
/// [`MediaPipeline::handle_with_cancel`] so in-flight invocations stop their network reads,
/// delete their transient files and report failure before the host exits.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_fetch::{CancellationToken, cancel_on_shutdown};
///
/// #[tokio::main]
/// async fn main() {
///     let shutdown = CancellationToken::new();
///     tokio::spawn(cancel_on_shutdown(shutdown.clone()));
///
///     // pipeline.handle_with_cancel(&command, shutdown.child_token()).await;
///     shutdown.cancelled().await;
/// }
/// ```
pub async fn cancel_on_shutdown(token: CancellationToken) {
    let signal = wait_for_signal().await;
    tracing::info!(signal, "shutdown signal received, cancelling in-flight invocations");
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut term), Ok(mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Ok(mut term), Err(e)) => {
            tracing::warn!(error = %e, "no SIGINT handler, waiting for SIGTERM only");
            term.recv().await;
            "SIGTERM"
        }
        (Err(e), Ok(mut int)) => {
            tracing::warn!(error = %e, "no SIGTERM handler, waiting for SIGINT only");
            int.recv().await;
            "SIGINT"
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "no signal handlers, falling back to ctrl_c");
            ctrl_c().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

/// Wait for Ctrl+C; if it cannot be watched, never resolve
async fn ctrl_c() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "ctrl_c",
        Err(e) => {
            tracing::error!(error = %e, "cannot listen for Ctrl+C, shutdown is left to the host");
            std::future::pending().await
        }
    }
}
