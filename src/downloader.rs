//! Streaming media download
//!
//! Bytes are copied chunk by chunk from the response into the caller's sink, so memory use
//! does not grow with the payload. The whole transfer is bounded by
//! [`DownloadConfig::timeout`] and can be cancelled at any point through a
//! [`CancellationToken`]; once cancellation is observed no further bytes are written.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, NetworkError, Result};
use crate::types::StreamLocation;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Fetches the bytes at a [`StreamLocation`]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Copy the bytes at `location` into `sink`, returning the number of bytes written
    ///
    /// Returns only after `sink` has been flushed and shut down, so the caller may read the
    /// file as soon as this resolves.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if the connection cannot be established, upstream answers with a
    ///   non-success status, or the overall bound elapses
    /// - [`Error::Download`] if the stream breaks off mid-transfer
    /// - [`Error::Cancelled`] if `cancel` fires first
    /// - [`Error::Io`] if writing to `sink` fails
    async fn download(
        &self,
        location: &StreamLocation,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// [`Downloader`] over plain HTTP(S)
pub struct HttpDownloader {
    http_client: reqwest::Client,
    config: DownloadConfig,
}

impl HttpDownloader {
    /// Create a downloader
    ///
    /// No client-wide timeout is set: the overall bound is enforced around the transfer so
    /// that it covers the body stream too.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: Some("download".to_string()),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        location: &StreamLocation,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = location.as_str();
        let bound = self.config.timeout;
        let deadline = Instant::now() + bound;
        let timed_out = || {
            Error::from(NetworkError::Timeout {
                url: url.to_string(),
                after: bound,
            })
        };

        debug!(%url, "starting media download");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out()),
            res = self.http_client.get(url).send() => {
                res.map_err(|e| NetworkError::from_reqwest(url, bound, e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(%url, bytes_written, "download cancelled");
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(%url, bytes_written, "download timed out");
                    return Err(timed_out());
                }
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    sink.write_all(&chunk).await?;
                    bytes_written += chunk.len() as u64;
                }
                Some(Err(e)) => {
                    return Err(DownloadError::Interrupted {
                        bytes_written,
                        reason: e.to_string(),
                    }
                    .into());
                }
                None => break,
            }
        }

        sink.flush().await?;
        sink.shutdown().await?;

        info!(%url, bytes = bytes_written, "media download complete");
        Ok(bytes_written)
    }
}
