//! Transient storage for in-flight media
//!
//! Each invocation gets exactly one file, named after its [`InvocationId`], so concurrent
//! invocations sharing the temp directory never touch each other's bytes. Deletion is
//! idempotent: a file that is already gone counts as deleted.

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::types::InvocationId;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Longest title fragment kept in an attachment file name
const MAX_ATTACHMENT_STEM: usize = 120;

/// How to open a blob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// Truncate and write (used by the downloader)
    Write,
    /// Read from the start
    Read,
}

/// One invocation's transient file
///
/// A blob names a path; the file itself may not exist yet (or any more).
#[derive(Clone, Debug)]
pub struct TransientBlob {
    id: InvocationId,
    path: PathBuf,
}

impl TransientBlob {
    /// Owning invocation
    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// Location on disk
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Allocates, opens and deletes transient blobs under one directory
#[derive(Clone, Debug)]
pub struct TransientStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl TransientStore {
    /// Create a store from configuration (the directory is created lazily)
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            dir: config.temp_dir.clone(),
            prefix: config.file_prefix.clone(),
            extension: config.extension.clone(),
        }
    }

    /// Directory holding the blobs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Extension given to blob files
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// The blob invocation `id` will use, without touching the filesystem
    pub fn blob_for(&self, id: InvocationId) -> TransientBlob {
        let path = self.dir.join(format!(
            "{}-{}.{}",
            self.prefix,
            id.simple(),
            self.extension
        ));
        TransientBlob { id, path }
    }

    /// Create the empty file backing `blob`
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Io`] if the directory cannot be created or the file already exists.
    pub async fn create(&self, blob: &TransientBlob) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&blob.path)
            .await?;

        debug!(invocation_id = %blob.id, path = ?blob.path, "allocated transient file");
        Ok(())
    }

    /// [`blob_for`](Self::blob_for) followed by [`create`](Self::create)
    pub async fn allocate(&self, id: InvocationId) -> Result<TransientBlob> {
        let blob = self.blob_for(id);
        self.create(&blob).await?;
        Ok(blob)
    }

    /// Open a blob's file
    pub async fn open(&self, blob: &TransientBlob, mode: OpenMode) -> Result<fs::File> {
        let file = match mode {
            OpenMode::Write => {
                fs::OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .open(&blob.path)
                    .await?
            }
            OpenMode::Read => fs::File::open(&blob.path).await?,
        };
        Ok(file)
    }

    /// Read a completed blob into memory
    pub async fn read_all(&self, blob: &TransientBlob) -> Result<Vec<u8>> {
        let mut file = self.open(blob, OpenMode::Read).await?;
        let mut data = Vec::new();
        file.read_to_end(&mut data).await?;
        Ok(data)
    }

    /// Remove a blob's file
    ///
    /// Returns whether a file was actually removed. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Any other filesystem failure is returned as [`Error::Cleanup`]; callers log it and
    /// carry on.
    pub async fn delete(&self, blob: &TransientBlob) -> Result<bool> {
        match fs::remove_file(&blob.path).await {
            Ok(()) => {
                debug!(invocation_id = %blob.id, path = ?blob.path, "deleted transient file");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    invocation_id = %blob.id,
                    path = ?blob.path,
                    "transient file already gone"
                );
                Ok(false)
            }
            Err(e) => Err(Error::Cleanup {
                path: blob.path.clone(),
                source: e,
            }),
        }
    }
}

/// File name for the outgoing attachment: the title made filesystem-safe, plus `extension`
///
/// ```
/// use media_fetch::store::attachment_name;
///
/// assert_eq!(attachment_name("AC/DC: Thunder", "mp3"), "AC_DC_ Thunder.mp3");
/// assert_eq!(attachment_name("   ", "mp3"), "media.mp3");
/// ```
pub fn attachment_name(title: &str, extension: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| {
            if matches!(
                c,
                '/' | '\\' | '"' | '\n' | '\r' | '\t' | '<' | '>' | '|' | ':' | '*' | '?'
            ) {
                '_'
            } else {
                c
            }
        })
        .take(MAX_ATTACHMENT_STEM)
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        format!("media.{extension}")
    } else {
        format!("{stem}.{extension}")
    }
}
