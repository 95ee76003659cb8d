//! Core types for media-fetch

use crate::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for one invocation
///
/// Also names the invocation's transient file, so concurrent invocations never share a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(pub Uuid);

impl InvocationId {
    /// Mint a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in file names and logs
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chat thread the command arrived in
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Host-assigned id of an inbound message (used as reply target)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// User search text, guaranteed non-empty after trimming
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Join argument tokens with single spaces
    ///
    /// Returns `None` when nothing but whitespace remains.
    ///
    /// ```
    /// use media_fetch::Query;
    ///
    /// let q = Query::from_args(["never", "gonna"]).unwrap();
    /// assert_eq!(q.as_str(), "never gonna");
    /// assert!(Query::from_args(["  ", ""]).is_none());
    /// ```
    pub fn from_args<I, S>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = args
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(joined)
    }

    /// Wrap already-joined text; `None` when blank
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The query text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stage-1 resolution result
///
/// All fields are non-empty; the resolver rejects anything else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// Display title
    pub title: String,
    /// Opaque key for stage-2 lookup (the item's URL upstream)
    pub canonical_key: String,
    /// Display duration, as upstream formats it (e.g. "3:45")
    pub duration: String,
}

impl MediaReference {
    /// Caption sent with the attachment
    pub fn caption(&self) -> String {
        format!(
            "Now Playing: {}\nTitle: {}\nDuration: {}",
            self.title, self.title, self.duration
        )
    }
}

/// Direct location of the media bytes (absolute http(s) URL)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamLocation(pub(crate) String);

impl StreamLocation {
    /// Accept `raw` if it is an absolute http(s) URL
    ///
    /// ```
    /// use media_fetch::StreamLocation;
    ///
    /// assert!(StreamLocation::parse("https://cdn.example.com/x.bin").is_some());
    /// assert!(StreamLocation::parse("file:///etc/passwd").is_none());
    /// assert!(StreamLocation::parse("").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => Some(Self(raw.to_string())),
            _ => None,
        }
    }

    /// The URL as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StreamLocation {
    type Error = ResolutionError;

    fn try_from(raw: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| ResolutionError::Malformed {
            field: "stream_location".to_string(),
        })
    }
}

impl From<StreamLocation> for String {
    fn from(location: StreamLocation) -> Self {
        location.0
    }
}

impl std::fmt::Display for StreamLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Invocation state machine
///
/// ```text
/// Validating -> ResolvingRef -> ResolvingStream -> Downloading -> Delivering -> Cleanup -> Done
/// any (except Done) -> Failed -> Cleanup -> Done
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Checking the query
    Validating,
    /// Stage-1 lookup (query -> reference)
    ResolvingRef,
    /// Stage-2 lookup (reference -> stream location)
    ResolvingStream,
    /// Streaming bytes into the transient file
    Downloading,
    /// Sending the attachment
    Delivering,
    /// Failure reported, about to clean up
    Failed,
    /// Removing the transient file, retracting the status message
    Cleanup,
    /// Terminal
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::ResolvingRef => "resolving_ref",
            Stage::ResolvingStream => "resolving_stream",
            Stage::Downloading => "downloading",
            Stage::Delivering => "delivering",
            Stage::Failed => "failed",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the user saw for one invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Empty query; prompt sent, nothing else happened
    Prompted,
    /// Attachment sent and status message retracted
    Delivered {
        /// Title of the delivered item
        title: String,
        /// Attachment size in bytes
        bytes: u64,
    },
    /// Uniform failure message sent
    Failed {
        /// Stage that failed
        stage: Stage,
        /// [`Error::kind`](crate::Error::kind) of the failure
        kind: &'static str,
    },
}

/// Event emitted during an invocation
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The state machine moved to `stage`
    StageEntered {
        /// Invocation ID
        id: InvocationId,
        /// New stage
        stage: Stage,
    },

    /// A transient file was created
    BlobAllocated {
        /// Invocation ID
        id: InvocationId,
        /// Path of the new file
        path: PathBuf,
    },

    /// Deletion of the transient file was attempted
    BlobDeleted {
        /// Invocation ID
        id: InvocationId,
        /// Whether this call removed a file (false if it was already gone or removal failed)
        removed: bool,
    },

    /// The status message was taken back
    StatusRetracted {
        /// Invocation ID
        id: InvocationId,
    },

    /// Media delivered
    Delivered {
        /// Invocation ID
        id: InvocationId,
        /// Title of the item
        title: String,
        /// Attachment size in bytes
        bytes: u64,
    },

    /// Invocation failed
    Failed {
        /// Invocation ID
        id: InvocationId,
        /// Stage that failed
        stage: Stage,
        /// Error kind label
        kind: String,
    },
}
