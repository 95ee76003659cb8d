//! Configuration types for media-fetch

use crate::command::CommandInfo;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Upstream resolver settings (both lookup stages share one endpoint)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Search endpoint queried by stage 1 and stage 2
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Query-string parameter carrying the lookup term (default: "q")
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// Literal prepended to every lookup term before it is sent
    ///
    /// The upstream search API expects this marker in front of both the free-text query
    /// and the stage-1 item URL.
    #[serde(default = "default_query_prefix")]
    pub query_prefix: String,

    /// Field holding the stage-1 result list (default: "items")
    #[serde(default = "default_results_field")]
    pub results_field: String,

    /// Field holding the stage-2 stream location (default: "download_url")
    #[serde(default = "default_stream_field")]
    pub stream_field: String,

    /// Bound on each lookup round-trip, body included (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            query_param: default_query_param(),
            query_prefix: default_query_prefix(),
            results_field: default_results_field(),
            stream_field: default_stream_field(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Media download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Overall bound on one download, from request to last byte (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Bound on establishing the connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// User-Agent sent with media requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: default_download_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Transient file placement
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding in-flight downloads (default: "<system temp>/media-fetch")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// File name prefix, followed by the invocation id (default: "media")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// File extension, also used for the outgoing attachment name (default: "mp3")
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            file_prefix: default_file_prefix(),
            extension: default_extension(),
        }
    }
}

/// User-facing message texts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Reply to an empty query
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Interim status text; `{query}` is replaced with the search term
    #[serde(default = "default_searching")]
    pub searching: String,

    /// The single failure reply, whatever stage failed
    #[serde(default = "default_failure")]
    pub failure: String,

    /// Bound on each message sent to the host (default: 30 seconds)
    ///
    /// A send that takes longer is abandoned and logged; the invocation carries on.
    #[serde(default = "default_send_timeout", with = "duration_secs")]
    pub send_timeout: Duration,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            searching: default_searching(),
            failure: default_failure(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl MessageConfig {
    /// Render the status text for `query`
    pub fn searching_for(&self, query: &str) -> String {
        self.searching.replace("{query}", query)
    }
}

/// Main configuration for [`MediaPipeline`](crate::MediaPipeline)
///
/// Every field has a default, so `Config::default()` works against the public upstream.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Resolver endpoint and lookup settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Media download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Transient file placement
    #[serde(default)]
    pub store: StoreConfig,

    /// User-facing texts
    #[serde(default)]
    pub messages: MessageConfig,

    /// Command registration metadata
    #[serde(default)]
    pub command: CommandInfo,

    /// Overall deadline for one invocation (None = only per-call bounds apply)
    #[serde(default, with = "duration_secs::option")]
    pub invocation_timeout: Option<Duration>,
}

impl Config {
    /// Check the configuration for values the pipeline cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        match url::Url::parse(&self.resolver.endpoint) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(u) => {
                return Err(config_error(
                    format!("unsupported endpoint scheme: {}", u.scheme()),
                    "resolver.endpoint",
                ));
            }
            Err(e) => {
                return Err(config_error(
                    format!("invalid endpoint URL: {e}"),
                    "resolver.endpoint",
                ));
            }
        }

        let required = [
            (&self.resolver.query_param, "resolver.query_param"),
            (&self.resolver.results_field, "resolver.results_field"),
            (&self.resolver.stream_field, "resolver.stream_field"),
            (&self.command.name, "command.name"),
        ];
        for (value, key) in required {
            if value.trim().is_empty() {
                return Err(config_error("must not be empty", key));
            }
        }

        let bounds = [
            (self.resolver.request_timeout, "resolver.request_timeout"),
            (self.download.timeout, "download.timeout"),
            (self.download.connect_timeout, "download.connect_timeout"),
            (self.messages.send_timeout, "messages.send_timeout"),
        ];
        for (value, key) in bounds {
            if value.is_zero() {
                return Err(config_error("timeout must be greater than zero", key));
            }
        }
        if self.invocation_timeout.is_some_and(|t| t.is_zero()) {
            return Err(config_error(
                "timeout must be greater than zero",
                "invocation_timeout",
            ));
        }

        for (value, key) in [
            (&self.store.file_prefix, "store.file_prefix"),
            (&self.store.extension, "store.extension"),
        ] {
            if value.is_empty() || value.contains(|c: char| matches!(c, '/' | '\\' | '.')) {
                return Err(config_error(
                    "must be a non-empty plain name without separators",
                    key,
                ));
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_endpoint() -> String {
    "https://kaiz-apis.gleeze.com/api/ytsearch".to_string()
}

fn default_query_param() -> String {
    "q".to_string()
}

fn default_query_prefix() -> String {
    "kisapmata".to_string()
}

fn default_results_field() -> String {
    "items".to_string()
}

fn default_stream_field() -> String {
    "download_url".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("media-fetch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300) // 5 minutes
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("media-fetch")
}

fn default_file_prefix() -> String {
    "media".to_string()
}

fn default_extension() -> String {
    "mp3".to_string()
}

fn default_prompt() -> String {
    "Please provide a search term. For example:\n\nytmp3 apt".to_string()
}

fn default_searching() -> String {
    "Searching for: {query}".to_string()
}

fn default_failure() -> String {
    "Failed to fetch or send the media. Please try again later.".to_string()
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Durations as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }

    /// Same, for `Option<Duration>` (absent or null means no bound)
    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(|d| d.as_secs()).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
        }
    }
}
