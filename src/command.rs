//! Inbound chat command surface

use crate::config::duration_secs;
use crate::error::{Error, Result};
use crate::types::{MessageId, Query, ThreadId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration metadata for the search command
///
/// The host's command router uses this to dispatch and rate-limit; the pipeline itself
/// only reads `name` and `aliases`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Primary command word (default: "ytmp3")
    #[serde(default = "default_name")]
    pub name: String,

    /// Alternative command words (default: ["sing"])
    #[serde(default = "default_aliases")]
    pub aliases: Vec<String>,

    /// Usage line shown by help listings
    #[serde(default = "default_usage")]
    pub usage: String,

    /// One-line description
    #[serde(default = "default_description")]
    pub description: String,

    /// Per-user cooldown the host should enforce between invocations (default: 5 seconds)
    #[serde(default = "default_cooldown", with = "duration_secs")]
    pub cooldown: Duration,
}

impl Default for CommandInfo {
    fn default() -> Self {
        Self {
            name: default_name(),
            aliases: default_aliases(),
            usage: default_usage(),
            description: default_description(),
            cooldown: default_cooldown(),
        }
    }
}

impl CommandInfo {
    /// Whether `word` names this command (case-insensitive, aliases included)
    pub fn matches(&self, word: &str) -> bool {
        self.name.eq_ignore_ascii_case(word)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(word))
    }
}

fn default_name() -> String {
    "ytmp3".to_string()
}

fn default_aliases() -> Vec<String> {
    vec!["sing".to_string()]
}

fn default_usage() -> String {
    "ytmp3 [search term]".to_string()
}

fn default_description() -> String {
    "Search and download music using a keyword".to_string()
}

fn default_cooldown() -> Duration {
    Duration::from_secs(5)
}

/// Split a raw chat line into argument tokens if it invokes this command
///
/// `prefix` is the bot's command prefix (may be empty).
///
/// ```
/// use media_fetch::command::{parse_command_line, CommandInfo};
///
/// let info = CommandInfo::default();
/// let args = parse_command_line("!sing  apt  ", "!", &info).unwrap();
/// assert_eq!(args, vec!["apt".to_string()]);
/// assert!(parse_command_line("!help", "!", &info).is_none());
/// ```
pub fn parse_command_line(text: &str, prefix: &str, info: &CommandInfo) -> Option<Vec<String>> {
    let rest = text.trim_start().strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let word = tokens.next()?;
    if !info.matches(word) {
        return None;
    }
    Some(tokens.map(str::to_string).collect())
}

/// One inbound command addressed to the pipeline
#[derive(Clone, Debug)]
pub struct Command {
    /// Thread to answer in
    pub thread_id: ThreadId,
    /// Triggering message (replies thread under it when set)
    pub message_id: Option<MessageId>,
    /// Argument tokens after the command word
    pub args: Vec<String>,
}

impl Command {
    /// Build a command from its parts
    pub fn new(
        thread_id: impl Into<ThreadId>,
        message_id: Option<MessageId>,
        args: Vec<String>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            message_id,
            args,
        }
    }

    /// The search query
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when no argument is left after trimming.
    pub fn query(&self) -> Result<Query> {
        Query::from_args(&self.args)
            .ok_or_else(|| Error::Validation("search term is empty".to_string()))
    }
}
