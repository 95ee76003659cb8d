//! Upstream mocks, configs and event helpers

use media_fetch::types::MessageId;
use media_fetch::{Command, Config, Event, InvocationId};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Search endpoint path on the mock upstream
pub const SEARCH_PATH: &str = "/api/ytsearch";

/// Config pointing at `server`, keeping transient files under `dir`
pub fn test_config(server_uri: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.resolver.endpoint = format!("{server_uri}{SEARCH_PATH}");
    config.resolver.query_prefix = String::new();
    config.resolver.request_timeout = Duration::from_secs(5);
    config.download.timeout = Duration::from_secs(5);
    config.download.connect_timeout = Duration::from_secs(2);
    config.messages.send_timeout = Duration::from_secs(2);
    config.store.temp_dir = dir.join("transient");
    config
}

/// Command from thread "thread-1", replying to message "msg-in"
pub fn command(args: &[&str]) -> Command {
    Command::new(
        "thread-1",
        Some(MessageId::from("msg-in")),
        args.iter().map(|s| s.to_string()).collect(),
    )
}

/// Mount a stage-1 answer for `query`
pub async fn mount_search(server: &MockServer, query: &str, title: &str, key: &str, duration: &str) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "title": title, "url": key, "duration": duration }]
        })))
        .mount(server)
        .await;
}

/// Mount a stage-2 answer for `key` pointing at `media_path` on the same server
pub async fn mount_locate(server: &MockServer, key: &str, media_path: &str) {
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("q", key))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "download_url": format!("{}{}", server.uri(), media_path)
        })))
        .mount(server)
        .await;
}

/// Mount the media bytes at `media_path`
pub async fn mount_media(server: &MockServer, media_path: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Files currently in the transient directory
pub fn transient_files(config: &Config) -> Vec<PathBuf> {
    match std::fs::read_dir(&config.store.temp_dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Allocation/deletion bookkeeping drained from the event channel
#[derive(Debug, Default)]
pub struct BlobLedger {
    pub allocated: Vec<(InvocationId, PathBuf)>,
    pub deleted: Vec<(InvocationId, bool)>,
    pub retracted: usize,
    pub stages: Vec<media_fetch::Stage>,
}

pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> BlobLedger {
    let mut ledger = BlobLedger::default();
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::BlobAllocated { id, path } => ledger.allocated.push((id, path)),
            Event::BlobDeleted { id, removed } => ledger.deleted.push((id, removed)),
            Event::StatusRetracted { .. } => ledger.retracted += 1,
            Event::StageEntered { stage, .. } => ledger.stages.push(stage),
            _ => {}
        }
    }
    ledger
}

/// 500 000 bytes of recognisable content
pub fn sample_media(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 251) as u8)).collect()
}
