//! Checks run by the CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use cartomantes_sw::memory::{MemoryClients, MemoryRegistration, RouteFetcher};
use cartomantes_sw::{
    EventOutcome, Fetcher, HttpFetcher, NotificationRecord, OfflineWorker, WorkerConfig,
    WorkerEvent,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;
use url::Url;

/// Load and validate a worker configuration.
pub fn load_config(path: &Path) -> anyhow::Result<WorkerConfig> {
    WorkerConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

/// Replace the registration scope and validate the result.
pub fn with_scope(mut config: WorkerConfig, scope: Url) -> anyhow::Result<WorkerConfig> {
    config.scope = scope;
    config
        .validate()
        .with_context(|| format!("invalid scope {}", config.scope))?;
    Ok(config)
}

/// Precache report.
#[derive(Debug, Serialize)]
pub struct PrecacheReport {
    pub cache: String,
    pub cached: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

#[derive(Debug, Serialize)]
pub struct FailedEntry {
    pub entry: String,
    pub reason: String,
}

/// Run the install step over real HTTP.
pub async fn precache(config: WorkerConfig) -> anyhow::Result<PrecacheReport> {
    let fetcher = HttpFetcher::new(&config.user_agent)?;
    precache_with(config, Arc::new(fetcher)).await
}

async fn precache_with(
    config: WorkerConfig,
    fetcher: Arc<dyn Fetcher>,
) -> anyhow::Result<PrecacheReport> {
    info!(scope = %config.scope, entries = config.app_shell.len(), "Precaching app shell");
    let worker = OfflineWorker::new(
        config,
        fetcher,
        Arc::new(MemoryClients::new()),
        Arc::new(MemoryRegistration::new()),
    );

    let EventOutcome::Installed(report) = worker.dispatch_and_settle(WorkerEvent::Install).await
    else {
        bail!("install produced no report");
    };

    Ok(PrecacheReport {
        cache: report.cache_name,
        cached: report.cached.iter().map(|url| url.to_string()).collect(),
        failed: report
            .failed
            .into_iter()
            .map(|failure| FailedEntry {
                entry: failure.entry,
                reason: failure.reason,
            })
            .collect(),
    })
}

/// A payload to preview.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Raw push message data, if any.
    Push(Option<Vec<u8>>),
    /// Message posted by a page.
    Message(JsonValue),
    /// Cloud-messaging background message.
    Background(JsonValue),
}

/// Show `payload` on an offline host and return the notification it produced.
pub async fn preview(config: WorkerConfig, payload: Payload) -> anyhow::Result<NotificationRecord> {
    let worker = OfflineWorker::new(
        config,
        Arc::new(RouteFetcher::new()),
        Arc::new(MemoryClients::new()),
        Arc::new(MemoryRegistration::new()),
    );

    let event = match payload {
        Payload::Push(data) => WorkerEvent::Push(data.map(Bytes::from)),
        Payload::Message(message) => WorkerEvent::Message(message),
        Payload::Background(message) => WorkerEvent::BackgroundMessage(message),
    };
    let kind = event.name();

    match worker.dispatch_and_settle(event).await {
        EventOutcome::Notified(record) => Ok(record),
        other => bail!("{kind} event shows no notification ({other:?})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartomantes_sw::Response;
    use serde_json::json;

    fn config() -> WorkerConfig {
        WorkerConfig::new("v1", Url::parse("https://cartomantes.github.io/app/").unwrap())
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sw.json");
        std::fs::write(
            &path,
            r#"{"version": "v9", "scope": "https://cartomantes.github.io/app/"}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.scope.as_str(), "https://cartomantes.github.io/app/");
        assert_eq!(config.app_name, "Cartomantes Online");
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_scope_override_is_validated() {
        let config = with_scope(
            config(),
            Url::parse("https://cartomantes.netlify.app/").unwrap(),
        )
        .unwrap();
        assert_eq!(config.origin().ascii_serialization(), "https://cartomantes.netlify.app");

        assert!(with_scope(config, Url::parse("file:///srv/app/").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_precache_reports_failures() {
        let mut config = config();
        config.app_shell = vec!["./".into(), "./gone.html".into()];
        let fetcher = Arc::new(RouteFetcher::new());
        fetcher
            .route(&config.scope, Response::new(200, "<html>"))
            .await;

        let report = precache_with(config, fetcher).await.unwrap();
        assert_eq!(report.cache, "cartomantes-cache-v1");
        assert_eq!(report.cached, vec!["https://cartomantes.github.io/app/"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].entry, "./gone.html");
    }

    #[tokio::test]
    async fn test_preview_empty_push() {
        let record = preview(config(), Payload::Push(None)).await.unwrap();
        assert_eq!(record.title, "Cartomantes Online");
        assert_eq!(
            record.target().as_str(),
            "https://cartomantes.github.io/app/leituras.html?pwa=true"
        );
    }

    #[tokio::test]
    async fn test_preview_local_notify() {
        let message = json!({"type": "LOCAL_NOTIFY", "title": "Oi", "tag": "t1"});
        let record = preview(config(), Payload::Message(message)).await.unwrap();
        assert_eq!(record.title, "Oi");
        assert_eq!(record.tag(), "t1");
    }

    #[tokio::test]
    async fn test_preview_rejects_non_notifying_message() {
        let message = json!({"type": "SKIP_WAITING"});
        assert!(preview(config(), Payload::Message(message)).await.is_err());
    }
}
