//! Install and activate handling.
//!
//! Install precaches the app shell into the current generation, one request per
//! entry, and never fails as a whole. Activate evicts every other generation of this
//! app, claims the clients and tells them a new version took over.

use std::sync::Arc;

use cartomantes_common::DiagnosticExt;
use futures::future::join_all;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::SharedCaches;
use crate::config::WorkerConfig;
use crate::error::{SwError, SwResult};
use crate::host::{ClientHost, ClientMatchOptions, Fetcher, Registration};
use crate::message::WorkerMessage;
use crate::request::{CacheMode, Request, Response};

/// An app-shell entry that could not be cached.
#[derive(Debug, Clone)]
pub struct InstallFailure {
    /// Entry as listed in the app shell.
    pub entry: String,
    pub reason: String,
}

/// Result of an install.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub cache_name: String,
    /// URLs now present in the current generation.
    pub cached: Vec<Url>,
    pub failed: Vec<InstallFailure>,
}

impl InstallReport {
    /// Whether every app-shell entry was cached.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of an activation.
#[derive(Debug, Clone, Default)]
pub struct ActivateReport {
    /// Generations deleted.
    pub deleted: Vec<String>,
    /// Clients that received `SW_UPDATED`.
    pub notified: usize,
}

/// Install/activate handler.
pub struct Lifecycle {
    config: Arc<WorkerConfig>,
    caches: SharedCaches,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<dyn ClientHost>,
    registration: Arc<dyn Registration>,
}

impl Lifecycle {
    pub fn new(
        config: Arc<WorkerConfig>,
        caches: SharedCaches,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
    ) -> Self {
        Self {
            config,
            caches,
            fetcher,
            clients,
            registration,
        }
    }

    /// Precache the app shell, then skip the waiting phase.
    pub async fn install(&self) -> InstallReport {
        let cache_name = self.config.cache_name();
        self.caches.write().await.open(&cache_name);

        let fetches = self
            .config
            .app_shell
            .iter()
            .map(|entry| self.fetch_shell_entry(entry));
        let results = join_all(fetches).await;

        let mut report = InstallReport {
            cache_name: cache_name.clone(),
            ..Default::default()
        };
        {
            let mut caches = self.caches.write().await;
            let cache = caches.open(&cache_name);
            for (entry, result) in self.config.app_shell.iter().zip(results) {
                let stored = result.and_then(|(request, response)| {
                    cache.put(&request, &response)?;
                    Ok(request.url)
                });
                match stored {
                    Ok(url) => report.cached.push(url),
                    Err(error) => {
                        warn!(entry = %entry, %error, "App shell entry not cached");
                        report.failed.push(InstallFailure {
                            entry: entry.clone(),
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            cache = %cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );

        self.skip_waiting().await;
        report
    }

    async fn fetch_shell_entry(&self, entry: &str) -> SwResult<(Request, Response)> {
        let url = self.config.scope.join(entry)?;
        let request = Request::get(url).cache(CacheMode::Reload);
        let response = self.fetcher.fetch(&request).await?;
        if !response.ok() {
            return Err(SwError::network(format!(
                "{} answered with status {}",
                request.url, response.status
            )));
        }
        Ok((request, response))
    }

    /// Ask the host to activate this version right away.
    pub async fn skip_waiting(&self) {
        if self
            .registration
            .skip_waiting()
            .await
            .or_warn("skipWaiting failed")
            .is_some()
        {
            debug!(version = %self.config.version, "Skipped waiting");
        }
    }

    /// Evict stale generations, claim clients, announce the new version.
    pub async fn activate(&self) -> ActivateReport {
        let current = self.config.cache_name();
        let deleted = {
            let mut caches = self.caches.write().await;
            let stale: Vec<String> = caches
                .keys()
                .into_iter()
                .filter(|name| self.config.owns_cache(name) && *name != current)
                .collect();
            for name in &stale {
                caches.delete(name);
            }
            stale
        };
        for name in &deleted {
            info!(cache = %name, "Deleted stale cache");
        }

        self.clients.claim().await.or_warn("Failed to claim clients");

        let notified = if self.config.broadcast_updates {
            self.broadcast_update().await
        } else {
            0
        };

        info!(version = %self.config.version, notified, "Activated");
        ActivateReport { deleted, notified }
    }

    async fn broadcast_update(&self) -> usize {
        let Some(clients) = self
            .clients
            .match_all(ClientMatchOptions::all_windows())
            .await
            .or_warn("Failed to enumerate clients")
        else {
            return 0;
        };

        let message = WorkerMessage::SwUpdated {
            version: self.config.version.clone(),
        };
        let mut notified = 0;
        for client in &clients {
            if self
                .clients
                .post_message(&client.id, &message)
                .await
                .or_debug("Update notice not delivered")
                .is_some()
            {
                notified += 1;
            }
        }
        notified
    }
}
