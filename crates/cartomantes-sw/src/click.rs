//! Notification click routing.

use std::sync::Arc;

use cartomantes_common::DiagnosticExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::WorkerConfig;
use crate::error::SwResult;
use crate::host::{ClientHost, ClientId, ClientMatchOptions, Registration};
use crate::notify::NotificationRecord;

/// A click on a displayed notification.
#[derive(Debug, Clone)]
pub struct NotificationClick {
    /// Tag of the clicked notification.
    pub tag: String,
    /// `data.url` attached to the notification, if any.
    pub url: Option<String>,
}

impl From<&NotificationRecord> for NotificationClick {
    fn from(record: &NotificationRecord) -> Self {
        Self {
            tag: record.options.tag.clone(),
            url: Some(record.options.data.url.to_string()),
        }
    }
}

/// How a click was routed. Exactly one of focus or open happens per click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An existing page was focused and navigated.
    Focused(ClientId),
    /// A new page was opened.
    Opened(ClientId),
    /// The host could neither focus nor open a page.
    Unrouted,
}

/// Notification click handler.
pub struct ClickRouter {
    config: Arc<WorkerConfig>,
    clients: Arc<dyn ClientHost>,
    registration: Arc<dyn Registration>,
}

impl ClickRouter {
    pub fn new(
        config: Arc<WorkerConfig>,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
    ) -> Self {
        Self {
            config,
            clients,
            registration,
        }
    }

    /// Absolute target of a click.
    pub fn target(&self, click: &NotificationClick) -> Url {
        match click.url.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => self.config.resolve(raw),
            None => self.config.landing_url(),
        }
    }

    /// Close the notification, then focus an open page or open a new one.
    pub async fn route(&self, click: &NotificationClick) -> ClickOutcome {
        self.registration
            .close_notification(&click.tag)
            .await
            .or_debug("Failed to close notification");

        let target = self.target(click);
        let candidates = self
            .clients
            .match_all(ClientMatchOptions::all_windows())
            .await
            .or_warn("Failed to enumerate clients")
            .unwrap_or_default();

        for client in candidates {
            match self.focus_and_navigate(&client.id, &target).await {
                Ok(()) => {
                    info!(client = %client.id, target = %target, "Focused existing page");
                    return ClickOutcome::Focused(client.id);
                }
                Err(error) => debug!(client = %client.id, %error, "Skipping client"),
            }
        }

        match self.clients.open_window(&target).await {
            Ok(client) => {
                info!(client = %client.id, target = %target, "Opened new page");
                ClickOutcome::Opened(client.id)
            }
            Err(error) => {
                warn!(target = %target, %error, "Could not open a page");
                ClickOutcome::Unrouted
            }
        }
    }

    /// Focus `id`, then navigate it to `target`.
    ///
    /// A client that takes focus but refuses navigation does not count: it stays
    /// focused and routing moves on to the next client or a new window.
    async fn focus_and_navigate(&self, id: &ClientId, target: &Url) -> SwResult<()> {
        self.clients.focus(id).await?;
        self.clients.navigate(id, target).await
    }
}
