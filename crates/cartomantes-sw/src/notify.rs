//! Notification dispatch: normalize a payload and show exactly one notification.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};
use url::Url;

use crate::config::WorkerConfig;
use crate::error::SwResult;
use crate::host::Registration;
use crate::message::NotificationFields;

/// Where a notification came from. Selects the prefix of generated tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSource {
    /// `LOCAL_NOTIFY` message from a page.
    Local,
    /// Web push message.
    Push,
    /// Cloud-messaging background message.
    Messaging,
}

impl NotificationSource {
    fn tag_prefix(self) -> &'static str {
        match self {
            Self::Local => "co",
            Self::Push => "co-push",
            Self::Messaging => "co-fcm",
        }
    }
}

/// Data attached to a notification, read back on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: Url,
}

/// `showNotification` options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: String,
    pub icon: Url,
    pub badge: Url,
    pub tag: String,
    pub renotify: bool,
    pub require_interaction: bool,
    pub data: NotificationData,
}

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub title: String,
    pub options: NotificationOptions,
}

impl NotificationRecord {
    pub fn tag(&self) -> &str {
        &self.options.tag
    }

    /// Absolute navigation target.
    pub fn target(&self) -> &Url {
        &self.options.data.url
    }
}

/// Applies defaults and resolves URLs against the registration scope.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: Arc<WorkerConfig>,
}

impl Normalizer {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self { config }
    }

    /// Build the record for `fields`.
    pub fn normalize(&self, fields: NotificationFields, source: NotificationSource) -> NotificationRecord {
        let config = &self.config;
        let url = match fields.url {
            Some(raw) => config.resolve(&raw),
            None => config.landing_url(),
        };

        NotificationRecord {
            title: fields.title.unwrap_or_else(|| config.app_name.clone()),
            options: NotificationOptions {
                body: fields.body.unwrap_or_else(|| config.default_body.clone()),
                icon: config.resolve(&config.icon),
                badge: config.resolve(&config.badge),
                tag: fields.tag.unwrap_or_else(|| generate_tag(source)),
                // A reused tag must still alert the user.
                renotify: true,
                require_interaction: false,
                data: NotificationData { url },
            },
        }
    }
}

/// Time-based tag, unique enough that default-tagged notifications never collapse.
fn generate_tag(source: NotificationSource) -> String {
    format!(
        "{}-{}-{:08x}",
        source.tag_prefix(),
        chrono::Utc::now().timestamp_millis(),
        rand::thread_rng().gen::<u32>()
    )
}

/// Shows one notification per dispatched payload.
pub struct NotificationDispatcher {
    normalizer: Normalizer,
    registration: Arc<dyn Registration>,
}

impl NotificationDispatcher {
    pub fn new(config: Arc<WorkerConfig>, registration: Arc<dyn Registration>) -> Self {
        Self {
            normalizer: Normalizer::new(config),
            registration,
        }
    }

    /// Normalize `fields` and show the notification.
    pub async fn dispatch(
        &self,
        fields: NotificationFields,
        source: NotificationSource,
    ) -> SwResult<NotificationRecord> {
        let record = self.normalizer.normalize(fields, source);
        self.registration.show_notification(&record).await?;
        info!(
            source = ?source,
            tag = %record.options.tag,
            target = %record.options.data.url,
            "Notification shown"
        );
        Ok(record)
    }

    /// Handle a push message.
    pub async fn on_push(&self, data: Option<&[u8]>) -> SwResult<NotificationRecord> {
        debug!(bytes = data.map_or(0, <[u8]>::len), "Push received");
        self.dispatch(NotificationFields::from_push(data), NotificationSource::Push)
            .await
    }

    /// Handle a cloud-messaging background message.
    pub async fn on_background_message(&self, payload: &JsonValue) -> SwResult<NotificationRecord> {
        self.dispatch(
            NotificationFields::from_messaging(payload),
            NotificationSource::Messaging,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        let scope = Url::parse("https://cartomantes.github.io/app/").unwrap();
        Normalizer::new(Arc::new(WorkerConfig::new("v1", scope)))
    }

    #[test]
    fn test_defaults_for_empty_fields() {
        let record = normalizer().normalize(NotificationFields::default(), NotificationSource::Push);
        assert_eq!(record.title, "Cartomantes Online");
        assert_eq!(record.options.body, "Você tem uma nova atualização.");
        assert_eq!(
            record.target().as_str(),
            "https://cartomantes.github.io/app/leituras.html?pwa=true"
        );
        assert_eq!(
            record.options.icon.as_str(),
            "https://cartomantes.github.io/app/logo.png"
        );
        assert!(record.options.renotify);
        assert!(record.tag().starts_with("co-push-"));
    }

    #[test]
    fn test_explicit_fields_are_kept() {
        let record = normalizer().normalize(
            NotificationFields {
                title: Some("Nova mensagem".to_string()),
                body: Some("Abra o painel".to_string()),
                url: Some("/app/painel.html".to_string()),
                tag: Some("painel".to_string()),
            },
            NotificationSource::Local,
        );
        assert_eq!(record.title, "Nova mensagem");
        assert_eq!(record.options.body, "Abra o painel");
        assert_eq!(record.tag(), "painel");
        assert_eq!(
            record.target().as_str(),
            "https://cartomantes.github.io/app/painel.html"
        );
    }

    #[test]
    fn test_scheme_relative_url_becomes_absolute() {
        let record = normalizer().normalize(
            NotificationFields {
                url: Some("//cartomantes.github.io/app/x.html".to_string()),
                ..Default::default()
            },
            NotificationSource::Messaging,
        );
        assert_eq!(record.target().scheme(), "https");
    }

    #[test]
    fn test_generated_tags_differ() {
        let a = generate_tag(NotificationSource::Local);
        let b = generate_tag(NotificationSource::Local);
        assert_ne!(a, b);
        assert!(a.starts_with("co-"));
        assert!(generate_tag(NotificationSource::Messaging).starts_with("co-fcm-"));
    }

    #[test]
    fn test_record_serializes_like_show_notification_options() {
        let record = normalizer().normalize(
            NotificationFields {
                tag: Some("t".to_string()),
                ..Default::default()
            },
            NotificationSource::Local,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["options"]["requireInteraction"], false);
        assert_eq!(value["options"]["renotify"], true);
        assert_eq!(value["options"]["tag"], "t");
    }
}
