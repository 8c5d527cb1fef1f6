//! Push subscription re-registration.
//!
//! When the browser rotates the push subscription, the new one is posted to the
//! push-registration server so pushes keep arriving. One attempt, no retry.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::config::WorkerConfig;
use crate::error::{SwError, SwResult};
use crate::host::Fetcher;
use crate::request::Request;

/// A `pushsubscriptionchange` event.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub old_subscription: Option<JsonValue>,
    pub new_subscription: Option<JsonValue>,
}

/// Body posted to the push-registration endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResubscribeBody {
    pub subscription: JsonValue,
    pub page: String,
    pub site: String,
    pub app: String,
    pub created_at: String,
    pub ua: String,
}

/// Posts rotated subscriptions to the push server.
pub struct Resubscriber {
    config: Arc<WorkerConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl Resubscriber {
    pub fn new(config: Arc<WorkerConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Build the registration body for `subscription`.
    pub fn body(&self, subscription: JsonValue) -> ResubscribeBody {
        ResubscribeBody {
            subscription,
            page: self.config.scope.to_string(),
            site: self.config.origin().ascii_serialization(),
            app: self.config.app_name.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            ua: self.config.user_agent.clone(),
        }
    }

    /// Re-register the new subscription. `Ok(false)` when there is nothing to post.
    pub async fn on_change(&self, change: &SubscriptionChange) -> SwResult<bool> {
        let Some(endpoint) = self.config.resubscribe_endpoint.clone() else {
            return Ok(false);
        };
        let Some(subscription) = change.new_subscription.clone() else {
            return Ok(false);
        };

        let body = serde_json::to_vec(&self.body(subscription))?;
        let request = Request::post_json(endpoint, Bytes::from(body));
        let response = self.fetcher.fetch(&request).await?;
        if !response.ok() {
            return Err(SwError::network(format!(
                "push registration answered with status {}",
                response.status
            )));
        }

        info!(endpoint = %request.url, "Push subscription re-registered");
        Ok(true)
    }
}
