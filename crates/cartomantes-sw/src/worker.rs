//! The worker: routes host events to their handlers.

use std::sync::Arc;

use cartomantes_common::DiagnosticExt;
use tracing::{debug, info_span, Instrument};

use crate::cache::{CacheStorage, SharedCaches};
use crate::click::ClickRouter;
use crate::config::WorkerConfig;
use crate::event::{Dispatched, EventOutcome, ExtendableEvent, WorkerEvent};
use crate::fetch::FetchInterceptor;
use crate::host::{ClientHost, Fetcher, Registration};
use crate::lifecycle::Lifecycle;
use crate::message::ClientMessage;
use crate::notify::{NotificationDispatcher, NotificationSource};
use crate::subscription::Resubscriber;

/// Offline cache and notification worker.
///
/// Handler failures are logged here and degrade to a fallback or a no-op; nothing
/// escapes [`OfflineWorker::dispatch`].
pub struct OfflineWorker {
    config: Arc<WorkerConfig>,
    caches: SharedCaches,
    lifecycle: Lifecycle,
    interceptor: FetchInterceptor,
    notifications: NotificationDispatcher,
    clicks: ClickRouter,
    resubscriber: Resubscriber,
}

impl OfflineWorker {
    /// Create a worker with fresh cache storage.
    pub fn new(
        config: WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
    ) -> Self {
        Self::with_caches(config, CacheStorage::shared(), fetcher, clients, registration)
    }

    /// Create a worker over existing cache storage, as left by a previous version.
    pub fn with_caches(
        config: WorkerConfig,
        caches: SharedCaches,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<dyn ClientHost>,
        registration: Arc<dyn Registration>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            lifecycle: Lifecycle::new(
                Arc::clone(&config),
                Arc::clone(&caches),
                Arc::clone(&fetcher),
                Arc::clone(&clients),
                Arc::clone(&registration),
            ),
            interceptor: FetchInterceptor::new(
                Arc::clone(&config),
                Arc::clone(&caches),
                Arc::clone(&fetcher),
            ),
            notifications: NotificationDispatcher::new(Arc::clone(&config), Arc::clone(&registration)),
            clicks: ClickRouter::new(Arc::clone(&config), clients, registration),
            resubscriber: Resubscriber::new(Arc::clone(&config), fetcher),
            config,
            caches,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Cache storage of this worker.
    pub fn caches(&self) -> &SharedCaches {
        &self.caches
    }

    /// Handle one event.
    pub async fn dispatch(&self, event: WorkerEvent) -> Dispatched {
        let span = info_span!("event", kind = event.name(), version = %self.config.version);
        let mut extendable = ExtendableEvent::new();
        let outcome = self.handle(event, &mut extendable).instrument(span).await;
        Dispatched {
            outcome,
            event: extendable,
        }
    }

    /// Handle one event and wait until its lifetime extensions complete.
    pub async fn dispatch_and_settle(&self, event: WorkerEvent) -> EventOutcome {
        self.dispatch(event).await.settle().await
    }

    async fn handle(&self, event: WorkerEvent, extendable: &mut ExtendableEvent) -> EventOutcome {
        match event {
            WorkerEvent::Install => EventOutcome::Installed(self.lifecycle.install().await),
            WorkerEvent::Activate => EventOutcome::Activated(self.lifecycle.activate().await),
            WorkerEvent::Fetch(request) => {
                EventOutcome::Fetch(self.interceptor.handle(&request, extendable).await)
            }
            WorkerEvent::Message(raw) => self.on_message(ClientMessage::parse(&raw)).await,
            WorkerEvent::Push(data) => self
                .notifications
                .on_push(data.as_deref())
                .await
                .or_warn("Push notification not shown")
                .map_or(EventOutcome::Ignored, EventOutcome::Notified),
            WorkerEvent::BackgroundMessage(payload) => {
                if !self.config.messaging_enabled {
                    debug!("Cloud messaging disabled, ignoring background message");
                    return EventOutcome::Ignored;
                }
                self.notifications
                    .on_background_message(&payload)
                    .await
                    .or_warn("Background notification not shown")
                    .map_or(EventOutcome::Ignored, EventOutcome::Notified)
            }
            WorkerEvent::NotificationClick(click) => {
                EventOutcome::Clicked(self.clicks.route(&click).await)
            }
            WorkerEvent::PushSubscriptionChange(change) => {
                match self
                    .resubscriber
                    .on_change(&change)
                    .await
                    .or_debug("Push re-registration dropped")
                {
                    Some(true) => EventOutcome::Resubscribed,
                    _ => EventOutcome::Ignored,
                }
            }
        }
    }

    async fn on_message(&self, message: ClientMessage) -> EventOutcome {
        match message {
            ClientMessage::LocalNotify(fields) => self
                .notifications
                .dispatch(fields, NotificationSource::Local)
                .await
                .or_warn("Local notification not shown")
                .map_or(EventOutcome::Ignored, EventOutcome::Notified),
            ClientMessage::SkipWaiting => {
                self.lifecycle.skip_waiting().await;
                EventOutcome::SkippedWaiting
            }
            ClientMessage::Unknown => {
                debug!("Ignoring unrecognised message");
                EventOutcome::Ignored
            }
        }
    }
}
