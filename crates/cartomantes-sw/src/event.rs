//! Events dispatched to the worker and the lifetime contract around them.

use std::future::Future;

use bytes::Bytes;
use serde_json::Value as JsonValue;
use tokio::task::JoinSet;
use tracing::warn;

use crate::click::{ClickOutcome, NotificationClick};
use crate::fetch::FetchDecision;
use crate::lifecycle::{ActivateReport, InstallReport};
use crate::notify::NotificationRecord;
use crate::request::Request;
use crate::subscription::SubscriptionChange;

/// Keeps an event alive until all of its asynchronous work has completed.
///
/// Handlers return as soon as they have an answer for the host (a response, an
/// outcome). Work that must still finish, such as writing a network response into
/// the cache, is registered with [`ExtendableEvent::wait_until`]; the host awaits
/// [`ExtendableEvent::settled`] before it lets the worker go idle.
#[derive(Debug, Default)]
pub struct ExtendableEvent {
    pending: JoinSet<()>,
}

impl ExtendableEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the event's lifetime until `work` completes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn wait_until<F>(&mut self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.spawn(work);
    }

    /// Number of extensions still running.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every extension. Returns how many completed.
    pub async fn settled(&mut self) -> usize {
        let mut completed = 0;
        while let Some(result) = self.pending.join_next().await {
            if let Err(error) = result {
                warn!(%error, "Lifetime extension did not complete");
            }
            completed += 1;
        }
        completed
    }
}

/// An event delivered by the host runtime.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    /// An intercepted request.
    Fetch(Request),
    /// A structured message posted by a page. Validated on receipt.
    Message(JsonValue),
    /// A push message; `None` when the push carried no data.
    Push(Option<Bytes>),
    /// A background message from the cloud messaging subsystem.
    BackgroundMessage(JsonValue),
    NotificationClick(NotificationClick),
    PushSubscriptionChange(SubscriptionChange),
}

impl WorkerEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Activate => "activate",
            Self::Fetch(_) => "fetch",
            Self::Message(_) => "message",
            Self::Push(_) => "push",
            Self::BackgroundMessage(_) => "background-message",
            Self::NotificationClick(_) => "notificationclick",
            Self::PushSubscriptionChange(_) => "pushsubscriptionchange",
        }
    }
}

/// What a handler did with an event.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetch(FetchDecision),
    /// A notification was shown.
    Notified(NotificationRecord),
    /// A `SKIP_WAITING` message was honoured.
    SkippedWaiting,
    Clicked(ClickOutcome),
    /// The subscription was re-registered with the push server.
    Resubscribed,
    /// Nothing to do, or the handler failed and degraded to a no-op.
    Ignored,
}

/// An outcome paired with the event whose lifetime may still be extended.
#[derive(Debug)]
pub struct Dispatched {
    pub outcome: EventOutcome,
    pub event: ExtendableEvent,
}

impl Dispatched {
    /// Wait for all lifetime extensions and return the outcome.
    pub async fn settle(mut self) -> EventOutcome {
        self.event.settled().await;
        self.outcome
    }
}
