//! Seams to the host runtime: network, registration and clients.

use std::fmt;

use async_trait::async_trait;
use url::Url;

use crate::error::SwResult;
use crate::message::WorkerMessage;
use crate::notify::NotificationRecord;
use crate::request::{Request, Response};

/// The network, as seen from the worker (`fetch`).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform `request`. An `Err` is a transport failure; HTTP error statuses are
    /// returned as responses.
    async fn fetch(&self, request: &Request) -> SwResult<Response>;
}

/// The worker's own registration (`self.registration`, `self.skipWaiting`).
#[async_trait]
pub trait Registration: Send + Sync {
    /// Activate this worker version without waiting for old clients to close.
    async fn skip_waiting(&self) -> SwResult<()>;

    /// Display a notification. A notification with the same tag is replaced.
    async fn show_notification(&self, notification: &NotificationRecord) -> SwResult<()>;

    /// Close the displayed notification with `tag`.
    async fn close_notification(&self, tag: &str) -> SwResult<()>;
}

/// Unique identifier for a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// A client (open page) as enumerated by the host.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: Url,
    pub client_type: ClientType,
    /// Whether this worker controls the client.
    pub controlled: bool,
    pub focused: bool,
}

/// Options for [`ClientHost::match_all`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

impl ClientMatchOptions {
    /// Every window client, controlled or not.
    pub fn all_windows() -> Self {
        Self {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        }
    }
}

/// Clients API (`self.clients`).
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Enumerate clients in the host's order.
    async fn match_all(&self, options: ClientMatchOptions) -> SwResult<Vec<ClientInfo>>;

    /// Take control of every client in scope.
    async fn claim(&self) -> SwResult<()>;

    /// Focus a window client.
    async fn focus(&self, id: &ClientId) -> SwResult<()>;

    /// Navigate a window client to `url`.
    async fn navigate(&self, id: &ClientId, url: &Url) -> SwResult<()>;

    /// Post a message to a client.
    async fn post_message(&self, id: &ClientId, message: &WorkerMessage) -> SwResult<()>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> SwResult<ClientInfo>;
}
