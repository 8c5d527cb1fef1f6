//! In-memory host: clients, registration and network routes.
//!
//! Backs offline runs of the worker (tests, `sw-check preview`) with the same
//! observable behaviour a browser host has: window ordering, tag replacement of
//! notifications, navigation restricted to controlled clients.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use hashbrown::HashMap;
use http::Method;
use tokio::sync::RwLock;
use tracing::trace;
use url::Url;

use crate::cache::cache_key;
use crate::error::{SwError, SwResult};
use crate::host::{
    ClientHost, ClientId, ClientInfo, ClientMatchOptions, ClientType, Fetcher, Registration,
};
use crate::message::WorkerMessage;
use crate::notify::NotificationRecord;
use crate::request::{CacheMode, Request, Response};

// ==================== Clients ====================

/// A client held by [`MemoryClients`].
#[derive(Debug, Clone)]
pub struct MemoryClient {
    pub info: ClientInfo,
    /// Messages posted to this client, oldest first.
    pub inbox: Vec<WorkerMessage>,
}

/// Clients API backed by a list of open pages.
#[derive(Debug, Default)]
pub struct MemoryClients {
    clients: RwLock<Vec<MemoryClient>>,
}

fn next_client_id() -> ClientId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    ClientId(format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed)))
}

impl MemoryClients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a page at `url`. Returns its id.
    pub async fn add_window(&self, url: Url, controlled: bool) -> ClientId {
        self.add(url, ClientType::Window, controlled).await
    }

    /// Add a client of any type.
    pub async fn add(&self, url: Url, client_type: ClientType, controlled: bool) -> ClientId {
        let id = next_client_id();
        self.clients.write().await.push(MemoryClient {
            info: ClientInfo {
                id: id.clone(),
                url,
                client_type,
                controlled,
                focused: false,
            },
            inbox: Vec::new(),
        });
        id
    }

    /// Close a client.
    pub async fn remove(&self, id: &ClientId) -> Option<MemoryClient> {
        let mut clients = self.clients.write().await;
        let index = clients.iter().position(|c| &c.info.id == id)?;
        Some(clients.remove(index))
    }

    /// Snapshot a client.
    pub async fn get(&self, id: &ClientId) -> Option<MemoryClient> {
        self.clients
            .read()
            .await
            .iter()
            .find(|c| &c.info.id == id)
            .cloned()
    }

    /// Snapshot every client.
    pub async fn all(&self) -> Vec<MemoryClient> {
        self.clients.read().await.clone()
    }

    async fn with_client<T>(
        &self,
        id: &ClientId,
        f: impl FnOnce(&mut MemoryClient) -> SwResult<T>,
    ) -> SwResult<T> {
        let mut clients = self.clients.write().await;
        let client = clients
            .iter_mut()
            .find(|c| &c.info.id == id)
            .ok_or_else(|| SwError::client(format!("no client {id}")))?;
        f(client)
    }
}

#[async_trait]
impl ClientHost for MemoryClients {
    async fn match_all(&self, options: ClientMatchOptions) -> SwResult<Vec<ClientInfo>> {
        Ok(self
            .clients
            .read()
            .await
            .iter()
            .map(|c| &c.info)
            .filter(|info| options.include_uncontrolled || info.controlled)
            .filter(|info| {
                options.client_type == ClientType::All || info.client_type == options.client_type
            })
            .cloned()
            .collect())
    }

    async fn claim(&self) -> SwResult<()> {
        for client in self.clients.write().await.iter_mut() {
            client.info.controlled = true;
        }
        Ok(())
    }

    async fn focus(&self, id: &ClientId) -> SwResult<()> {
        let mut clients = self.clients.write().await;
        let index = clients
            .iter()
            .position(|c| &c.info.id == id)
            .ok_or_else(|| SwError::client(format!("no client {id}")))?;
        if clients[index].info.client_type != ClientType::Window {
            return Err(SwError::client("Can only focus window clients"));
        }
        for (i, client) in clients.iter_mut().enumerate() {
            client.info.focused = i == index;
        }
        Ok(())
    }

    async fn navigate(&self, id: &ClientId, url: &Url) -> SwResult<()> {
        self.with_client(id, |client| {
            if client.info.client_type != ClientType::Window {
                return Err(SwError::client("Can only navigate window clients"));
            }
            if !client.info.controlled {
                return Err(SwError::client(format!(
                    "client {} is not controlled by this worker",
                    client.info.id
                )));
            }
            client.info.url = url.clone();
            Ok(())
        })
        .await
    }

    async fn post_message(&self, id: &ClientId, message: &WorkerMessage) -> SwResult<()> {
        self.with_client(id, |client| {
            client.inbox.push(message.clone());
            Ok(())
        })
        .await
    }

    async fn open_window(&self, url: &Url) -> SwResult<ClientInfo> {
        let info = ClientInfo {
            id: next_client_id(),
            url: url.clone(),
            client_type: ClientType::Window,
            controlled: true,
            focused: true,
        };
        let mut clients = self.clients.write().await;
        for client in clients.iter_mut() {
            client.info.focused = false;
        }
        clients.push(MemoryClient {
            info: info.clone(),
            inbox: Vec::new(),
        });
        Ok(info)
    }
}

// ==================== Registration ====================

/// A notification currently on screen.
#[derive(Debug, Clone)]
pub struct DisplayedNotification {
    pub record: NotificationRecord,
    /// Times the user was alerted through this slot.
    pub alerts: u32,
}

/// Registration with a notification tray.
#[derive(Debug, Default)]
pub struct MemoryRegistration {
    tray: RwLock<Vec<DisplayedNotification>>,
    skip_waiting_calls: AtomicUsize,
    permission_denied: AtomicBool,
}

impl MemoryRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications on screen, oldest first.
    pub async fn displayed(&self) -> Vec<DisplayedNotification> {
        self.tray.read().await.clone()
    }

    /// Refuse every notification, as when the user blocked them.
    pub fn deny_permission(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    /// How many times `skip_waiting` was called.
    pub fn skip_waiting_calls(&self) -> usize {
        self.skip_waiting_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registration for MemoryRegistration {
    async fn skip_waiting(&self) -> SwResult<()> {
        self.skip_waiting_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn show_notification(&self, notification: &NotificationRecord) -> SwResult<()> {
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(SwError::notification("notification permission denied"));
        }
        let mut tray = self.tray.write().await;
        match tray
            .iter_mut()
            .find(|shown| shown.record.tag() == notification.tag())
        {
            Some(shown) => {
                shown.record = notification.clone();
                if notification.options.renotify {
                    shown.alerts += 1;
                }
            }
            None => tray.push(DisplayedNotification {
                record: notification.clone(),
                alerts: 1,
            }),
        }
        Ok(())
    }

    async fn close_notification(&self, tag: &str) -> SwResult<()> {
        self.tray.write().await.retain(|shown| shown.record.tag() != tag);
        Ok(())
    }
}

// ==================== Network ====================

#[derive(Debug, Clone)]
enum Route {
    Respond(Response),
    Fail,
}

/// A request seen by [`RouteFetcher`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub cache: CacheMode,
    pub body: Option<bytes::Bytes>,
}

/// Network with a fixed route table. Unrouted URLs answer 404.
#[derive(Debug, Default)]
pub struct RouteFetcher {
    routes: RwLock<HashMap<String, Route>>,
    requests: RwLock<Vec<RecordedRequest>>,
    offline: AtomicBool,
}

impl RouteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub async fn route(&self, url: &Url, response: Response) {
        self.routes
            .write()
            .await
            .insert(cache_key(url).to_string(), Route::Respond(response));
    }

    /// Make requests to `url` fail at the transport level.
    pub async fn fail(&self, url: &Url) {
        self.routes
            .write()
            .await
            .insert(cache_key(url).to_string(), Route::Fail);
    }

    /// Fail every request while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every request seen, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Number of requests seen for `url`.
    pub async fn hits(&self, url: &Url) -> usize {
        let key = cache_key(url);
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| cache_key(&r.url) == key)
            .count()
    }
}

#[async_trait]
impl Fetcher for RouteFetcher {
    async fn fetch(&self, request: &Request) -> SwResult<Response> {
        self.requests.write().await.push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            cache: request.cache,
            body: request.body.clone(),
        });
        trace!(url = %request.url, "Routed fetch");

        if self.offline.load(Ordering::SeqCst) {
            return Err(SwError::network(format!("offline: {}", request.url)));
        }
        let route = self
            .routes
            .read()
            .await
            .get(cache_key(&request.url).as_str())
            .cloned();
        match route {
            Some(Route::Respond(response)) => Ok(Response {
                url: Some(request.url.clone()),
                ..response
            }),
            Some(Route::Fail) => Err(SwError::network(format!("connection reset: {}", request.url))),
            None => Ok(Response::new(404, "Not Found")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::NotificationFields;
    use crate::notify::{NotificationSource, Normalizer};
    use crate::WorkerConfig;
    use std::sync::Arc;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn record(tag: &str) -> NotificationRecord {
        let config = WorkerConfig::new("v1", url("https://example.com/"));
        Normalizer::new(Arc::new(config)).normalize(
            NotificationFields {
                tag: Some(tag.to_string()),
                ..Default::default()
            },
            NotificationSource::Local,
        )
    }

    #[tokio::test]
    async fn test_clients_open_window() {
        let clients = MemoryClients::new();

        let client = clients.open_window(&url("https://example.com/")).await.unwrap();
        assert_eq!(client.client_type, ClientType::Window);
        assert!(client.focused);

        assert!(clients.get(&client.id).await.is_some());
    }

    #[tokio::test]
    async fn test_match_all_respects_control() {
        let clients = MemoryClients::new();
        clients.add_window(url("https://example.com/a"), true).await;
        clients.add_window(url("https://example.com/b"), false).await;

        let controlled = clients.match_all(ClientMatchOptions::default()).await.unwrap();
        assert_eq!(controlled.len(), 1);

        let all = clients.match_all(ClientMatchOptions::all_windows()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].url.as_str(), "https://example.com/a");
    }

    #[tokio::test]
    async fn test_navigate_requires_control() {
        let clients = MemoryClients::new();
        let id = clients.add_window(url("https://example.com/a"), false).await;
        assert!(clients.navigate(&id, &url("https://example.com/b")).await.is_err());

        clients.claim().await.unwrap();
        clients.navigate(&id, &url("https://example.com/b")).await.unwrap();
        assert_eq!(clients.get(&id).await.unwrap().info.url.as_str(), "https://example.com/b");
    }

    #[tokio::test]
    async fn test_closed_client_cannot_be_focused() {
        let clients = MemoryClients::new();
        let id = clients.add_window(url("https://example.com/a"), true).await;
        assert!(clients.remove(&id).await.is_some());
        assert!(clients.focus(&id).await.is_err());
        assert!(clients.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_tray_replaces_same_tag() {
        let registration = MemoryRegistration::new();
        registration.show_notification(&record("same")).await.unwrap();
        registration.show_notification(&record("same")).await.unwrap();
        registration.show_notification(&record("other")).await.unwrap();

        let displayed = registration.displayed().await;
        assert_eq!(displayed.len(), 2);
        assert_eq!(displayed[0].alerts, 2);

        registration.close_notification("same").await.unwrap();
        assert_eq!(registration.displayed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_route_fetcher() {
        let fetcher = RouteFetcher::new();
        let logo = url("https://example.com/logo.png");
        fetcher.route(&logo, Response::new(200, "png")).await;

        let response = fetcher.fetch(&Request::get(logo.clone())).await.unwrap();
        assert_eq!(response.status, 200);

        let missing = fetcher
            .fetch(&Request::get(url("https://example.com/missing")))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        fetcher.set_offline(true);
        assert!(fetcher.fetch(&Request::get(logo.clone())).await.is_err());
        assert_eq!(fetcher.hits(&logo).await, 2);
    }
}
