//! # Cartomantes Service Worker
//!
//! Offline cache and notification worker for the Cartomantes Online web app,
//! written against an abstract host runtime.
//!
//! ## Features
//!
//! - **Lifecycle**: app-shell precache on install, stale cache eviction and client
//!   takeover on activate
//! - **Fetch interception**: network-first for pages, cache-first for assets, an
//!   explicit offline fallback chain
//! - **Notifications**: page messages, push messages and cloud-messaging background
//!   messages normalized into one notification each
//! - **Click routing**: focus an open page or open a new one
//! - **Re-subscription**: rotated push subscriptions posted to the push server
//!
//! ## Architecture
//!
//! ```text
//! host runtime ── WorkerEvent ──► OfflineWorker::dispatch
//!                                     ├── Lifecycle            (install, activate)
//!                                     ├── FetchInterceptor     (fetch)
//!                                     ├── NotificationDispatcher (message, push)
//!                                     ├── ClickRouter          (notificationclick)
//!                                     └── Resubscriber         (pushsubscriptionchange)
//!
//! host seams: Fetcher · Registration · ClientHost
//! ```

pub mod cache;
pub mod click;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod memory;
pub mod message;
pub mod net;
pub mod notify;
pub mod request;
pub mod subscription;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheStorage, MatchOptions, SharedCaches};
pub use click::{ClickOutcome, ClickRouter, NotificationClick};
pub use config::WorkerConfig;
pub use error::{ConfigError, SwError, SwResult};
pub use event::{Dispatched, EventOutcome, ExtendableEvent, WorkerEvent};
pub use fetch::{Fallback, FallbackChain, FetchDecision, FetchInterceptor, RequestClass};
pub use host::{ClientHost, ClientId, ClientInfo, ClientMatchOptions, ClientType, Fetcher, Registration};
pub use lifecycle::{ActivateReport, InstallFailure, InstallReport, Lifecycle};
pub use message::{ClientMessage, NotificationFields, WorkerMessage};
pub use net::HttpFetcher;
pub use notify::{NotificationDispatcher, NotificationRecord, NotificationSource, Normalizer};
pub use request::{CacheMode, Request, RequestMode, Response};
pub use subscription::{Resubscriber, SubscriptionChange};
pub use worker::OfflineWorker;
