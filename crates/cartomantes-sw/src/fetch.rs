//! Fetch interception.
//!
//! Same-origin GETs are served network-first when they ask for HTML and
//! cache-first otherwise. Everything else goes to the network untouched.

use std::sync::Arc;

use http::Method;
use tracing::{debug, trace, warn};

use crate::cache::{CacheStorage, MatchOptions, SharedCaches};
use crate::config::WorkerConfig;
use crate::event::ExtendableEvent;
use crate::host::Fetcher;
use crate::request::{Request, Response};

/// What the interceptor did with a request.
#[derive(Debug)]
pub enum FetchDecision {
    /// Not intercepted; the host performs its default fetch.
    Bypass,
    /// Answer with this response.
    Respond(Response),
}

impl FetchDecision {
    /// The response, if the request was intercepted.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Bypass => None,
            Self::Respond(response) => Some(response),
        }
    }
}

/// Request classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Non-GET: not intercepted.
    Passthrough,
    /// GET to another origin: forwarded, never cached.
    CrossOrigin,
    /// Navigation or HTML: network-first.
    Html,
    /// Any other same-origin GET: cache-first.
    Asset,
}

/// One step of the offline fallback for HTML requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// A cached response for the failed request itself.
    SameRequest,
    /// A cached response for this scope-relative path.
    Path(String),
}

impl Fallback {
    /// Look this step up in `caches`.
    pub fn resolve(
        &self,
        caches: &CacheStorage,
        request: &Request,
        config: &WorkerConfig,
    ) -> Option<Response> {
        match self {
            Self::SameRequest => caches.match_request(
                request,
                MatchOptions {
                    ignore_search: config.html_ignore_search,
                },
            ),
            Self::Path(path) => {
                let url = config.scope.join(path).ok()?;
                caches.match_url(&url, MatchOptions::default())
            }
        }
    }
}

/// Ordered fallback steps, first hit wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain(pub Vec<Fallback>);

impl FallbackChain {
    /// The request itself, then the fallback page, then the root document.
    pub fn for_config(config: &WorkerConfig) -> Self {
        Self(vec![
            Fallback::SameRequest,
            Fallback::Path(config.fallback_page.clone()),
            Fallback::Path("./".to_string()),
        ])
    }

    pub fn resolve(
        &self,
        caches: &CacheStorage,
        request: &Request,
        config: &WorkerConfig,
    ) -> Option<Response> {
        self.0.iter().enumerate().find_map(|(step, fallback)| {
            let response = fallback.resolve(caches, request, config)?;
            debug!(url = %request.url, step, fallback = ?fallback, "Serving offline fallback");
            Some(response)
        })
    }
}

/// Fetch event handler.
pub struct FetchInterceptor {
    config: Arc<WorkerConfig>,
    caches: SharedCaches,
    fetcher: Arc<dyn Fetcher>,
    fallbacks: FallbackChain,
}

impl FetchInterceptor {
    pub fn new(config: Arc<WorkerConfig>, caches: SharedCaches, fetcher: Arc<dyn Fetcher>) -> Self {
        let fallbacks = FallbackChain::for_config(&config);
        Self {
            config,
            caches,
            fetcher,
            fallbacks,
        }
    }

    /// Replace the fallback chain.
    pub fn with_fallbacks(mut self, fallbacks: FallbackChain) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Classify `request`.
    pub fn classify(&self, request: &Request) -> RequestClass {
        if request.method != Method::GET {
            RequestClass::Passthrough
        } else if !self.config.is_same_origin(&request.url) {
            RequestClass::CrossOrigin
        } else if request.wants_html() {
            RequestClass::Html
        } else {
            RequestClass::Asset
        }
    }

    /// Handle a fetch event.
    pub async fn handle(&self, request: &Request, event: &mut ExtendableEvent) -> FetchDecision {
        let class = self.classify(request);
        trace!(url = %request.url, class = ?class, "Intercepting request");

        match class {
            RequestClass::Passthrough => FetchDecision::Bypass,
            RequestClass::CrossOrigin => FetchDecision::Respond(
                self.network(request)
                    .await
                    .unwrap_or_else(Response::network_error),
            ),
            RequestClass::Html => FetchDecision::Respond(self.network_first(request, event).await),
            RequestClass::Asset => FetchDecision::Respond(self.cache_first(request).await),
        }
    }

    /// Network fetch; transport failures and network-error responses are `None`.
    async fn network(&self, request: &Request) -> Option<Response> {
        match self.fetcher.fetch(request).await {
            Ok(response) if !response.is_network_error() => Some(response),
            Ok(_) => {
                debug!(url = %request.url, "Network error response");
                None
            }
            Err(error) => {
                debug!(url = %request.url, %error, "Network fetch failed");
                None
            }
        }
    }

    async fn network_first(&self, request: &Request, event: &mut ExtendableEvent) -> Response {
        if let Some(response) = self.network(request).await {
            if response.status == 200 {
                self.store_in_background(request, &response, event);
            }
            return response;
        }

        let caches = self.caches.read().await;
        self.fallbacks
            .resolve(&caches, request, &self.config)
            .unwrap_or_else(|| {
                warn!(url = %request.url, "Offline with no cached page");
                Response::network_error()
            })
    }

    async fn cache_first(&self, request: &Request) -> Response {
        let cached = self
            .caches
            .read()
            .await
            .match_request(request, MatchOptions::default());
        if let Some(response) = cached {
            trace!(url = %request.url, "Cache hit");
            return response;
        }

        let Some(response) = self.network(request).await else {
            return Response::network_error();
        };
        if response.status == 200 {
            let name = self.config.cache_name();
            if let Err(error) = self.caches.write().await.open(&name).put(request, &response) {
                warn!(url = %request.url, %error, "Failed to cache asset");
            }
        }
        response
    }

    /// Write a copy of `response` without delaying the caller.
    fn store_in_background(&self, request: &Request, response: &Response, event: &mut ExtendableEvent) {
        let caches = Arc::clone(&self.caches);
        let name = self.config.cache_name();
        let request = request.clone();
        let copy = response.clone();
        event.wait_until(async move {
            if let Err(error) = caches.write().await.open(&name).put(&request, &copy) {
                warn!(url = %request.url, %error, "Failed to cache page");
            }
        });
    }
}
