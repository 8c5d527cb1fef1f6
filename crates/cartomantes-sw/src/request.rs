//! Request and response snapshots exchanged with the host network.

use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method};
use url::Url;

/// Request mode, as reported by the host for each fetch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level or frame navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// HTTP cache mode of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Bypass any intermediate HTTP cache and refresh it.
    Reload,
    NoStore,
}

/// An outgoing or intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub cache: CacheMode,
    pub body: Option<Bytes>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            cache: CacheMode::default(),
            body: None,
        }
    }

    /// Create a navigation request, as issued for a page load.
    pub fn navigate(url: Url) -> Self {
        Self::get(url)
            .mode(RequestMode::Navigate)
            .header(header::ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"))
    }

    /// Create a JSON POST request.
    pub fn post_json(url: Url, body: Bytes) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            mode: RequestMode::Cors,
            ..Self::get(url)
        }
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    /// Add a header.
    pub fn header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the cache mode.
    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Whether this request asks for an HTML document.
    pub fn wants_html(&self) -> bool {
        self.mode == RequestMode::Navigate
            || self
                .headers
                .get_all(header::ACCEPT)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|accept| accept.contains("text/html"))
    }
}

/// Kind of response, following the fetch standard's split between real responses
/// and the synthetic network error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Basic,
    Error,
}

/// A response snapshot. Cloning is cheap: the body is reference counted.
#[derive(Debug, Clone)]
pub struct Response {
    pub kind: ResponseKind,
    /// Status code; 0 for the network error.
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL, if known.
    pub url: Option<Url>,
    /// Whether the response was served from cache storage.
    pub from_cache: bool,
}

impl Response {
    /// Create a response with `status` and `body`.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            kind: ResponseKind::Basic,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url: None,
            from_cache: false,
        }
    }

    /// The synthetic response the host treats as a failed fetch.
    pub fn network_error() -> Self {
        Self {
            kind: ResponseKind::Error,
            status: 0,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: None,
            from_cache: false,
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this is the synthetic network error.
    pub fn is_network_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Check if response is success (2xx).
    pub fn ok(&self) -> bool {
        self.kind == ResponseKind::Basic && (200..300).contains(&self.status)
    }

    /// Get body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
