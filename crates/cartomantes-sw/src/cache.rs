//! Cache storage: named cache generations of request → response snapshots.
//!
//! ```text
//! CacheStorage (caches)
//!     └── Cache "cartomantes-cache-<version>"
//!             └── GET url → CacheEntry
//! ```

use std::sync::Arc;

use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, Method};
use tokio::sync::RwLock;
use url::Url;

use crate::error::{SwError, SwResult};
use crate::request::{Request, Response};

/// Cache storage shared by every handler of a worker.
pub type SharedCaches = Arc<RwLock<CacheStorage>>;

/// Lookup options for [`Cache::match_url`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// Compare URLs without their query string.
    pub ignore_search: bool,
}

/// A cached response snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request URL (fragment stripped).
    pub url: Url,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Bytes,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: i64,
}

impl CacheEntry {
    /// Snapshot `response` for `url`.
    pub fn snapshot(url: &Url, response: &Response) -> Self {
        Self {
            url: cache_key(url),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Rebuild a response from this entry.
    pub fn to_response(&self) -> Response {
        let mut response = Response::new(self.status, self.body.clone());
        response.headers = self.headers.clone();
        response.url = Some(self.url.clone());
        response.from_cache = true;
        response
    }
}

/// Key under which a URL is stored: the URL without its fragment.
pub fn cache_key(url: &Url) -> Url {
    let mut key = url.clone();
    key.set_fragment(None);
    key
}

fn without_search(url: &Url) -> Url {
    let mut stripped = cache_key(url);
    stripped.set_query(None);
    stripped
}

/// One cache generation.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    entries: HashMap<String, CacheEntry>,

    /// Keys in insertion order; a replaced entry moves to the end.
    order: Vec<String>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Look up a URL. Ignoring the query, the oldest matching entry wins.
    pub fn match_url(&self, url: &Url, options: MatchOptions) -> Option<&CacheEntry> {
        if options.ignore_search {
            let wanted = without_search(url);
            return self
                .order
                .iter()
                .filter_map(|key| self.entries.get(key))
                .find(|entry| without_search(&entry.url) == wanted);
        }
        self.entries.get(cache_key(url).as_str())
    }

    /// Look up a request. Only GET requests can match.
    pub fn match_request(&self, request: &Request, options: MatchOptions) -> Option<&CacheEntry> {
        if request.method != Method::GET {
            return None;
        }
        self.match_url(&request.url, options)
    }

    /// Store `response` for `request`, replacing any previous entry.
    pub fn put(&mut self, request: &Request, response: &Response) -> SwResult<()> {
        if request.method != Method::GET {
            return Err(SwError::Cache(format!(
                "cannot cache {} request for {}",
                request.method, request.url
            )));
        }
        if response.is_network_error() {
            return Err(SwError::Cache(format!(
                "cannot cache a network error for {}",
                request.url
            )));
        }
        let entry = CacheEntry::snapshot(&request.url, response);
        let key = entry.url.to_string();
        self.order.retain(|k| *k != key);
        self.order.push(key.clone());
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &Url) -> bool {
        let key = cache_key(url);
        self.order.retain(|k| k != key.as_str());
        self.entries.remove(key.as_str()).is_some()
    }

    /// Get all keys (URLs), oldest first.
    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All cache generations, in creation order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: Vec<Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create shared storage for a worker.
    pub fn shared() -> SharedCaches {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        match self.caches.iter().position(|c| c.name == name) {
            Some(index) => &mut self.caches[index],
            None => {
                self.caches.push(Cache::new(name));
                let last = self.caches.len() - 1;
                &mut self.caches[last]
            }
        }
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.iter().find(|c| c.name == name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.caches.len();
        self.caches.retain(|c| c.name != name);
        self.caches.len() != before
    }

    /// Get all cache names, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.caches.iter().map(|c| c.name.clone()).collect()
    }

    /// Match across all caches, oldest first.
    pub fn match_request(&self, request: &Request, options: MatchOptions) -> Option<Response> {
        self.caches
            .iter()
            .find_map(|cache| cache.match_request(request, options))
            .map(CacheEntry::to_response)
    }

    /// Match a URL across all caches, oldest first.
    pub fn match_url(&self, url: &Url, options: MatchOptions) -> Option<Response> {
        self.caches
            .iter()
            .find_map(|cache| cache.match_url(url, options))
            .map(CacheEntry::to_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn ok(body: &'static str) -> Response {
        Response::new(200, body)
    }

    #[test]
    fn test_cache_put_and_match() {
        let mut cache = Cache::new("v1");
        let request = Request::get(url("https://example.com/style.css"));
        cache.put(&request, &ok("body{}")).unwrap();

        let entry = cache.match_request(&request, MatchOptions::default()).unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"body{}"));
        assert!(cache
            .match_url(&url("https://example.com/other.css"), MatchOptions::default())
            .is_none());
    }

    #[test]
    fn test_fragment_is_not_part_of_key() {
        let mut cache = Cache::new("v1");
        cache
            .put(&Request::get(url("https://example.com/a.html#top")), &ok("a"))
            .unwrap();
        assert!(cache
            .match_url(&url("https://example.com/a.html"), MatchOptions::default())
            .is_some());
    }

    #[test]
    fn test_ignore_search() {
        let mut cache = Cache::new("v1");
        cache
            .put(&Request::get(url("https://example.com/leituras.html")), &ok("page"))
            .unwrap();

        let with_query = url("https://example.com/leituras.html?pwa=true");
        assert!(cache.match_url(&with_query, MatchOptions::default()).is_none());
        assert!(cache
            .match_url(&with_query, MatchOptions { ignore_search: true })
            .is_some());
    }

    #[test]
    fn test_ignore_search_prefers_oldest_entry() {
        let mut cache = Cache::new("v1");
        for n in 0..16 {
            let page = url(&format!("https://example.com/painel.html?n={n}"));
            cache.put(&Request::get(page), &ok("page")).unwrap();
        }
        let first = url("https://example.com/painel.html?n=0");
        cache.put(&Request::get(url("https://example.com/painel.html?n=3")), &ok("again")).unwrap();

        let wanted = url("https://example.com/painel.html?n=99");
        let entry = cache
            .match_url(&wanted, MatchOptions { ignore_search: true })
            .unwrap();
        assert_eq!(entry.url, first);

        cache.delete(&first);
        let entry = cache
            .match_url(&wanted, MatchOptions { ignore_search: true })
            .unwrap();
        assert_eq!(entry.url.as_str(), "https://example.com/painel.html?n=1");
        assert_eq!(cache.keys().last(), Some(&"https://example.com/painel.html?n=3"));
    }

    #[test]
    fn test_put_rejects_non_get() {
        let mut cache = Cache::new("v1");
        let mut request = Request::get(url("https://example.com/api"));
        request.method = Method::POST;
        assert!(cache.put(&request, &ok("")).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_rejects_network_error() {
        let mut cache = Cache::new("v1");
        let request = Request::get(url("https://example.com/a.js"));
        assert!(cache.put(&request, &Response::network_error()).is_err());
    }

    #[test]
    fn test_put_overwrites() {
        let mut cache = Cache::new("v1");
        let request = Request::get(url("https://example.com/a.js"));
        cache.put(&request, &ok("old")).unwrap();
        cache.put(&request, &ok("new")).unwrap();
        assert_eq!(cache.len(), 1);
        let entry = cache.match_request(&request, MatchOptions::default()).unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"new"));
    }

    #[test]
    fn test_delete_entry_keeps_headers_of_others() {
        let mut cache = Cache::new("v1");
        let css = Request::get(url("https://example.com/a.css"));
        let js = Request::get(url("https://example.com/a.js"));
        cache
            .put(
                &css,
                &ok("body{}").with_header(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("text/css"),
                ),
            )
            .unwrap();
        cache.put(&js, &ok("")).unwrap();

        assert!(cache.delete(&js.url));
        assert!(!cache.delete(&js.url));
        assert_eq!(cache.keys(), vec!["https://example.com/a.css"]);

        let entry = cache.match_request(&css, MatchOptions::default()).unwrap();
        assert_eq!(entry.to_response().headers["content-type"], "text/css");
    }

    #[test]
    fn test_cache_storage() {
        let mut storage = CacheStorage::new();

        assert!(!storage.has("v1"));

        storage.open("v1");
        assert!(storage.has("v1"));

        assert!(storage.delete("v1"));
        assert!(!storage.has("v1"));
    }

    #[test]
    fn test_storage_matches_oldest_first() {
        let mut storage = CacheStorage::new();
        let request = Request::get(url("https://example.com/a.js"));
        storage.open("v1").put(&request, &ok("first")).unwrap();
        storage.open("v2").put(&request, &ok("second")).unwrap();

        assert_eq!(storage.keys(), vec!["v1".to_string(), "v2".to_string()]);
        let response = storage
            .match_request(&request, MatchOptions::default())
            .unwrap();
        assert_eq!(response.text(), "first");
        assert!(response.from_cache);
    }
}
