//! Network access over HTTP, backed by `reqwest`.

use async_trait::async_trait;
use http::{header, HeaderValue};
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::SwResult;
use crate::host::Fetcher;
use crate::request::{CacheMode, Request, Response, ResponseKind};

/// [`Fetcher`] that performs real HTTP requests.
///
/// No timeout is set: a slow server only delays the event that asked for it.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher identifying itself as `user_agent`.
    pub fn new(user_agent: &str) -> SwResult<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> SwResult<Response> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        builder = match request.cache {
            CacheMode::Default => builder,
            CacheMode::Reload => builder
                .header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(header::PRAGMA, HeaderValue::from_static("no-cache")),
            CacheMode::NoStore => {
                builder.header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
            }
        };

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(url = %url, status, body_len = body.len(), "Response received");

        Ok(Response {
            kind: ResponseKind::Basic,
            status,
            headers,
            body,
            url: Some(url),
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use url::Url;
    use wiremock::matchers::{body_json, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/logo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"png".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("cartomantes-sw-test").unwrap();
        let url = Url::parse(&format!("{}/app/logo.png", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"png"));
        assert_eq!(response.headers.get("content-type").unwrap(), "image/png");
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn test_reload_bypasses_http_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/index.html"))
            .and(header_is("cache-control", "no-cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("cartomantes-sw-test").unwrap();
        let url = Url::parse(&format!("{}/app/index.html", server.uri())).unwrap();
        let response = fetcher
            .fetch(&Request::get(url).cache(CacheMode::Reload))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("cartomantes-sw-test").unwrap();
        let url = Url::parse(&format!("{}/app/missing.html", server.uri())).unwrap();
        let response = fetcher.fetch(&Request::get(url)).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_post_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/subscribe"))
            .and(body_json(serde_json::json!({"app": "Cartomantes Online"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new("cartomantes-sw-test").unwrap();
        let url = Url::parse(&format!("{}/subscribe", server.uri())).unwrap();
        let request = Request::post_json(url, Bytes::from(r#"{"app":"Cartomantes Online"}"#));
        let response = fetcher.fetch(&request).await.unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let fetcher = HttpFetcher::new("cartomantes-sw-test").unwrap();
        let url = Url::parse("http://127.0.0.1:9/app/").unwrap();
        assert!(fetcher.fetch(&Request::get(url)).await.is_err());
    }
}
