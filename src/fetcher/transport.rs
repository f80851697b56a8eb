use crate::error::TransportError;
use crate::models::{Method, RequestDescriptor, ResponseResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Performs the network I/O for one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseResult, TransportError>;

    /// Same contract as [`Transport::send`], routed through `proxy`.
    async fn send_via_proxy(
        &self,
        request: &RequestDescriptor,
        proxy: &str,
    ) -> Result<ResponseResult, TransportError>;
}

// ── reqwest transport ─────────────────────────────────────────────────────────

pub struct ReqwestTransport {
    direct: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, follow_redirects: bool) -> Result<Self> {
        let direct = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .no_proxy()
            .redirect(redirect_policy(follow_redirects))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { direct, timeout })
    }

    /// Proxied clients are built per call; there is no pool to share them in.
    fn proxied_client(
        &self,
        proxy: &str,
        request: &RequestDescriptor,
    ) -> Result<Client, TransportError> {
        let proxy = Proxy::all(proxy).map_err(|e| TransportError::Request(e.to_string()))?;

        if !request.verify_tls {
            debug!("TLS certificate verification disabled for proxied request to {}", request.url);
        }

        Client::builder()
            .timeout(self.timeout)
            .gzip(true)
            .proxy(proxy)
            .redirect(redirect_policy(request.follow_redirects))
            .danger_accept_invalid_certs(!request.verify_tls)
            .build()
            .map_err(TransportError::from)
    }

    async fn execute(
        &self,
        client: &Client,
        request: &RequestDescriptor,
    ) -> Result<ResponseResult, TransportError> {
        let mut target =
            Url::parse(&request.url).map_err(|e| TransportError::Request(e.to_string()))?;
        if !request.query.is_empty() {
            target.query_pairs_mut().extend_pairs(&request.query);
        }

        let mut builder = match request.method {
            Method::Get => client.get(target),
            Method::Head => client.head(target),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.timeout(request.timeout).send().await?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = match request.method {
            Method::Get => resp.text().await?,
            Method::Head => String::new(),
        };

        debug!("{} {} -> {} ({} bytes)", status, request.url, final_url, body.len());
        Ok(ResponseResult::new(status, final_url, body))
    }
}

fn redirect_policy(follow: bool) -> Policy {
    if follow {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<ResponseResult, TransportError> {
        self.execute(&self.direct, request).await
    }

    async fn send_via_proxy(
        &self,
        request: &RequestDescriptor,
        proxy: &str,
    ) -> Result<ResponseResult, TransportError> {
        let client = self.proxied_client(proxy, request)?;
        self.execute(&client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(url: String) -> RequestDescriptor {
        RequestDescriptor {
            method: Method::Get,
            url,
            headers: BTreeMap::from([("Cookie".to_string(), "sid=1".to_string())]),
            cookie: Some("sid=1".to_string()),
            proxy: None,
            query: vec![],
            timeout: Duration::from_secs(5),
            follow_redirects: true,
            verify_tls: true,
        }
    }

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(5), true).unwrap()
    }

    #[tokio::test]
    async fn sends_headers_and_reads_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("Cookie", "sid=1"))
            .and(query_param("q", "rust"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = descriptor(format!("{}/page", server.uri()));
        req.query = vec![("q".to_string(), "rust".to_string())];

        let resp = transport().send(&req).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "hello");
        assert!(resp.succeeded);
    }

    #[tokio::test]
    async fn reports_final_url_after_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/new"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
            .mount(&server)
            .await;

        let resp = transport()
            .send(&descriptor(format!("{}/old", server.uri())))
            .await
            .unwrap();
        assert_eq!(resp.final_url, format!("{}/new", server.uri()));
        assert_eq!(resp.body, "moved");
    }

    #[tokio::test]
    async fn error_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resp = transport()
            .send(&descriptor(format!("{}/busy", server.uri())))
            .await
            .unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.succeeded);
    }

    #[tokio::test]
    async fn head_request_has_no_body() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut req = descriptor(format!("{}/file", server.uri()));
        req.method = Method::Head;

        let resp = transport().send(&req).await.unwrap();
        assert!(resp.succeeded);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut req = descriptor(server.uri());
        req.timeout = Duration::from_millis(100);

        let err = transport().send(&req).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connect_error() {
        let url = "http://127.0.0.1:1/".to_string();

        let err = transport().send(&descriptor(url)).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn proxied_request_goes_through_proxy() {
        // wiremock answers absolute-form proxy requests like any other
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .expect(1)
            .mount(&proxy)
            .await;

        let mut req = descriptor("http://upstream.invalid/page".to_string());
        req.verify_tls = false;

        let resp = transport()
            .send_via_proxy(&req, &proxy.uri())
            .await
            .unwrap();
        assert_eq!(resp.body, "via proxy");
    }
}
