pub mod pacer;
pub mod request;
pub mod retry;
pub mod transport;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::models::{FetchOptions, FetchOutcome, RequestDescriptor, ResponseResult};
use anyhow::Result;
use reqwest::Proxy;
use tracing::{debug, error};

use self::pacer::Pacer;
use self::request::RequestBuilder;
use self::retry::RetryPolicy;
use self::transport::{ReqwestTransport, Transport};

// ── Dispatch mode ─────────────────────────────────────────────────────────────

/// Which transport entry point a call goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    Direct,
    Proxied(String),
}

impl DispatchMode {
    /// Any non-empty proxy selects the proxied path; `host:port` without a
    /// scheme is accepted as an HTTP proxy. Only addresses that cannot be
    /// turned into a proxy at all are rejected.
    pub fn select(proxy: Option<&str>) -> Result<Self, FetchError> {
        let Some(proxy) = proxy.filter(|p| !p.is_empty()) else {
            return Ok(DispatchMode::Direct);
        };

        Proxy::all(proxy)
            .map_err(|e| FetchError::configuration(format!("invalid proxy {:?}: {}", proxy, e)))?;
        Ok(DispatchMode::Proxied(proxy.to_string()))
    }
}

// ── Fetcher ───────────────────────────────────────────────────────────────────

/// Resilient GET/HEAD entry point.
///
/// Network failures never escape [`Fetcher::fetch`]: they are retried, logged
/// once, and turned into an empty string. Only misuse of the options is
/// returned as an error.
pub struct Fetcher<T: Transport = ReqwestTransport> {
    transport: T,
    builder: RequestBuilder,
    retry: RetryPolicy,
    pacer: Pacer,
}

impl Fetcher<ReqwestTransport> {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout(), config.follow_redirects)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(config: &FetcherConfig, transport: T) -> Self {
        Self {
            transport,
            builder: RequestBuilder::new(
                config.base_headers(),
                config.timeout(),
                config.follow_redirects,
                config.proxy_verify_tls,
            ),
            retry: RetryPolicy::new(config.max_attempts, config.backoff.clone()),
            pacer: Pacer::new(config.request_delay_ms, config.jitter_ms),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Body (or final URL) on success, `""` on any network failure.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        self.fetch_outcome(url, options)
            .await
            .map(FetchOutcome::into_string)
    }

    /// Like [`Fetcher::fetch`] but keeps failure distinguishable from an empty body.
    pub async fn fetch_outcome(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        match self.fetch_with_retry(url, options).await {
            Ok(resp) if options.want_content => Ok(FetchOutcome::Success(resp.body)),
            Ok(resp) => Ok(FetchOutcome::SuccessUrlOnly(resp.final_url)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let channel = options.channel.as_deref().unwrap_or("fetch");
                error!(
                    channel,
                    "Network error, request to {} failed: {}",
                    request::normalize_url(url),
                    e
                );
                Ok(FetchOutcome::Failure {
                    kind: e.kind(),
                    attempts: e.attempts(),
                })
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<ResponseResult, FetchError> {
        let request = self.builder.descriptor(url, options)?;
        let mode = DispatchMode::select(request.proxy.as_deref())?;

        self.retry
            .execute(|_| self.dispatch_once(&request, &mode))
            .await
    }

    /// One attempt: dispatch, wait for the pacer, then check the status.
    async fn dispatch_once(
        &self,
        request: &RequestDescriptor,
        mode: &DispatchMode,
    ) -> Result<ResponseResult, FetchError> {
        debug!("{:?} {} ({:?})", request.method, request.url, mode);

        let response = match mode {
            DispatchMode::Direct => self.transport.send(request).await?,
            DispatchMode::Proxied(proxy) => self.transport.send_via_proxy(request, proxy).await?,
        };

        self.pacer.wait_turn().await;
        Ok(response.error_for_status()?)
    }
}
