use crate::error::{ErrorKind, TransportError};
use std::collections::BTreeMap;
use std::time::Duration;

// ── Request ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Head,
}

/// Fully-formed description of one outbound request. Built fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,            // always carries a scheme
    pub headers: BTreeMap<String, String>,
    pub cookie: Option<String>,
    pub proxy: Option<String>,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub verify_tls: bool,
}

// ── Response ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseResult {
    pub status: u16,
    pub final_url: String,      // post-redirect
    pub body: String,
    pub succeeded: bool,
}

impl ResponseResult {
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            body: body.into(),
            succeeded: (200..300).contains(&status),
        }
    }

    /// Turn a non-success status into a transport-level error.
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.succeeded {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status,
                url: self.final_url,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(String),
    SuccessUrlOnly(String),
    /// `kind` is that of the last error seen; `attempts` is 0 when nothing was dispatched.
    Failure { kind: ErrorKind, attempts: u32 },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, FetchOutcome::Failure { .. })
    }

    /// Collapse into the string contract: body, final URL, or `""`.
    pub fn into_string(self) -> String {
        match self {
            FetchOutcome::Success(body) => body,
            FetchOutcome::SuccessUrlOnly(url) => url,
            FetchOutcome::Failure { .. } => String::new(),
        }
    }
}

// ── Retry bookkeeping ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<TransportError>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

// ── Caller options ────────────────────────────────────────────────────────────

/// Transport passthrough knobs.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Overrides the fetcher-wide timeout for this call.
    pub timeout: Option<Duration>,
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Return the body when true, the final URL otherwise.
    pub want_content: bool,
    pub cookie: Option<String>,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub method: Method,
    /// Extra field attached to the failure log line.
    pub channel: Option<String>,
    pub transport: TransportOptions,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            want_content: true,
            cookie: None,
            proxy: None,
            user_agent: None,
            method: Method::Get,
            channel: None,
            transport: TransportOptions::default(),
        }
    }
}

impl FetchOptions {
    pub fn url_only() -> Self {
        Self {
            want_content: false,
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }
}
