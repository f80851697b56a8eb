use thiserror::Error;

/// Failure reported by the transport for a single HTTP exchange.
///
/// Every variant is transient from the fetcher's point of view and is
/// eligible for another attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            // DNS and TLS handshake failures surface here too
            TransportError::Connect(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Misuse of the fetch options. Never retried, always raised.
    #[error("invalid fetch configuration: {0}")]
    Configuration(String),

    /// The target URL does not parse. Fails soft without reaching the transport.
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("all {attempts} attempts failed, last error: {last}")]
    RetriesExhausted { attempts: u32, last: TransportError },
}

/// Coarse classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    Timeout,
    Status(u16),
    Request,
    InvalidUrl,
    Configuration,
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connect(_) => ErrorKind::Connect,
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Status { status, .. } => ErrorKind::Status(*status),
            TransportError::Request(_) => ErrorKind::Request,
        }
    }
}

impl FetchError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        FetchError::Configuration(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Configuration(_))
    }

    /// Kind of the underlying failure; for exhausted retries, that of the last attempt.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(e) => e.kind(),
            FetchError::Configuration(_) => ErrorKind::Configuration,
            FetchError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            FetchError::RetriesExhausted { last, .. } => last.kind(),
        }
    }

    /// Transport attempts spent before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Transport(_) => 1,
            FetchError::RetriesExhausted { attempts, .. } => *attempts,
            FetchError::Configuration(_) | FetchError::InvalidUrl { .. } => 0,
        }
    }
}
