//! Batch runner: fetches a URL list through one shared [`Fetcher`].
//!
//! Every URL becomes its own task, bounded by a semaphore. Failed fetches
//! are counted as skipped rather than aborting the batch; an empty body
//! still counts as fetched. Only option misuse (e.g. a malformed proxy) is
//! counted as an error.

use crate::config::PipelineConfig;
use crate::fetcher::Fetcher;
use crate::fetcher::transport::Transport;
use crate::models::{FetchOptions, FetchOutcome};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct Pipeline<T: Transport + 'static> {
    fetcher: Arc<Fetcher<T>>,
    config: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct FetchedItem {
    pub url: String,
    pub content: String,
}

impl<T: Transport + 'static> Pipeline<T> {
    pub fn new(fetcher: Fetcher<T>, config: PipelineConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
        }
    }

    /// Fetch every URL; results keep the input order.
    pub async fn run(
        &self,
        urls: Vec<String>,
        options: FetchOptions,
    ) -> (Vec<FetchedItem>, PipelineStats) {
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let options = Arc::new(options);
        let mut handles = Vec::with_capacity(urls.len());

        for url in urls {
            let fetcher = Arc::clone(&self.fetcher);
            let sem = Arc::clone(&sem);
            let options = Arc::clone(&options);
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let outcome = fetcher.fetch_outcome(&task_url, &options).await?;
                Ok::<FetchOutcome, anyhow::Error>(outcome)
            });

            handles.push((url, handle));
        }

        let mut stats = PipelineStats {
            urls: handles.len(),
            ..PipelineStats::default()
        };
        let mut items = Vec::with_capacity(handles.len());

        for (url, handle) in handles {
            match handle.await {
                Ok(Ok(FetchOutcome::Failure { .. })) => stats.skipped += 1,
                Ok(Ok(outcome)) => {
                    stats.fetched += 1;
                    items.push(FetchedItem {
                        url,
                        content: outcome.into_string(),
                    });
                }
                Ok(Err(e)) => {
                    warn!("{}: {:#}", url, e);
                    stats.errors += 1;
                }
                Err(e) => {
                    error!("Task panic for {}: {}", url, e);
                    stats.errors += 1;
                }
            }
        }

        info!(
            "Batch done: {} URLs | {} fetched | {} skipped | {} errors",
            stats.urls, stats.fetched, stats.skipped, stats.errors
        );
        (items, stats)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub urls: usize,
    pub fetched: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackoffConfig, BackoffStrategy, FetcherConfig};
    use crate::error::TransportError;
    use crate::models::{RequestDescriptor, ResponseResult};
    use async_trait::async_trait;

    /// Fails any URL containing "down", echoes the path otherwise.
    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn send(
            &self,
            request: &RequestDescriptor,
        ) -> Result<ResponseResult, TransportError> {
            if request.url.contains("down") {
                return Err(TransportError::Connect("refused".into()));
            }
            if request.url.contains("empty") {
                return Ok(ResponseResult::new(200, request.url.clone(), ""));
            }
            Ok(ResponseResult::new(200, request.url.clone(), request.url.clone()))
        }

        async fn send_via_proxy(
            &self,
            request: &RequestDescriptor,
            _proxy: &str,
        ) -> Result<ResponseResult, TransportError> {
            self.send(request).await
        }
    }

    fn pipeline(concurrency: usize) -> Pipeline<EchoTransport> {
        let cfg = FetcherConfig {
            max_attempts: 2,
            request_delay_ms: 0,
            jitter_ms: 0,
            backoff: BackoffConfig {
                strategy: BackoffStrategy::None,
                ..BackoffConfig::default()
            },
            ..FetcherConfig::default()
        };
        Pipeline::new(
            Fetcher::with_transport(&cfg, EchoTransport),
            PipelineConfig { concurrency },
        )
    }

    #[tokio::test]
    async fn failures_are_skipped_not_fatal() {
        let urls = vec![
            "a.com/1".to_string(),
            "down.com/2".to_string(),
            "b.com/3".to_string(),
        ];
        let (items, stats) = pipeline(2).run(urls, FetchOptions::default()).await;

        assert_eq!(
            stats,
            PipelineStats {
                urls: 3,
                fetched: 2,
                skipped: 1,
                errors: 0,
            }
        );
        let fetched: Vec<_> = items.iter().map(|i| i.content.as_str()).collect();
        assert_eq!(fetched, vec!["https://a.com/1", "https://b.com/3"]);
    }

    #[tokio::test]
    async fn empty_body_counts_as_fetched() {
        let urls = vec!["empty.com".to_string(), "down.com".to_string()];
        let (items, stats) = pipeline(1).run(urls, FetchOptions::default()).await;

        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(items[0].content, "");
    }

    #[tokio::test]
    async fn misuse_is_counted_as_error() {
        let opts = FetchOptions::default().with_proxy("not a proxy");
        let (items, stats) = pipeline(1).run(vec!["a.com".to_string()], opts).await;

        assert!(items.is_empty());
        assert_eq!(stats.errors, 1);
    }
}
