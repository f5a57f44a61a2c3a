//! Outbound HTTP with per-source admission control.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info_span, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

/// Exponential backoff. `max_retries = 0` means a single attempt.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    pub fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    /// One in-flight request per source keeps rate-limited APIs calm.
    pub per_source_concurrency: usize,
    pub backoff: BackoffPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            global_concurrency: 8,
            per_source_concurrency: 1,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("request limiter closed")]
    LimiterClosed,
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub final_url: String,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    per_source_limit: usize,
    per_source: Mutex<HashMap<String, Arc<Semaphore>>>,
    backoff: BackoffPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_source_limit: config.per_source_concurrency.max(1),
            per_source: Mutex::new(HashMap::new()),
            backoff: config.backoff,
        })
    }

    async fn per_source_semaphore(&self, source_id: &str) -> Arc<Semaphore> {
        let mut map = self.per_source.lock().await;
        map.entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_source_limit)))
            .clone()
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source_id: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let resp = self
            .execute(source_id, url, |client| client.get(url).query(query))
            .await?;
        decode_json(&resp)
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        source_id: &str,
        url: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let resp = self
            .execute(source_id, url, |client| client.post(url).json(body))
            .await?;
        decode_json(&resp)
    }

    /// Sends the request built by `build`, retrying per the backoff policy.
    pub async fn execute<F>(
        &self,
        source_id: &str,
        url: &str,
        build: F,
    ) -> Result<FetchedResponse, FetchError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let _global = self
            .global_limit
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;
        let per_source = self.per_source_semaphore(source_id).await;
        let _source = per_source
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;

        let span = info_span!("http_fetch", source_id, url);
        self.send_with_retry(url, build).instrument(span).await
    }

    async fn send_with_retry<F>(&self, url: &str, build: F) -> Result<FetchedResponse, FetchError>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0usize;
        loop {
            let can_retry = attempt < self.backoff.max_retries;
            match build(&self.client).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        let body = resp.bytes().await.map_err(|source| FetchError::Request {
                            url: final_url.clone(),
                            source,
                        })?;
                        debug!(status = status.as_u16(), bytes = body.len(), "fetched");
                        return Ok(FetchedResponse {
                            status,
                            final_url,
                            body: body.to_vec(),
                        });
                    }

                    if can_retry && classify_status(status) == RetryDisposition::Retryable {
                        warn!(status = status.as_u16(), attempt, "retrying after http status");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if can_retry && classify_reqwest_error(&err) == RetryDisposition::Retryable {
                        warn!(error = %err, attempt, "retrying after request error");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(FetchError::Request {
                        url: url.to_string(),
                        source: err,
                    });
                }
            }
        }
    }
}

fn decode_json<T: DeserializeOwned>(resp: &FetchedResponse) -> Result<T, FetchError> {
    serde_json::from_slice(&resp.body).map_err(|source| FetchError::Decode {
        url: resp.final_url.clone(),
        source,
    })
}
