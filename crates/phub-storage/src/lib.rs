//! Canonical question store + HTTP fetch utilities for the ingestion pipeline.

pub mod http;
pub mod store;

pub use http::{
    classify_reqwest_error, classify_status, BackoffPolicy, FetchError, FetchedResponse,
    HttpClientConfig, HttpFetcher, RetryDisposition,
};
pub use store::{InMemoryQuestionStore, PgQuestionStore, QuestionStore, StoreError};

pub const CRATE_NAME: &str = "phub-storage";
