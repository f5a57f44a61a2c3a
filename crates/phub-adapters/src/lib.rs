//! Platform adapter contracts + the built-in LeetCode, Codeforces and
//! GeeksforGeeks adapters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::{Platform, PlatformId, QuestionDraft};
use phub_storage::{FetchError, HttpFetcher};
use thiserror::Error;

pub mod browser;
pub mod codeforces;
pub mod gfg;
pub mod leetcode;

pub use browser::{
    detect_browser_capability, BrowserController, BrowserError, BrowserHandle, BrowserLauncher,
    BrowserlessLauncher,
};
pub use codeforces::CodeforcesAdapter;
pub use gfg::GfgAdapter;
pub use leetcode::LeetCodeAdapter;

pub const CRATE_NAME: &str = "phub-adapters";

/// How an adapter reaches its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAccess {
    Api,
    /// Rendered pages when a browser is available, otherwise a fixed seed list.
    BrowserOrSeed,
}

/// Per-scrape inputs shared by every adapter call. The run id lives on the
/// caller's span.
pub struct ScrapeContext<'a> {
    /// Carried for logging only; no adapter changes behaviour on it.
    pub force: bool,
    pub fetched_at: DateTime<Utc>,
    pub http: &'a HttpFetcher,
    pub browser: &'a BrowserController,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{source_name} api reported failure: {message}")]
    Api {
        source_name: &'static str,
        message: String,
    },
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("{0}")]
    Message(String),
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform_id(&self) -> PlatformId;
    fn platform(&self) -> Platform;
    fn access(&self) -> SourceAccess;

    /// Fetches one bounded page, drops records that must never be stored
    /// and maps the rest to drafts. Persistence is the caller's job.
    async fn fetch_drafts(
        &self,
        ctx: &ScrapeContext<'_>,
    ) -> Result<Vec<QuestionDraft>, AdapterError>;
}

/// Upstream locations for the built-in adapters; overridable for tests and
/// mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterEndpoints {
    pub leetcode_graphql: String,
    pub codeforces_api: String,
    pub gfg_listing: String,
}

impl Default for AdapterEndpoints {
    fn default() -> Self {
        Self {
            leetcode_graphql: leetcode::LEETCODE_GRAPHQL_URL.to_string(),
            codeforces_api: codeforces::CODEFORCES_API_URL.to_string(),
            gfg_listing: gfg::GFG_LISTING_URL.to_string(),
        }
    }
}

pub fn adapter_for_platform(
    platform_id: &PlatformId,
    endpoints: &AdapterEndpoints,
) -> Option<Arc<dyn PlatformAdapter>> {
    match platform_id.as_str() {
        "leetcode" => Some(Arc::new(LeetCodeAdapter::new(&endpoints.leetcode_graphql))),
        "codeforces" => Some(Arc::new(CodeforcesAdapter::new(&endpoints.codeforces_api))),
        "gfg" => Some(Arc::new(GfgAdapter::new(&endpoints.gfg_listing))),
        _ => None,
    }
}

/// Ordered `PlatformId -> adapter` map. Registration order is sweep order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(endpoints: &AdapterEndpoints) -> Self {
        let mut registry = Self::new();
        for id in ["leetcode", "codeforces", "gfg"] {
            if let Some(adapter) = adapter_for_platform(&PlatformId::new(id), endpoints) {
                registry.register(adapter);
            }
        }
        registry
    }

    /// Adds an adapter, replacing any earlier one with the same id in place.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        let id = adapter.platform_id();
        match self.adapters.iter().position(|a| a.platform_id() == id) {
            Some(idx) => self.adapters[idx] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn get(&self, platform_id: &PlatformId) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .iter()
            .find(|a| &a.platform_id() == platform_id)
            .cloned()
    }

    pub fn platform_ids(&self) -> Vec<PlatformId> {
        self.adapters.iter().map(|a| a.platform_id()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("platforms", &self.platform_ids())
            .finish()
    }
}
