//! Codeforces via the public `problemset.problems` REST endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::normalize::{difficulty_from_rating, topic_from_tags};
use phub_core::{Domain, Platform, PlatformId, QuestionDraft, ScrapingMetadata, SourceType};
use serde::Deserialize;
use tracing::debug;

use crate::{AdapterError, PlatformAdapter, ScrapeContext, SourceAccess};

pub const CODEFORCES_API_URL: &str = "https://codeforces.com/api/problemset.problems";
const TAG_FILTER: &str = "implementation,math,greedy";
const TAKE: usize = 20;

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    status: String,
    comment: Option<String>,
    result: Option<ProblemsetResult>,
}

#[derive(Debug, Deserialize)]
struct ProblemsetResult {
    #[serde(default)]
    problems: Vec<CodeforcesProblem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeforcesProblem {
    pub contest_id: Option<u32>,
    pub index: String,
    pub name: String,
    pub rating: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CodeforcesAdapter {
    endpoint: String,
}

impl CodeforcesAdapter {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

/// Problems outside a contest have no stable problemset url and are skipped.
pub fn map_problem(p: &CodeforcesProblem, fetched_at: DateTime<Utc>) -> Option<QuestionDraft> {
    let contest_id = p.contest_id?;
    Some(QuestionDraft {
        title: p.name.clone(),
        description: format!("Codeforces Problem: {}", p.name),
        difficulty: difficulty_from_rating(p.rating),
        platform: Platform::Codeforces,
        topic: topic_from_tags(&p.tags),
        domain: Domain::Cp,
        source_type: SourceType::Scraped,
        tags: p.tags.clone(),
        external_url: format!(
            "https://codeforces.com/problemset/problem/{contest_id}/{}",
            p.index
        ),
        rating: p.rating,
        is_active: true,
        last_scraped: fetched_at,
        scraping_metadata: ScrapingMetadata {
            original_id: format!("{contest_id}{}", p.index),
            last_updated: fetched_at,
            source: "codeforces-api".to_string(),
        },
    })
}

#[async_trait]
impl PlatformAdapter for CodeforcesAdapter {
    fn platform_id(&self) -> PlatformId {
        PlatformId::from(Platform::Codeforces)
    }

    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    async fn fetch_drafts(
        &self,
        ctx: &ScrapeContext<'_>,
    ) -> Result<Vec<QuestionDraft>, AdapterError> {
        let envelope: ApiEnvelope = ctx
            .http
            .get_json("codeforces", &self.endpoint, &[("tags", TAG_FILTER)])
            .await?;

        if envelope.status != "OK" {
            return Err(AdapterError::Api {
                source_name: "codeforces",
                message: envelope
                    .comment
                    .unwrap_or_else(|| format!("status {}", envelope.status)),
            });
        }

        let problems = envelope.result.map(|r| r.problems).unwrap_or_default();
        Ok(problems
            .iter()
            .take(TAKE)
            .filter_map(|p| {
                let draft = map_problem(p, ctx.fetched_at);
                if draft.is_none() {
                    debug!(name = %p.name, "skipping problem without contest id");
                }
                draft
            })
            .collect())
    }
}
