//! LeetCode via the public GraphQL problem list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::normalize::{difficulty_from_label, topic_from_tags};
use phub_core::{Domain, Platform, PlatformId, QuestionDraft, ScrapingMetadata, SourceType};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{AdapterError, PlatformAdapter, ScrapeContext, SourceAccess};

pub const LEETCODE_GRAPHQL_URL: &str = "https://leetcode.com/graphql";
const PAGE_SIZE: u32 = 50;
const TAKE: usize = 10;

const PROBLEMSET_QUERY: &str = r#"
query problemsetQuestionList($categorySlug: String, $limit: Int, $skip: Int, $filters: QuestionListFilterInput) {
  problemsetQuestionList: questionList(
    categorySlug: $categorySlug
    limit: $limit
    skip: $skip
    filters: $filters
  ) {
    total: totalNum
    questions: data {
      difficulty
      frontendQuestionId: questionFrontendId
      paidOnly: isPaidOnly
      title
      titleSlug
      topicTags {
        name
        slug
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    data: Option<ProblemsetData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ProblemsetData {
    #[serde(rename = "problemsetQuestionList")]
    list: QuestionList,
}

#[derive(Debug, Deserialize)]
struct QuestionList {
    #[serde(default)]
    questions: Vec<LeetCodeQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeetCodeQuestion {
    #[serde(default)]
    pub difficulty: String,
    pub frontend_question_id: String,
    #[serde(default)]
    pub paid_only: bool,
    pub title: String,
    pub title_slug: String,
    #[serde(default)]
    pub topic_tags: Vec<TopicTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicTag {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct LeetCodeAdapter {
    endpoint: String,
}

impl LeetCodeAdapter {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

/// `None` for paid-only questions, which are never stored.
pub fn map_question(q: &LeetCodeQuestion, fetched_at: DateTime<Utc>) -> Option<QuestionDraft> {
    if q.paid_only {
        return None;
    }
    let tags = q
        .topic_tags
        .iter()
        .map(|t| t.name.clone())
        .collect::<Vec<_>>();

    Some(QuestionDraft {
        title: q.title.clone(),
        description: format!("LeetCode Problem: {}", q.title),
        difficulty: difficulty_from_label(&q.difficulty),
        platform: Platform::LeetCode,
        topic: topic_from_tags(&tags),
        domain: Domain::Dsa,
        source_type: SourceType::Scraped,
        tags,
        external_url: format!("https://leetcode.com/problems/{}/", q.title_slug),
        rating: None,
        is_active: true,
        last_scraped: fetched_at,
        scraping_metadata: ScrapingMetadata {
            original_id: q.frontend_question_id.clone(),
            last_updated: fetched_at,
            source: "leetcode-api".to_string(),
        },
    })
}

#[async_trait]
impl PlatformAdapter for LeetCodeAdapter {
    fn platform_id(&self) -> PlatformId {
        PlatformId::from(Platform::LeetCode)
    }

    fn platform(&self) -> Platform {
        Platform::LeetCode
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::Api
    }

    async fn fetch_drafts(
        &self,
        ctx: &ScrapeContext<'_>,
    ) -> Result<Vec<QuestionDraft>, AdapterError> {
        let body = json!({
            "query": PROBLEMSET_QUERY,
            "variables": {
                "categorySlug": "",
                "skip": 0,
                "limit": PAGE_SIZE,
                "filters": {}
            }
        });
        let envelope: GraphQlEnvelope = ctx
            .http
            .post_json("leetcode", &self.endpoint, &body)
            .await?;

        let Some(data) = envelope.data else {
            let message = envelope
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AdapterError::Api {
                source_name: "leetcode",
                message: if message.is_empty() {
                    "response carried no data".to_string()
                } else {
                    message
                },
            });
        };

        let considered = data.list.questions.iter().take(TAKE);
        let drafts = considered
            .filter_map(|q| {
                let draft = map_question(q, ctx.fetched_at);
                if draft.is_none() {
                    debug!(slug = %q.title_slug, "skipping paid-only question");
                }
                draft
            })
            .collect();
        Ok(drafts)
    }
}
