//! Canonical question persistence keyed by external url.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::{CanonicalQuestion, QuestionDraft, ScrapingMetadata, UnknownVariant};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("stored row is not a valid question: {0}")]
    Corrupt(String),
}

impl From<UnknownVariant> for StoreError {
    fn from(value: UnknownVariant) -> Self {
        StoreError::Corrupt(value.to_string())
    }
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Insert-or-update keyed by `draft.external_url`. Repeating the same
    /// draft leaves exactly one record.
    async fn upsert(&self, draft: QuestionDraft) -> Result<CanonicalQuestion, StoreError>;

    async fn find_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<CanonicalQuestion>, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// Process-local store used by tests and database-less runs.
#[derive(Debug, Default)]
pub struct InMemoryQuestionStore {
    records: Mutex<HashMap<String, CanonicalQuestion>>,
}

impl InMemoryQuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<CanonicalQuestion> {
        let records = self.records.lock().await;
        let mut out = records.values().cloned().collect::<Vec<_>>();
        out.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.external_url.cmp(&b.external_url))
        });
        out
    }
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn upsert(&self, draft: QuestionDraft) -> Result<CanonicalQuestion, StoreError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;
        let stored = match records.get_mut(&draft.external_url) {
            Some(existing) => {
                existing.apply_draft(draft, now);
                existing.clone()
            }
            None => {
                let created = CanonicalQuestion::from_draft(draft, now);
                records.insert(created.external_url.clone(), created.clone());
                created
            }
        };
        Ok(stored)
    }

    async fn find_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<CanonicalQuestion>, StoreError> {
        Ok(self.records.lock().await.get(external_url).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().await.len())
    }
}

const QUESTION_COLUMNS: &str = "id, title, description, difficulty, platform, topic, domain, \
    source_type, tags, external_url, rating, is_active, last_scraped, original_id, \
    metadata_last_updated, metadata_source, solved_count, submission_count, created_at, updated_at";

/// PostgreSQL-backed store; the `questions` table comes from `migrations/`.
#[derive(Debug, Clone)]
pub struct PgQuestionStore {
    pool: PgPool,
}

impl PgQuestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for PgQuestionStore {
    async fn upsert(&self, draft: QuestionDraft) -> Result<CanonicalQuestion, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO questions (
                id, title, description, difficulty, platform, topic, domain, source_type,
                tags, external_url, rating, is_active, last_scraped, original_id,
                metadata_last_updated, metadata_source, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NOW(), NOW())
            ON CONFLICT (external_url) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                difficulty = EXCLUDED.difficulty,
                platform = EXCLUDED.platform,
                topic = EXCLUDED.topic,
                domain = EXCLUDED.domain,
                source_type = EXCLUDED.source_type,
                tags = EXCLUDED.tags,
                rating = EXCLUDED.rating,
                is_active = EXCLUDED.is_active,
                last_scraped = EXCLUDED.last_scraped,
                original_id = EXCLUDED.original_id,
                metadata_last_updated = EXCLUDED.metadata_last_updated,
                metadata_source = EXCLUDED.metadata_source,
                updated_at = NOW()
            RETURNING {QUESTION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.difficulty.as_str())
            .bind(draft.platform.as_str())
            .bind(draft.topic.as_str())
            .bind(draft.domain.as_str())
            .bind(draft.source_type.as_str())
            .bind(&draft.tags)
            .bind(&draft.external_url)
            .bind(draft.rating.map(|r| r as i32))
            .bind(draft.is_active)
            .bind(draft.last_scraped)
            .bind(&draft.scraping_metadata.original_id)
            .bind(draft.scraping_metadata.last_updated)
            .bind(&draft.scraping_metadata.source)
            .fetch_one(&self.pool)
            .await?;

        question_from_row(&row)
    }

    async fn find_by_external_url(
        &self,
        external_url: &str,
    ) -> Result<Option<CanonicalQuestion>, StoreError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE external_url = $1");
        let row = sqlx::query(&sql)
            .bind(external_url)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(question_from_row).transpose()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

fn question_from_row(row: &PgRow) -> Result<CanonicalQuestion, StoreError> {
    let difficulty: String = row.try_get("difficulty")?;
    let platform: String = row.try_get("platform")?;
    let topic: String = row.try_get("topic")?;
    let domain: String = row.try_get("domain")?;
    let source_type: String = row.try_get("source_type")?;
    let rating: Option<i32> = row.try_get("rating")?;
    let solved_count: i64 = row.try_get("solved_count")?;
    let submission_count: i64 = row.try_get("submission_count")?;
    let last_updated: DateTime<Utc> = row.try_get("metadata_last_updated")?;

    Ok(CanonicalQuestion {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        difficulty: difficulty.parse()?,
        platform: platform.parse()?,
        topic: topic.parse()?,
        domain: domain.parse()?,
        source_type: source_type.parse()?,
        tags: row.try_get("tags")?,
        external_url: row.try_get("external_url")?,
        rating: rating.and_then(|r| u32::try_from(r).ok()),
        is_active: row.try_get("is_active")?,
        last_scraped: row.try_get("last_scraped")?,
        scraping_metadata: ScrapingMetadata {
            original_id: row.try_get("original_id")?,
            last_updated,
            source: row.try_get("metadata_source")?,
        },
        solved_count: solved_count.max(0) as u64,
        submission_count: submission_count.max(0) as u64,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use phub_core::{Difficulty, Domain, Platform, SourceType, Topic};

    fn draft(url: &str, difficulty: Difficulty) -> QuestionDraft {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).single().unwrap();
        QuestionDraft {
            title: "Watermelon".into(),
            description: "Codeforces Problem: Watermelon".into(),
            difficulty,
            platform: Platform::Codeforces,
            topic: Topic::Math,
            domain: Domain::Cp,
            source_type: SourceType::Scraped,
            tags: vec!["math".into()],
            external_url: url.into(),
            rating: Some(800),
            is_active: true,
            last_scraped: at,
            scraping_metadata: ScrapingMetadata {
                original_id: "4A".into(),
                last_updated: at,
                source: "codeforces-api".into(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_same_url_twice_keeps_one_record_with_latest_values() {
        let store = InMemoryQuestionStore::new();
        let url = "https://codeforces.com/problemset/problem/4/A";

        let first = store.upsert(draft(url, Difficulty::Easy)).await.unwrap();
        let second = store.upsert(draft(url, Difficulty::Hard)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(first.id, second.id);
        let stored = store.find_by_external_url(url).await.unwrap().unwrap();
        assert_eq!(stored.difficulty, Difficulty::Hard);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn identical_upserts_are_idempotent() {
        let store = InMemoryQuestionStore::new();
        let url = "https://codeforces.com/problemset/problem/4/A";
        for _ in 0..3 {
            store.upsert(draft(url, Difficulty::Easy)).await.unwrap();
        }
        let all = store.all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].difficulty, Difficulty::Easy);
    }

    #[tokio::test]
    async fn distinct_urls_create_distinct_records() {
        let store = InMemoryQuestionStore::new();
        store
            .upsert(draft("https://codeforces.com/problemset/problem/4/A", Difficulty::Easy))
            .await
            .unwrap();
        store
            .upsert(draft("https://codeforces.com/problemset/problem/1/A", Difficulty::Easy))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store
            .find_by_external_url("https://codeforces.com/problemset/problem/9/Z")
            .await
            .unwrap()
            .is_none());
    }
}
