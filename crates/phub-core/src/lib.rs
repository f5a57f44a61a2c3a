//! Canonical question schema shared by the ingestion pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod normalize;

pub const CRATE_NAME: &str = "phub-core";

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 5000;
pub const RATING_MIN: u32 = 800;
pub const RATING_MAX: u32 = 3500;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} value `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(Difficulty, "difficulty", {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

string_enum!(
    /// Platforms a stored question may originate from.
    Platform, "platform", {
    LeetCode => "leetcode",
    Codeforces => "codeforces",
    CodeChef => "codechef",
    AtCoder => "atcoder",
    Gfg => "gfg",
    InterviewBit => "interviewbit",
    Custom => "custom",
});

string_enum!(Topic, "topic", {
    Arrays => "arrays",
    Strings => "strings",
    Trees => "trees",
    Graphs => "graphs",
    Dp => "dp",
    Greedy => "greedy",
    Sorting => "sorting",
    Searching => "searching",
    Math => "math",
    Other => "other",
});

string_enum!(Domain, "domain", {
    Dsa => "dsa",
    Cp => "cp",
    Interview => "interview",
    SystemDesign => "system-design",
});

string_enum!(SourceType, "source type", {
    Ai => "ai",
    Scraped => "scraped",
    Curated => "curated",
    UserSubmitted => "user-submitted",
});

/// Identifier a producer uses to name a platform in a scrape request.
///
/// Always trimmed and lower-cased, so `"LeetCode "` and `"leetcode"` resolve
/// to the same adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlatformId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PlatformId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Platform> for PlatformId {
    fn from(value: Platform) -> Self {
        Self::new(value.as_str())
    }
}

impl From<PlatformId> for String {
    fn from(value: PlatformId) -> Self {
        value.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapingMetadata {
    pub original_id: String,
    pub last_updated: DateTime<Utc>,
    pub source: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft title is empty")]
    EmptyTitle,
    #[error("external url `{0}` is not an http(s) url")]
    InvalidExternalUrl(String),
}

/// Adapter output handed to the store; everything the store may overwrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub platform: Platform,
    pub topic: Topic,
    pub domain: Domain,
    pub source_type: SourceType,
    pub tags: Vec<String>,
    pub external_url: String,
    pub rating: Option<u32>,
    pub is_active: bool,
    pub last_scraped: DateTime<Utc>,
    pub scraping_metadata: ScrapingMetadata,
}

impl QuestionDraft {
    /// Rejects structurally unusable drafts and trims the rest into the
    /// storable shape.
    pub fn validate(mut self) -> Result<Self, DraftError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftError::EmptyTitle);
        }
        self.title = truncate_chars(title, TITLE_MAX_CHARS);
        self.description = truncate_chars(&self.description, DESCRIPTION_MAX_CHARS);

        let url = self.external_url.trim();
        let has_host = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .is_some_and(|rest| !rest.is_empty());
        if !has_host {
            return Err(DraftError::InvalidExternalUrl(self.external_url));
        }
        self.external_url = url.to_string();

        self.rating = self
            .rating
            .filter(|r| (RATING_MIN..=RATING_MAX).contains(r));

        let mut seen = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = tag.trim().to_string();
            if !tag.is_empty() && !seen.contains(&tag) {
                seen.push(tag);
            }
        }
        self.tags = seen;
        Ok(self)
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Stored question. `solved_count` and `submission_count` belong to the
/// serving layer and are never written by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuestion {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub platform: Platform,
    pub topic: Topic,
    pub domain: Domain,
    pub source_type: SourceType,
    pub tags: Vec<String>,
    pub external_url: String,
    pub rating: Option<u32>,
    pub is_active: bool,
    pub last_scraped: DateTime<Utc>,
    pub scraping_metadata: ScrapingMetadata,
    pub solved_count: u64,
    pub submission_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalQuestion {
    pub fn from_draft(draft: QuestionDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            difficulty: draft.difficulty,
            platform: draft.platform,
            topic: draft.topic,
            domain: draft.domain,
            source_type: draft.source_type,
            tags: draft.tags,
            external_url: draft.external_url,
            rating: draft.rating,
            is_active: draft.is_active,
            last_scraped: draft.last_scraped,
            scraping_metadata: draft.scraping_metadata,
            solved_count: 0,
            submission_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites every draft-owned field, keeping identity and counters.
    pub fn apply_draft(&mut self, draft: QuestionDraft, now: DateTime<Utc>) {
        self.title = draft.title;
        self.description = draft.description;
        self.difficulty = draft.difficulty;
        self.platform = draft.platform;
        self.topic = draft.topic;
        self.domain = draft.domain;
        self.source_type = draft.source_type;
        self.tags = draft.tags;
        self.external_url = draft.external_url;
        self.rating = draft.rating;
        self.is_active = draft.is_active;
        self.last_scraped = draft.last_scraped;
        self.scraping_metadata = draft.scraping_metadata;
        self.updated_at = now;
    }
}
