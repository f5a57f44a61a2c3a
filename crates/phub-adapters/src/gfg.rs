//! GeeksforGeeks has no stable public API.
//!
//! With a browser available the practice listing page is rendered and its
//! problem links are extracted. Without one, or when rendering yields
//! nothing usable, a fixed seed list is ingested so the scrape always ends
//! with a well-defined result.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use phub_core::normalize::{difficulty_from_label, topic_from_tags};
use phub_core::{Domain, Platform, PlatformId, QuestionDraft, ScrapingMetadata, SourceType};
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::{AdapterError, BrowserError, BrowserHandle, PlatformAdapter, ScrapeContext, SourceAccess};

pub const GFG_LISTING_URL: &str = "https://www.geeksforgeeks.org/explore?page=1&sortBy=submissions";
const GFG_ORIGIN: &str = "https://www.geeksforgeeks.org";
const TAKE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedProblem {
    pub title: String,
    pub difficulty: String,
    pub url: String,
}

const SEED_PROBLEMS: &[(&str, &str, &str)] = &[
    (
        "Find the maximum element in an array",
        "Basic",
        "https://practice.geeksforgeeks.org/problems/max-element",
    ),
    (
        "Reverse a string",
        "Basic",
        "https://practice.geeksforgeeks.org/problems/reverse-string",
    ),
    (
        "Binary Search",
        "Easy",
        "https://practice.geeksforgeeks.org/problems/binary-search",
    ),
    (
        "Merge Sort",
        "Medium",
        "https://practice.geeksforgeeks.org/problems/merge-sort",
    ),
    (
        "Longest Common Subsequence",
        "Medium",
        "https://practice.geeksforgeeks.org/problems/lcs",
    ),
];

pub fn seed_problems() -> Vec<ListedProblem> {
    SEED_PROBLEMS
        .iter()
        .map(|(title, difficulty, url)| ListedProblem {
            title: title.to_string(),
            difficulty: difficulty.to_string(),
            url: url.to_string(),
        })
        .collect()
}

/// Pulls problem links out of a rendered listing page. Cards may carry a
/// `data-difficulty` attribute; without it the difficulty label is empty.
pub fn parse_listing_html(html: &str) -> Result<Vec<ListedProblem>, AdapterError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href*="/problems/"]"#)
        .map_err(|e| AdapterError::Message(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for node in document.select(&selector) {
        let Some(href) = node.value().attr("href") else {
            continue;
        };
        let title = node.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let url = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{GFG_ORIGIN}/{}", href.trim_start_matches('/'))
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let difficulty = node
            .value()
            .attr("data-difficulty")
            .unwrap_or_default()
            .to_string();
        out.push(ListedProblem {
            title,
            difficulty,
            url,
        });
    }
    Ok(out)
}

/// The slug after `/problems/`. Listing links carry a trailing numeric
/// page segment (`/problems/<slug>/1`) that must not be taken as the id.
fn original_id(url: &str) -> String {
    let mut segments = url.split('/').filter(|s| !s.is_empty());
    if segments.by_ref().any(|s| s == "problems") {
        if let Some(slug) = segments.next() {
            return slug.to_string();
        }
    }
    url.trim_end_matches('/')
        .rsplit('/')
        .find(|s| !s.is_empty() && !s.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or_default()
        .to_string()
}

pub fn map_problem(p: &ListedProblem, source: &str, fetched_at: DateTime<Utc>) -> QuestionDraft {
    let tags = vec!["geeksforgeeks".to_string()];
    QuestionDraft {
        title: p.title.clone(),
        description: format!("GeeksforGeeks Problem: {}", p.title),
        difficulty: difficulty_from_label(&p.difficulty),
        platform: Platform::Gfg,
        topic: topic_from_tags(&tags),
        domain: Domain::Dsa,
        source_type: SourceType::Scraped,
        tags,
        external_url: p.url.clone(),
        rating: None,
        is_active: true,
        last_scraped: fetched_at,
        scraping_metadata: ScrapingMetadata {
            original_id: original_id(&p.url),
            last_updated: fetched_at,
            source: source.to_string(),
        },
    }
}

#[derive(Debug, Clone)]
pub struct GfgAdapter {
    listing_url: String,
}

impl GfgAdapter {
    pub fn new(listing_url: &str) -> Self {
        Self {
            listing_url: listing_url.to_string(),
        }
    }

    async fn render_listing(
        &self,
        browser: &dyn BrowserHandle,
    ) -> Result<Vec<ListedProblem>, AdapterError> {
        let html = browser.render(&self.listing_url).await?;
        let mut problems = parse_listing_html(&html)?;
        problems.truncate(TAKE);
        Ok(problems)
    }

    fn seed_drafts(&self, fetched_at: DateTime<Utc>) -> Vec<QuestionDraft> {
        seed_problems()
            .iter()
            .map(|p| map_problem(p, "gfg-mock", fetched_at))
            .collect()
    }
}

#[async_trait]
impl PlatformAdapter for GfgAdapter {
    fn platform_id(&self) -> PlatformId {
        PlatformId::from(Platform::Gfg)
    }

    fn platform(&self) -> Platform {
        Platform::Gfg
    }

    fn access(&self) -> SourceAccess {
        SourceAccess::BrowserOrSeed
    }

    async fn fetch_drafts(
        &self,
        ctx: &ScrapeContext<'_>,
    ) -> Result<Vec<QuestionDraft>, AdapterError> {
        let browser = match ctx.browser.require().await {
            Ok(browser) => browser,
            Err(BrowserError::Unavailable) => {
                info!("gfg: no browser, ingesting seed list");
                return Ok(self.seed_drafts(ctx.fetched_at));
            }
            Err(err) => {
                warn!(error = %err, "gfg: browser launch failed, ingesting seed list");
                return Ok(self.seed_drafts(ctx.fetched_at));
            }
        };

        match self.render_listing(browser.as_ref()).await {
            Ok(problems) if !problems.is_empty() => Ok(problems
                .iter()
                .map(|p| map_problem(p, "gfg-browser", ctx.fetched_at))
                .collect()),
            Ok(_) => {
                warn!(url = %self.listing_url, "gfg: rendered listing had no problems, ingesting seed list");
                Ok(self.seed_drafts(ctx.fetched_at))
            }
            Err(err) => {
                warn!(error = %err, "gfg: render failed, ingesting seed list");
                Ok(self.seed_drafts(ctx.fetched_at))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrowserController, BrowserError, BrowserLauncher};
    use phub_core::{Difficulty, Topic};
    use phub_storage::{HttpClientConfig, HttpFetcher};
    use std::sync::Arc;

    const LISTING: &str = r#"
        <html><body>
          <div class="card"><a href="/problems/two-sum/1" data-difficulty="Easy">Two Sum</a></div>
          <div class="card"><a href="https://www.geeksforgeeks.org/problems/kadane/1" data-difficulty="Medium"> Kadane </a></div>
          <div class="card"><a href="/problems/two-sum/1">Two Sum (dup)</a></div>
          <div class="card"><a href="/problems/empty/1"></a></div>
          <a href="/articles/not-a-problem">Article</a>
        </body></html>
    "#;

    struct StaticBrowser {
        html: Option<&'static str>,
    }

    #[async_trait]
    impl BrowserHandle for StaticBrowser {
        async fn render(&self, url: &str) -> Result<String, BrowserError> {
            self.html.map(str::to_string).ok_or(BrowserError::RenderStatus {
                url: url.to_string(),
                status: 503,
            })
        }

        async fn close(&self) -> Result<(), BrowserError> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    struct StaticLauncher(Option<&'static str>);

    #[async_trait]
    impl BrowserLauncher for StaticLauncher {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn launch(&self) -> Result<Arc<dyn BrowserHandle>, BrowserError> {
            Ok(Arc::new(StaticBrowser { html: self.0 }))
        }
    }

    async fn run(browser: BrowserController) -> Vec<QuestionDraft> {
        let http = HttpFetcher::new(HttpClientConfig::default()).unwrap();
        let ctx = ScrapeContext {
            force: false,
            fetched_at: Utc::now(),
            http: &http,
            browser: &browser,
        };
        GfgAdapter::new(GFG_LISTING_URL).fetch_drafts(&ctx).await.unwrap()
    }

    #[test]
    fn parses_problem_links_and_dedupes() {
        let problems = parse_listing_html(LISTING).unwrap();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].url, "https://www.geeksforgeeks.org/problems/two-sum/1");
        assert_eq!(problems[0].difficulty, "Easy");
        assert_eq!(problems[1].title, "Kadane");
    }

    #[test]
    fn listed_problems_get_distinct_slug_ids() {
        let html = r#"
            <a href="https://www.geeksforgeeks.org/problems/two-sum-1587115621/1">Two Sum</a>
            <a href="/problems/kadanes-algorithm-1587115620/1">Kadane's Algorithm</a>
        "#;
        let ids = parse_listing_html(html)
            .unwrap()
            .iter()
            .map(|p| map_problem(p, "gfg-browser", Utc::now()).scraping_metadata.original_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["two-sum-1587115621", "kadanes-algorithm-1587115620"]);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn original_id_skips_numeric_tail_without_problems_segment() {
        assert_eq!(original_id("https://www.geeksforgeeks.org/explore/binary-search/2/"), "binary-search");
        assert_eq!(original_id("https://practice.geeksforgeeks.org/problems/lcs"), "lcs");
    }

    #[tokio::test]
    async fn degraded_mode_ingests_the_seed_list() {
        let drafts = run(BrowserController::degraded()).await;
        assert_eq!(drafts.len(), 5);
        assert_eq!(
            drafts.iter().map(|d| d.difficulty).collect::<Vec<_>>(),
            vec![
                Difficulty::Easy,
                Difficulty::Easy,
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Medium
            ]
        );
        assert!(drafts.iter().all(|d| d.topic == Topic::Other));
        assert!(drafts.iter().all(|d| d.scraping_metadata.source == "gfg-mock"));
        assert_eq!(drafts[4].scraping_metadata.original_id, "lcs");
    }

    #[tokio::test]
    async fn rendered_listing_is_used_when_browser_available() {
        let browser = BrowserController::new(Some(Arc::new(StaticLauncher(Some(LISTING)))));
        let drafts = run(browser).await;
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].scraping_metadata.source, "gfg-browser");
        assert_eq!(drafts[1].difficulty, Difficulty::Medium);
        assert_eq!(drafts[0].scraping_metadata.original_id, "two-sum");
        assert_eq!(drafts[1].scraping_metadata.original_id, "kadane");
    }

    #[tokio::test]
    async fn render_failure_falls_back_to_seeds() {
        let browser = BrowserController::new(Some(Arc::new(StaticLauncher(None))));
        let drafts = run(browser).await;
        assert_eq!(drafts.len(), 5);
        assert!(drafts.iter().all(|d| d.scraping_metadata.source == "gfg-mock"));
    }
}
