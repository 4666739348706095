//! Persistence contracts for reports and articles.
//!
//! The pipeline only ever talks to [`ReportRepository`] and
//! [`ArticleRepository`]; each call is its own unit of work, so a crash
//! mid-batch leaves records in a pending state that the next run picks up.
//! [`memory::InMemoryStore`] implements both, optionally backed by a JSON
//! snapshot file.

pub mod memory;

use crate::error::Result;
use crate::models::{
    Article, AudienceTier, AuthenticityStatus, ContentTraits, Country, Facts, Language,
    Report, ReportId, SourceReference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The slice of a report the deduplication agent compares against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub id: ReportId,
    pub facts: Facts,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id,
            facts: report.facts.clone(),
        }
    }
}

/// Storage for reports.
///
/// State changes are applied to the stored copy under the repository's own
/// lock, never by writing back a report read earlier, so a reference merge
/// made by a concurrent run is never overwritten.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Store a new report. Fails if a report with the same id exists.
    async fn create(&self, report: Report) -> Result<Report>;

    /// Record a classification on the stored report and return it.
    ///
    /// Fails if the report does not exist or is already classified.
    async fn mark_classified(
        &self,
        id: ReportId,
        tier: AudienceTier,
        reason: String,
        traits: Option<ContentTraits>,
    ) -> Result<Report>;

    /// Close deduplication on the stored report, optionally as an alias of
    /// `duplicate_of`, and return it.
    async fn resolve_deduplication(
        &self,
        id: ReportId,
        duplicate_of: Option<ReportId>,
    ) -> Result<Report>;

    /// The stored report with `id`, if any.
    async fn find_by_id(&self, id: ReportId) -> Result<Option<Report>>;

    /// Reports still waiting for deduplication, oldest first.
    async fn find_pending_deduplication(
        &self,
        country: Option<&Country>,
        limit: usize,
    ) -> Result<Vec<Report>>;

    /// Canonical, deduplicated reports still waiting for classification, oldest first.
    async fn find_pending_classification(&self, limit: usize) -> Result<Vec<Report>>;

    /// Publishable reports for `country` with no article in `language` yet, oldest first.
    async fn find_publishable_without_articles(
        &self,
        country: &Country,
        language: &Language,
        limit: usize,
    ) -> Result<Vec<Report>>;

    /// Up to `limit` source references for `country`, newest reports first.
    async fn find_source_references(
        &self,
        country: &Country,
        limit: usize,
    ) -> Result<Vec<SourceReference>>;

    /// Append references to a report, skipping ones it already has.
    async fn add_source_references(
        &self,
        id: ReportId,
        references: &[SourceReference],
    ) -> Result<Report>;

    /// Canonical reports created since `since`, newest first, minus `exclude`.
    async fn find_recent_summaries(
        &self,
        country: Option<&Country>,
        since: DateTime<Utc>,
        exclude: &[ReportId],
    ) -> Result<Vec<ReportSummary>>;
}

/// Filter and page over articles. Results are ordered newest `published_at` first.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    /// Only articles for this country.
    pub country: Option<Country>,
    /// Only articles in this language.
    pub language: Option<Language>,
    /// Only authentic or only fabricated articles.
    pub authenticity: Option<AuthenticityStatus>,
    /// Only articles composed from this report.
    pub report_id: Option<ReportId>,
    /// Matching articles to skip before the page starts.
    pub offset: usize,
    /// Page size; `None` returns every remaining match.
    pub limit: Option<usize>,
}

impl ArticleQuery {
    /// Every article for one locale.
    pub fn for_locale(language: &Language, country: &Country) -> Self {
        Self {
            country: Some(country.clone()),
            language: Some(language.clone()),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `article` passes every filter set on this query.
    pub fn matches(&self, article: &Article) -> bool {
        self.country.as_ref().is_none_or(|c| &article.country == c)
            && self.language.as_ref().is_none_or(|l| &article.language == l)
            && self
                .authenticity
                .is_none_or(|s| article.authenticity.status() == s)
            && self
                .report_id
                .is_none_or(|id| article.report_ids.contains(&id))
    }
}

/// Storage for articles. Articles are immutable once stored.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Store a batch of new articles and return them.
    async fn create_many(&self, articles: Vec<Article>) -> Result<Vec<Article>>;

    /// One page of matching articles, newest `published_at` first.
    async fn find_many(&self, query: &ArticleQuery) -> Result<Vec<Article>>;

    /// Number of matching articles, ignoring `offset` and `limit`.
    async fn count_many(&self, query: &ArticleQuery) -> Result<usize>;
}
