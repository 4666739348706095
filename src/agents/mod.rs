//! The five LLM-backed capabilities the pipeline depends on.
//!
//! Each capability is a narrow trait with a single `run` taking a typed
//! request. `Ok(None)` is the agent declining or answering with something
//! unusable; `Err` is a transport failure. Stages treat both as a per-item
//! failure. The results here are already validated domain values, so a stage
//! never sees a malformed category or an empty headline.
//!
//! Agent calls are awaited one at a time inside a locale run, so the
//! futures are not required to be `Send`.

pub mod llm;
pub mod prompts;

use crate::error::Result;
use crate::models::{
    ArticleFrame, AudienceTier, Body, Categories, Category, ContentTraits, Country, Facts,
    Headline, Language, Report, ReportAngle, ReportId, Tone,
};
use crate::news::NewsReport;
use crate::store::ReportSummary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// A report distilled from one cluster, before it gets an id or a country.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionResult {
    /// Neutral statement of what happened.
    pub facts: Facts,
    pub categories: Categories,
    /// One or two editorial viewpoints found in the sources.
    pub angles: Vec<ReportAngle>,
    pub traits: ContentTraits,
}

/// Distills a cluster of source articles into a report.
#[async_trait(?Send)]
pub trait ReportIngestionAgent {
    /// # Returns
    ///
    /// `None` when the cluster does not hold a reportable event.
    async fn run(&self, news_report: &NewsReport) -> Result<Option<IngestionResult>>;
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// What is being checked for duplication: a raw cluster during ingestion, or
/// a stored report during the standalone pass.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum DeduplicationCandidate<'a> {
    Cluster(&'a NewsReport),
    Report(&'a Report),
}

/// Serialized into the deduplication prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeduplicationRequest<'a> {
    /// Recent canonical reports to compare against, newest first.
    pub existing_reports: &'a [ReportSummary],
    pub new_report: DeduplicationCandidate<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeduplicationResult {
    /// The existing report the candidate repeats, if any.
    pub duplicate_of: Option<ReportId>,
}

/// Decides whether a candidate describes an event already reported.
#[async_trait(?Send)]
pub trait ReportDeduplicationAgent {
    async fn run(&self, request: &DeduplicationRequest<'_>) -> Result<Option<DeduplicationResult>>;
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub tier: AudienceTier,
    /// Short justification, kept on the report.
    pub reason: String,
    /// Replaces the traits set at ingestion when present.
    pub traits: Option<ContentTraits>,
}

/// Assigns an audience tier to a canonical report.
#[async_trait(?Send)]
pub trait ReportClassificationAgent {
    async fn run(&self, report: &Report) -> Result<Option<ClassificationResult>>;
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Serialized into the composition prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest<'a> {
    pub report: &'a Report,
    pub target_country: &'a Country,
    pub target_language: &'a Language,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositionResult {
    pub headline: Headline,
    /// The neutral article body.
    pub body: Body,
    /// One per report angle, in angle order.
    pub frames: Vec<ArticleFrame>,
}

/// Writes the article for a report in a target locale.
#[async_trait(?Send)]
pub trait ArticleCompositionAgent {
    /// The frame count is not checked here; [`crate::models::Article::authentic`]
    /// rejects a mismatch.
    async fn run(&self, request: &CompositionRequest<'_>) -> Result<Option<CompositionResult>>;
}

// ---------------------------------------------------------------------------
// Fabrication
// ---------------------------------------------------------------------------

/// A recent article shown to the fabrication agent for style and placement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentArticle {
    pub headline: Headline,
    pub body: Body,
    pub frames: Vec<ArticleFrame>,
    pub published_at: DateTime<Utc>,
}

/// What the fabrication agent sees of the locale's recent output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricationContext {
    pub current_date: DateTime<Utc>,
    /// Oldest first; `insert_after_index` points into this list.
    pub recent_articles: Vec<RecentArticle>,
}

/// Serialized into the fabrication prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricationRequest<'a> {
    pub target_country: &'a Country,
    pub target_language: &'a Language,
    pub context: &'a FabricationContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FabricationResult {
    pub headline: Headline,
    pub body: Body,
    /// What is false about the article, shown to players afterwards.
    pub clarification: String,
    pub category: Category,
    pub tone: Tone,
    /// Index into the supplied recent articles, or -1 for "before all of them".
    pub insert_after_index: i64,
}

/// Invents a plausible but false article for the detection game.
#[async_trait(?Send)]
pub trait ArticleFabricationAgent {
    async fn run(&self, request: &FabricationRequest<'_>) -> Result<Option<FabricationResult>>;
}
