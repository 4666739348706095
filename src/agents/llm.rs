//! LLM-backed implementations of the agent ports.
//!
//! Each agent renders its prompt, asks through an [`AskAsync`] (normally a
//! [`RetryAsk`](crate::llm::RetryAsk) around an awful_aj template), parses
//! the raw JSON answer and validates it into the port's result type. An
//! answer that fails validation is logged and reported as `None`.

use super::{
    ArticleCompositionAgent, ArticleFabricationAgent, ClassificationResult, CompositionRequest,
    CompositionResult, DeduplicationRequest, DeduplicationResult, FabricationRequest,
    FabricationResult, IngestionResult, ReportClassificationAgent, ReportDeduplicationAgent,
    ReportIngestionAgent, prompts,
};
use crate::error::{Error, Result};
use crate::llm::{AskAsync, ask_json};
use crate::models::{
    ArticleFrame, AudienceTier, Body, Categories, Category, ContentTraits, Discourse, Facts,
    Headline, Report, ReportAngle, ReportId, Stance, Tone,
};
use crate::news::NewsReport;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIngestion {
    facts: String,
    categories: Vec<String>,
    angles: Vec<RawAngle>,
    #[serde(default)]
    traits: ContentTraits,
}

#[derive(Debug, Deserialize)]
struct RawAngle {
    corpus: String,
    stance: String,
    #[serde(default)]
    discourse: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeduplication {
    #[serde(default)]
    duplicate_of_report_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    classification: String,
    reason: String,
    #[serde(default)]
    traits: Option<ContentTraits>,
}

#[derive(Debug, Deserialize)]
struct RawComposition {
    headline: String,
    body: String,
    #[serde(default)]
    frames: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    headline: String,
    body: String,
    #[serde(default)]
    stance: Option<String>,
    #[serde(default)]
    discourse: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFabrication {
    headline: String,
    body: String,
    clarification: String,
    category: String,
    tone: String,
    insert_after_index: i64,
}

fn parse_discourse(raw: Option<&str>) -> Result<Option<Discourse>> {
    raw.filter(|d| !d.trim().is_empty())
        .map(|d| d.parse::<Discourse>())
        .transpose()
}

impl TryFrom<RawIngestion> for IngestionResult {
    type Error = Error;

    fn try_from(raw: RawIngestion) -> Result<Self> {
        let angles = raw
            .angles
            .into_iter()
            .map(|a| {
                Ok(ReportAngle {
                    corpus: Body::new(a.corpus)?,
                    stance: a.stance.parse::<Stance>()?,
                    discourse: parse_discourse(a.discourse.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if angles.is_empty() || angles.len() > Report::MAX_ANGLES {
            return Err(Error::validation(format!(
                "expected 1 to {} angles, got {}",
                Report::MAX_ANGLES,
                angles.len()
            )));
        }
        Ok(IngestionResult {
            facts: Facts::new(raw.facts)?,
            categories: Categories::parse(&raw.categories)?,
            angles,
            traits: raw.traits,
        })
    }
}

impl TryFrom<RawDeduplication> for DeduplicationResult {
    type Error = Error;

    fn try_from(raw: RawDeduplication) -> Result<Self> {
        let duplicate_of = raw
            .duplicate_of_report_id
            .filter(|id| !id.trim().is_empty() && id.trim() != "null")
            .map(|id| id.parse::<ReportId>())
            .transpose()?;
        Ok(DeduplicationResult { duplicate_of })
    }
}

impl TryFrom<RawClassification> for ClassificationResult {
    type Error = Error;

    fn try_from(raw: RawClassification) -> Result<Self> {
        Ok(ClassificationResult {
            tier: raw.classification.parse::<AudienceTier>()?,
            reason: raw.reason.trim().to_string(),
            traits: raw.traits,
        })
    }
}

impl TryFrom<RawComposition> for CompositionResult {
    type Error = Error;

    fn try_from(raw: RawComposition) -> Result<Self> {
        let frames = raw
            .frames
            .into_iter()
            .map(|f| {
                Ok(ArticleFrame {
                    headline: Headline::new(f.headline)?,
                    body: Body::new(f.body)?,
                    stance: f.stance.as_deref().map(|s| s.parse::<Stance>()).transpose()?,
                    discourse: parse_discourse(f.discourse.as_deref())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompositionResult {
            headline: Headline::new(raw.headline)?,
            body: Body::new(raw.body)?,
            frames,
        })
    }
}

impl TryFrom<RawFabrication> for FabricationResult {
    type Error = Error;

    fn try_from(raw: RawFabrication) -> Result<Self> {
        let clarification = raw.clarification.trim().to_string();
        if clarification.is_empty() {
            return Err(Error::validation("fabrication answer has no clarification"));
        }
        Ok(FabricationResult {
            headline: Headline::new(raw.headline)?,
            body: Body::new(raw.body)?,
            clarification,
            category: raw.category.parse::<Category>()?,
            tone: raw.tone.parse::<Tone>()?,
            insert_after_index: raw.insert_after_index,
        })
    }
}

/// Validate a parsed answer, turning a validation failure into `None`.
fn validated<R, T>(raw: Option<R>, agent: &str) -> Option<T>
where
    T: TryFrom<R, Error = Error>,
{
    match T::try_from(raw?) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(agent, error = %e, "Rejected agent answer");
            None
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// [`ReportIngestionAgent`] backed by an LLM chat template.
#[derive(Debug)]
pub struct LlmReportIngestionAgent<A> {
    asker: A,
}

impl<A> LlmReportIngestionAgent<A> {
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait(?Send)]
impl<A> ReportIngestionAgent for LlmReportIngestionAgent<A>
where
    A: AskAsync<Response = String>,
{
    async fn run(&self, news_report: &NewsReport) -> Result<Option<IngestionResult>> {
        let prompt = prompts::report_ingestion(&to_json(news_report)?);
        let raw: Option<RawIngestion> = ask_json(&self.asker, &prompt, "report_ingestion").await?;
        Ok(validated(raw, "report_ingestion"))
    }
}

/// [`ReportDeduplicationAgent`] backed by an LLM chat template.
///
/// Any id in the answer is parsed here; the stage checks it was one of the
/// reports shown.
#[derive(Debug)]
pub struct LlmReportDeduplicationAgent<A> {
    asker: A,
}

impl<A> LlmReportDeduplicationAgent<A> {
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait(?Send)]
impl<A> ReportDeduplicationAgent for LlmReportDeduplicationAgent<A>
where
    A: AskAsync<Response = String>,
{
    async fn run(
        &self,
        request: &DeduplicationRequest<'_>,
    ) -> Result<Option<DeduplicationResult>> {
        let prompt = prompts::report_deduplication(
            &to_json(&request.existing_reports)?,
            &to_json(&request.new_report)?,
        );
        let raw: Option<RawDeduplication> =
            ask_json(&self.asker, &prompt, "report_deduplication").await?;
        Ok(validated(raw, "report_deduplication"))
    }
}

/// [`ReportClassificationAgent`] backed by an LLM chat template.
#[derive(Debug)]
pub struct LlmReportClassificationAgent<A> {
    asker: A,
}

impl<A> LlmReportClassificationAgent<A> {
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait(?Send)]
impl<A> ReportClassificationAgent for LlmReportClassificationAgent<A>
where
    A: AskAsync<Response = String>,
{
    async fn run(&self, report: &Report) -> Result<Option<ClassificationResult>> {
        let prompt = prompts::report_classification(&to_json(report)?);
        let raw: Option<RawClassification> =
            ask_json(&self.asker, &prompt, "report_classification").await?;
        Ok(validated(raw, "report_classification"))
    }
}

/// [`ArticleCompositionAgent`] backed by an LLM chat template.
#[derive(Debug)]
pub struct LlmArticleCompositionAgent<A> {
    asker: A,
}

impl<A> LlmArticleCompositionAgent<A> {
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait(?Send)]
impl<A> ArticleCompositionAgent for LlmArticleCompositionAgent<A>
where
    A: AskAsync<Response = String>,
{
    async fn run(&self, request: &CompositionRequest<'_>) -> Result<Option<CompositionResult>> {
        let prompt = prompts::article_composition(&to_json(request)?, request.report.angles.len());
        let raw: Option<RawComposition> =
            ask_json(&self.asker, &prompt, "article_composition").await?;
        Ok(validated(raw, "article_composition"))
    }
}

/// [`ArticleFabricationAgent`] backed by an LLM chat template.
///
/// An answer whose category differs from the requested one is dropped.
#[derive(Debug)]
pub struct LlmArticleFabricationAgent<A> {
    asker: A,
}

impl<A> LlmArticleFabricationAgent<A> {
    pub fn new(asker: A) -> Self {
        Self { asker }
    }
}

#[async_trait(?Send)]
impl<A> ArticleFabricationAgent for LlmArticleFabricationAgent<A>
where
    A: AskAsync<Response = String>,
{
    async fn run(&self, request: &FabricationRequest<'_>) -> Result<Option<FabricationResult>> {
        let prompt = prompts::article_fabrication(
            &to_json(request)?,
            request.context.recent_articles.len(),
        );
        let raw: Option<RawFabrication> =
            ask_json(&self.asker, &prompt, "article_fabrication").await?;
        let result: Option<FabricationResult> = validated(raw, "article_fabrication");
        Ok(result.filter(|r| {
            let fits = request.target_category.is_none_or(|c| c == r.category);
            if !fits {
                warn!(
                    wanted = ?request.target_category,
                    got = %r.category,
                    "Fabrication ignored the target category"
                );
            }
            fits
        }))
    }
}
