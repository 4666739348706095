// Test doubles and fixtures.
//
// - CannedAsker (AskAsync): answers prompts from a queue of strings
// - StaticNewsProvider (NewsProvider): fixed clusters, or a fetch failure
// - Scripted<T> (every agent port): queue of replies, then a fallback
//
// Plus builders for reports, articles and clusters in the en:US locale.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::agents::{
    ArticleCompositionAgent, ArticleFabricationAgent, ClassificationResult, CompositionRequest,
    CompositionResult, DeduplicationRequest, DeduplicationResult, FabricationRequest,
    FabricationResult, IngestionResult, ReportClassificationAgent, ReportDeduplicationAgent,
    ReportIngestionAgent,
};
use crate::error::{Error, Result};
use crate::llm::AskAsync;
use crate::models::{
    Article, ArticleFrame, AudienceTier, Body, Categories, Category, ContentTraits, Country,
    DeduplicationState, FabricatedDraft, Facts, Headline, Language, Report, ReportAngle,
    ReportDraft, ReportId, SourceReference, Stance, Tone,
};
use crate::news::{NewsArticle, NewsProvider, NewsReport};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn locale() -> (Language, Country) {
    (Language::new("en").unwrap(), Country::new("US").unwrap())
}

pub fn angle(stance: Stance) -> ReportAngle {
    ReportAngle {
        corpus: Body::new(format!("Everything the {stance:?} sources said about the vote.")).unwrap(),
        stance,
        discourse: None,
    }
}

pub fn frame(headline: &str) -> ArticleFrame {
    ArticleFrame {
        headline: Headline::new(headline).unwrap(),
        body: Body::new(format!("{headline}: the story from this angle.")).unwrap(),
        stance: Some(Stance::Neutral),
        discourse: None,
    }
}

pub fn report_draft(country: &str) -> ReportDraft {
    ReportDraft {
        categories: Categories::single(Category::Politics),
        country: Country::new(country).unwrap(),
        dateline: Utc::now() - Duration::hours(2),
        facts: Facts::new("The city council approved the transit budget on Monday by seven votes to two.")
            .unwrap(),
        angles: vec![angle(Stance::Supportive), angle(Stance::Critical)],
        source_references: vec![
            SourceReference::new(format!("worldnewsapi:{}", Uuid::new_v4())).unwrap(),
            SourceReference::new(format!("worldnewsapi:{}", Uuid::new_v4())).unwrap(),
        ],
        traits: ContentTraits::default(),
        deduplication_state: DeduplicationState::Pending,
    }
}

pub fn report(country: &str) -> Report {
    Report::new(report_draft(country), Utc::now()).unwrap()
}

pub fn report_with_refs(country: &str, refs: &[&str]) -> Report {
    let mut draft = report_draft(country);
    draft.source_references = refs
        .iter()
        .map(|r| SourceReference::new(r).unwrap())
        .collect();
    Report::new(draft, Utc::now()).unwrap()
}

/// A deduplicated report classified into the broad tier.
pub fn publishable_report(country: &str) -> Report {
    let mut report = report(country);
    report.resolve_deduplication(None, Utc::now()).unwrap();
    report
        .classify(AudienceTier::Broad, "Affects every commuter", None, Utc::now())
        .unwrap();
    report
}

pub fn authentic_article(report: &Report, published_at: DateTime<Utc>) -> Article {
    let frames = (0..report.angles.len())
        .map(|i| frame(&format!("Frame {i}")))
        .collect();
    let mut article = Article::authentic(
        report,
        Language::new("en").unwrap(),
        Headline::new("Council approves transit budget").unwrap(),
        Body::new("The council approved the transit budget on Monday.").unwrap(),
        frames,
        Utc::now(),
    )
    .unwrap();
    article.published_at = published_at;
    article
}

pub fn fabricated_article(published_at: DateTime<Utc>) -> Article {
    let (language, country) = locale();
    Article::fabricated(
        FabricatedDraft {
            headline: Headline::new("Council votes to move city hall to the moon").unwrap(),
            body: Body::new("In a surprise vote the council relocated city hall.").unwrap(),
            category: Category::Politics,
            country,
            language,
            clarification: "No such vote took place.".to_string(),
            published_at,
        },
        Utc::now(),
    )
    .unwrap()
}

pub fn cluster(ids: &[&str]) -> NewsReport {
    NewsReport {
        articles: ids
            .iter()
            .map(|id| NewsArticle {
                id: id.to_string(),
                headline: format!("Headline for {id}"),
                body: format!("Body for {id}"),
            })
            .collect(),
        published_at: Utc::now() - Duration::hours(1),
    }
}

pub fn ingestion_result() -> IngestionResult {
    IngestionResult {
        facts: Facts::new("Parliament passed the climate bill on Tuesday by 310 votes to 250.")
            .unwrap(),
        categories: Categories::single(Category::Environment),
        angles: vec![angle(Stance::Supportive), angle(Stance::Critical)],
        traits: ContentTraits::default(),
    }
}

pub fn composition_result(frames: usize) -> CompositionResult {
    CompositionResult {
        headline: Headline::new("Parliament passes climate bill").unwrap(),
        body: Body::new("Parliament passed the climate bill on Tuesday.").unwrap(),
        frames: (0..frames).map(|i| frame(&format!("Frame {i}"))).collect(),
    }
}

pub fn fabrication_result(insert_after_index: i64) -> FabricationResult {
    FabricationResult {
        headline: Headline::new("Town replaces traffic lights with mood rings").unwrap(),
        body: Body::new("Traffic lights now change colour with drivers' moods.").unwrap(),
        clarification: "No town has done this.".to_string(),
        category: Category::Technology,
        tone: Tone::Satirical,
        insert_after_index,
    }
}

// ---------------------------------------------------------------------------
// CannedAsker
// ---------------------------------------------------------------------------

/// Answers every prompt with the next queued string; errors once exhausted.
pub struct CannedAsker {
    answers: RefCell<VecDeque<String>>,
}

impl CannedAsker {
    pub fn new(answers: Vec<&str>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().map(str::to_string).collect()),
        }
    }
}

impl AskAsync for CannedAsker {
    type Response = String;

    async fn ask(&self, _text: &str) -> std::result::Result<String, Box<dyn StdError>> {
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| "no canned answer left".into())
    }
}

// ---------------------------------------------------------------------------
// StaticNewsProvider
// ---------------------------------------------------------------------------

pub struct StaticNewsProvider {
    clusters: Vec<NewsReport>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticNewsProvider {
    pub fn new(clusters: Vec<NewsReport>) -> Self {
        Self {
            clusters,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            clusters: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsProvider for StaticNewsProvider {
    async fn fetch_news(&self, _language: &Language, _country: &Country) -> Result<Vec<NewsReport>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Provider("provider unavailable".to_string()));
        }
        Ok(self.clusters.clone())
    }
}

// ---------------------------------------------------------------------------
// Scripted agents
// ---------------------------------------------------------------------------

/// One scripted agent reply.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Answer(T),
    Null,
    Fail,
}

/// Replays queued replies in order, then keeps giving `fallback`.
pub struct Scripted<T> {
    replies: RefCell<VecDeque<Reply<T>>>,
    fallback: Reply<T>,
    calls: Cell<usize>,
}

impl<T: Clone> Scripted<T> {
    pub fn new(replies: Vec<Reply<T>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            fallback: Reply::Null,
            calls: Cell::new(0),
        }
    }

    pub fn always(value: T) -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            fallback: Reply::Answer(value),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn next(&self) -> Result<Option<T>> {
        self.calls.set(self.calls.get() + 1);
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Answer(value) => Ok(Some(value)),
            Reply::Null => Ok(None),
            Reply::Fail => Err(Error::Agent("scripted failure".to_string())),
        }
    }
}

pub fn unique() -> DeduplicationResult {
    DeduplicationResult { duplicate_of: None }
}

pub fn duplicate_of(id: ReportId) -> DeduplicationResult {
    DeduplicationResult {
        duplicate_of: Some(id),
    }
}

pub fn classified(tier: AudienceTier) -> ClassificationResult {
    ClassificationResult {
        tier,
        reason: "Scripted classification".to_string(),
        traits: Some(ContentTraits {
            enriching: true,
            uplifting: false,
        }),
    }
}

#[async_trait(?Send)]
impl ReportIngestionAgent for Scripted<IngestionResult> {
    async fn run(&self, _news_report: &NewsReport) -> Result<Option<IngestionResult>> {
        self.next()
    }
}

#[async_trait(?Send)]
impl ReportDeduplicationAgent for Scripted<DeduplicationResult> {
    async fn run(
        &self,
        _request: &DeduplicationRequest<'_>,
    ) -> Result<Option<DeduplicationResult>> {
        self.next()
    }
}

#[async_trait(?Send)]
impl ReportClassificationAgent for Scripted<ClassificationResult> {
    async fn run(&self, _report: &Report) -> Result<Option<ClassificationResult>> {
        self.next()
    }
}

#[async_trait(?Send)]
impl ArticleCompositionAgent for Scripted<CompositionResult> {
    async fn run(&self, _request: &CompositionRequest<'_>) -> Result<Option<CompositionResult>> {
        self.next()
    }
}

#[async_trait(?Send)]
impl ArticleFabricationAgent for Scripted<FabricationResult> {
    async fn run(&self, _request: &FabricationRequest<'_>) -> Result<Option<FabricationResult>> {
        self.next()
    }
}
