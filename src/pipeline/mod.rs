//! The report pipeline: ingestion, deduplication, classification, then
//! composition with fabrication, run strictly in that order for one locale.
//!
//! Stages talk to each other only through the repositories. Every record a
//! stage leaves behind in a pending state is picked up again by the next run,
//! so a failed or interrupted run can simply be repeated.

pub mod classification;
pub mod composition;
pub mod deduplication;
pub mod fabrication;
pub mod ingestion;

use crate::agents::{
    ArticleCompositionAgent, ArticleFabricationAgent, ReportClassificationAgent,
    ReportDeduplicationAgent, ReportIngestionAgent,
};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{Article, Country, Language, Report};
use crate::news::NewsProvider;
use crate::store::{ArticleRepository, ReportRepository};
use chrono::{DateTime, Utc};
use classification::{ClassificationStage, ClassificationSummary};
use composition::CompositionStage;
use deduplication::DeduplicationStage;
use fabrication::FabricationController;
use ingestion::IngestionStage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything the pipeline is wired from.
pub struct PipelineDeps {
    pub news: Arc<dyn NewsProvider>,
    pub reports: Arc<dyn ReportRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub ingestion_agent: Arc<dyn ReportIngestionAgent>,
    pub deduplication_agent: Arc<dyn ReportDeduplicationAgent>,
    pub classification_agent: Arc<dyn ReportClassificationAgent>,
    pub composition_agent: Arc<dyn ArticleCompositionAgent>,
    pub fabrication_agent: Arc<dyn ArticleFabricationAgent>,
}

/// What one locale run produced.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub language: Language,
    pub country: Country,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Reports created by ingestion.
    pub reports: Vec<Report>,
    /// Reports resolved by the standalone deduplication pass.
    pub deduplicated: Vec<Report>,
    pub classification: ClassificationSummary,
    pub articles: Vec<Article>,
    pub fabricated: Vec<Article>,
}

/// The four stages, wired to shared repositories and agents.
pub struct Pipeline {
    ingestion: IngestionStage,
    deduplication: DeduplicationStage,
    classification: ClassificationStage,
    composition: CompositionStage,
}

impl Pipeline {
    /// Build every stage from `deps`, each with its section of `config`.
    pub fn new(deps: PipelineDeps, config: &PipelineConfig) -> Self {
        let fabrication = FabricationController::new(
            deps.articles.clone(),
            deps.fabrication_agent,
            config.fabrication.clone(),
        );
        Self {
            ingestion: IngestionStage::new(
                deps.news,
                deps.reports.clone(),
                deps.ingestion_agent,
                deps.deduplication_agent.clone(),
                config.ingestion.clone(),
            ),
            deduplication: DeduplicationStage::new(
                deps.reports.clone(),
                deps.deduplication_agent,
                config.deduplication.clone(),
            ),
            classification: ClassificationStage::new(
                deps.reports.clone(),
                deps.classification_agent,
                config.classification.clone(),
            ),
            composition: CompositionStage::new(
                deps.reports,
                deps.articles,
                deps.composition_agent,
                fabrication,
                config.composition.clone(),
            ),
        }
    }

    /// Run every stage once for a locale.
    #[instrument(level = "info", skip_all, fields(%language, %country))]
    pub async fn execute(&self, language: &Language, country: &Country) -> Result<RunSummary> {
        let started_at = Utc::now();

        let reports = self.ingestion.execute(language, country).await?;
        let deduplicated = self.deduplication.execute(Some(country)).await?;
        let classification = self.classification.execute().await?;
        let outcome = self.composition.execute(language, country).await?;

        let summary = RunSummary {
            language: language.clone(),
            country: country.clone(),
            started_at,
            finished_at: Utc::now(),
            reports,
            deduplicated,
            classification,
            articles: outcome.composed,
            fabricated: outcome.fabricated,
        };
        info!(
            reports = summary.reports.len(),
            deduplicated = summary.deduplicated.len(),
            classified = summary.classification.successful,
            articles = summary.articles.len(),
            fabricated = summary.fabricated.len(),
            "Pipeline run complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AudienceTier, ClassificationState};
    use crate::store::memory::InMemoryStore;
    use crate::testing::{
        Scripted, StaticNewsProvider, classified, cluster, composition_result,
        fabrication_result, ingestion_result, locale, unique,
    };

    fn pipeline(store: &Arc<InMemoryStore>, news: StaticNewsProvider, tier: AudienceTier) -> Pipeline {
        Pipeline::new(
            PipelineDeps {
                news: Arc::new(news),
                reports: store.clone(),
                articles: store.clone(),
                ingestion_agent: Arc::new(Scripted::always(ingestion_result())),
                deduplication_agent: Arc::new(Scripted::always(unique())),
                classification_agent: Arc::new(Scripted::always(classified(tier))),
                composition_agent: Arc::new(Scripted::always(composition_result(2))),
                fabrication_agent: Arc::new(Scripted::always(fabrication_result(0))),
            },
            &PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_cluster_becomes_published_article() {
        let store = Arc::new(InMemoryStore::new());
        let news = StaticNewsProvider::new(vec![cluster(&[
            "worldnewsapi:1",
            "worldnewsapi:2",
            "worldnewsapi:3",
        ])]);
        let (language, country) = locale();

        let summary = pipeline(&store, news, AudienceTier::Broad)
            .execute(&language, &country)
            .await
            .unwrap();

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.classification.successful, 1);
        assert_eq!(summary.articles.len(), 1);
        assert_eq!(summary.articles[0].report_ids, vec![summary.reports[0].id]);
        assert!(summary.fabricated.is_empty());
        let stored = store.find_by_id(summary.reports[0].id).await.unwrap().unwrap();
        assert_eq!(stored.classification_state, ClassificationState::Complete);
    }

    #[tokio::test]
    async fn test_off_topic_reports_are_not_published() {
        let store = Arc::new(InMemoryStore::new());
        let news = StaticNewsProvider::new(vec![cluster(&["worldnewsapi:1", "worldnewsapi:2"])]);
        let (language, country) = locale();

        let summary = pipeline(&store, news, AudienceTier::OffTopic)
            .execute(&language, &country)
            .await
            .unwrap();

        assert_eq!(summary.classification.successful, 1);
        assert!(summary.articles.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_fails_the_run() {
        let store = Arc::new(InMemoryStore::new());
        let (language, country) = locale();

        let result = pipeline(&store, StaticNewsProvider::failing(), AudienceTier::Broad)
            .execute(&language, &country)
            .await;

        assert!(result.is_err());
    }
}
