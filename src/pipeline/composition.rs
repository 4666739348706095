//! Composition: writing authentic articles for publishable reports, then
//! handing over to the fabrication controller.

use super::fabrication::FabricationController;
use crate::agents::{ArticleCompositionAgent, CompositionRequest};
use crate::config::CompositionConfig;
use crate::error::Result;
use crate::models::{Article, Country, Language, Report};
use crate::store::{ArticleRepository, ReportRepository};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Articles produced by one composition pass.
#[derive(Debug, Default)]
pub struct CompositionOutcome {
    /// Authentic articles, one per composed report.
    pub composed: Vec<Article>,
    pub fabricated: Vec<Article>,
}

/// Writes one article per publishable report and locale, then runs fabrication.
pub struct CompositionStage {
    reports: Arc<dyn ReportRepository>,
    articles: Arc<dyn ArticleRepository>,
    agent: Arc<dyn ArticleCompositionAgent>,
    fabrication: FabricationController,
    config: CompositionConfig,
}

impl CompositionStage {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        articles: Arc<dyn ArticleRepository>,
        agent: Arc<dyn ArticleCompositionAgent>,
        fabrication: FabricationController,
        config: CompositionConfig,
    ) -> Self {
        Self {
            reports,
            articles,
            agent,
            fabrication,
            config,
        }
    }

    /// Compose articles for a batch of publishable reports in `language`.
    ///
    /// Each article is stored as soon as it is written. A rejected or failed
    /// composition leaves its report for the next run. A fabrication failure
    /// is logged and does not fail the stage.
    #[instrument(level = "info", skip_all, fields(%language, %country))]
    pub async fn execute(&self, language: &Language, country: &Country) -> Result<CompositionOutcome> {
        let pending = self
            .reports
            .find_publishable_without_articles(country, language, self.config.batch_size)
            .await?;
        info!(reports = pending.len(), "Composing articles");

        let mut composed = Vec::with_capacity(pending.len());
        for report in &pending {
            match self.compose(report, language, country).await {
                Ok(Some(article)) => {
                    info!(report_id = %report.id, article_id = %article.id, "Composed article");
                    composed.push(article);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(report_id = %report.id, error = %e, "Failed to compose article");
                }
            }
        }

        // Runs after the authentic articles are stored so the ratio sees them.
        let fabricated = match self.fabrication.fabricate(language, country).await {
            Ok(articles) => articles,
            Err(e) => {
                error!(error = %e, "Fabrication failed");
                Vec::new()
            }
        };

        info!(
            composed = composed.len(),
            fabricated = fabricated.len(),
            "Composition complete"
        );
        Ok(CompositionOutcome {
            composed,
            fabricated,
        })
    }

    async fn compose(
        &self,
        report: &Report,
        language: &Language,
        country: &Country,
    ) -> Result<Option<Article>> {
        let request = CompositionRequest {
            report,
            target_country: country,
            target_language: language,
        };
        let Some(result) = self.agent.run(&request).await? else {
            warn!(report_id = %report.id, "Composition agent gave no usable article");
            return Ok(None);
        };

        let article = match Article::authentic(
            report,
            language.clone(),
            result.headline,
            result.body,
            result.frames,
            Utc::now(),
        ) {
            Ok(article) => article,
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "Rejected composed article");
                return Ok(None);
            }
        };

        let mut stored = self.articles.create_many(vec![article]).await?;
        Ok(stored.pop())
    }
}
