//! Classification: assigning an audience tier to each canonical report.

use crate::agents::ReportClassificationAgent;
use crate::config::ClassificationConfig;
use crate::error::Result;
use crate::store::ReportRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    pub successful: usize,
    /// Agent declined, failed, or the result could not be stored.
    pub failed: usize,
    pub total_reviewed: usize,
}

/// Assigns audience tiers to canonical reports.
pub struct ClassificationStage {
    reports: Arc<dyn ReportRepository>,
    agent: Arc<dyn ReportClassificationAgent>,
    config: ClassificationConfig,
}

impl ClassificationStage {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        agent: Arc<dyn ReportClassificationAgent>,
        config: ClassificationConfig,
    ) -> Self {
        Self {
            reports,
            agent,
            config,
        }
    }

    /// Classify a batch of pending reports. Reports that fail stay pending
    /// for the next run.
    #[instrument(level = "info", skip_all)]
    pub async fn execute(&self) -> Result<ClassificationSummary> {
        let pending = self
            .reports
            .find_pending_classification(self.config.batch_size)
            .await?;

        let mut summary = ClassificationSummary {
            total_reviewed: pending.len(),
            ..ClassificationSummary::default()
        };

        for report in pending {
            let result = match self.agent.run(&report).await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    warn!(report_id = %report.id, "Classification agent gave no usable answer");
                    summary.failed += 1;
                    continue;
                }
                Err(e) => {
                    error!(report_id = %report.id, error = %e, "Classification failed");
                    summary.failed += 1;
                    continue;
                }
            };

            match self
                .reports
                .mark_classified(report.id, result.tier, result.reason, result.traits)
                .await
            {
                Ok(classified) => {
                    info!(report_id = %classified.id, tier = ?classified.tier, "Classified report");
                    summary.successful += 1;
                }
                Err(e) => {
                    error!(report_id = %report.id, error = %e, "Failed to persist classification");
                    summary.failed += 1;
                }
            }
        }

        info!(
            successful = summary.successful,
            failed = summary.failed,
            total_reviewed = summary.total_reviewed,
            "Classification complete"
        );
        Ok(summary)
    }
}
