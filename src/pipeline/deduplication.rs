//! Deduplication: folding reports of the same event into one canonical report.
//!
//! The standalone stage resolves every report still pending deduplication.
//! A duplicate hands its source references to the canonical report and
//! becomes an alias of it; anything else (unique, agent failure, merge
//! failure) is resolved as canonical so it is never reprocessed.

use crate::agents::{DeduplicationCandidate, DeduplicationRequest, ReportDeduplicationAgent};
use crate::config::DeduplicationConfig;
use crate::error::Result;
use crate::models::{Country, Report, ReportId};
use crate::store::{ReportRepository, ReportSummary};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of asking the deduplication agent about one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    Unique,
    DuplicateOf(ReportId),
    /// The agent declined, answered with an id it was not shown, or failed.
    Inconclusive,
}

/// Ask `agent` whether `candidate` repeats one of `existing`.
///
/// With nothing to compare against the candidate is unique and the agent is
/// not called.
pub async fn check_duplicate(
    agent: &dyn ReportDeduplicationAgent,
    existing: &[ReportSummary],
    candidate: DeduplicationCandidate<'_>,
) -> Result<DuplicateCheck> {
    if existing.is_empty() {
        return Ok(DuplicateCheck::Unique);
    }
    let request = DeduplicationRequest {
        existing_reports: existing,
        new_report: candidate,
    };
    let Some(result) = agent.run(&request).await? else {
        return Ok(DuplicateCheck::Inconclusive);
    };
    match result.duplicate_of {
        None => Ok(DuplicateCheck::Unique),
        Some(id) if existing.iter().any(|r| r.id == id) => Ok(DuplicateCheck::DuplicateOf(id)),
        Some(id) => {
            warn!(%id, "Agent named a report it was not shown");
            Ok(DuplicateCheck::Inconclusive)
        }
    }
}

/// The standalone deduplication pass over reports left pending.
pub struct DeduplicationStage {
    reports: Arc<dyn ReportRepository>,
    agent: Arc<dyn ReportDeduplicationAgent>,
    config: DeduplicationConfig,
}

impl DeduplicationStage {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        agent: Arc<dyn ReportDeduplicationAgent>,
        config: DeduplicationConfig,
    ) -> Self {
        Self {
            reports,
            agent,
            config,
        }
    }

    /// Resolve a batch of pending reports, returning them in their resolved state.
    #[instrument(level = "info", skip_all, fields(country = ?country.map(|c| c.as_str())))]
    pub async fn execute(&self, country: Option<&Country>) -> Result<Vec<Report>> {
        let pending = self
            .reports
            .find_pending_deduplication(country, self.config.batch_size)
            .await?;
        if pending.is_empty() {
            debug!("No reports pending deduplication");
            return Ok(Vec::new());
        }

        let pending_ids: Vec<ReportId> = pending.iter().map(|r| r.id).collect();
        let since = Utc::now() - Duration::days(self.config.window_days);
        let mut window = self
            .reports
            .find_recent_summaries(country, since, &pending_ids)
            .await?;
        info!(
            pending = pending.len(),
            window = window.len(),
            "Deduplicating reports"
        );

        let mut resolved = Vec::with_capacity(pending.len());
        let mut merged = 0usize;
        for report in pending {
            let check = match check_duplicate(
                self.agent.as_ref(),
                &window,
                DeduplicationCandidate::Report(&report),
            )
            .await
            {
                Ok(check) => check,
                Err(e) => {
                    error!(report_id = %report.id, error = %e, "Deduplication check failed; resolving as unique");
                    DuplicateCheck::Inconclusive
                }
            };

            let duplicate_of = match check {
                DuplicateCheck::DuplicateOf(canonical) => {
                    match self
                        .reports
                        .add_source_references(canonical, &report.source_references)
                        .await
                    {
                        Ok(_) => {
                            info!(report_id = %report.id, %canonical, "Merged duplicate report");
                            Some(canonical)
                        }
                        Err(e) => {
                            error!(report_id = %report.id, %canonical, error = %e, "Merge failed; resolving as unique");
                            None
                        }
                    }
                }
                DuplicateCheck::Unique => None,
                DuplicateCheck::Inconclusive => {
                    warn!(report_id = %report.id, "Inconclusive deduplication; resolving as unique");
                    None
                }
            };

            let report = match self
                .reports
                .resolve_deduplication(report.id, duplicate_of)
                .await
            {
                Ok(report) => report,
                Err(e) => {
                    error!(report_id = %report.id, error = %e, "Failed to persist deduplication result");
                    continue;
                }
            };
            if duplicate_of.is_some() {
                merged += 1;
            } else {
                // Later reports in this batch compare against this one too.
                window.insert(0, ReportSummary::from(&report));
            }
            resolved.push(report);
        }

        info!(
            resolved = resolved.len(),
            merged,
            "Deduplication complete"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::DeduplicationResult;
    use crate::models::{DeduplicationState, SourceReference};
    use crate::store::memory::InMemoryStore;
    use crate::testing::{Reply, Scripted, duplicate_of, report_with_refs, unique};
    use async_trait::async_trait;

    /// Merges a new source into the candidate report, then calls it unique.
    struct MergingAgent {
        store: Arc<InMemoryStore>,
        reference: SourceReference,
    }

    #[async_trait(?Send)]
    impl ReportDeduplicationAgent for MergingAgent {
        async fn run(
            &self,
            request: &DeduplicationRequest<'_>,
        ) -> Result<Option<DeduplicationResult>> {
            if let DeduplicationCandidate::Report(report) = request.new_report {
                self.store
                    .add_source_references(report.id, &[self.reference.clone()])
                    .await?;
            }
            Ok(Some(unique()))
        }
    }

    fn stage(
        store: &Arc<InMemoryStore>,
        agent: &Arc<Scripted<DeduplicationResult>>,
    ) -> DeduplicationStage {
        DeduplicationStage::new(
            store.clone(),
            agent.clone(),
            DeduplicationConfig::default(),
        )
    }

    async fn canonical(store: &InMemoryStore, refs: &[&str]) -> Report {
        let mut report = report_with_refs("US", refs);
        report.resolve_deduplication(None, Utc::now()).unwrap();
        store.create(report).await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_merges_references_and_becomes_alias() {
        let store = Arc::new(InMemoryStore::new());
        let existing = canonical(&store, &["worldnewsapi:1"]).await;
        let pending = store
            .create(report_with_refs("US", &["worldnewsapi:2", "worldnewsapi:3"]))
            .await
            .unwrap();
        let agent = Arc::new(Scripted::new(vec![Reply::Answer(duplicate_of(existing.id))]));

        let resolved = stage(&store, &agent).execute(None).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].duplicate_of, Some(existing.id));
        let stored = store.find_by_id(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.deduplication_state, DeduplicationState::Complete);
        let canonical = store.find_by_id(existing.id).await.unwrap().unwrap();
        assert_eq!(canonical.source_references.len(), 3);
    }

    #[tokio::test]
    async fn test_unique_and_failed_reports_are_resolved() {
        let store = Arc::new(InMemoryStore::new());
        canonical(&store, &["worldnewsapi:1"]).await;
        let first = store.create(report_with_refs("US", &["worldnewsapi:2"])).await.unwrap();
        let second = store.create(report_with_refs("US", &["worldnewsapi:3"])).await.unwrap();
        let agent = Arc::new(Scripted::new(vec![Reply::Answer(unique()), Reply::Fail]));

        let resolved = stage(&store, &agent).execute(None).await.unwrap();

        assert_eq!(resolved.len(), 2);
        for id in [first.id, second.id] {
            let stored = store.find_by_id(id).await.unwrap().unwrap();
            assert_eq!(stored.deduplication_state, DeduplicationState::Complete);
            assert_eq!(stored.duplicate_of, None);
        }
        assert!(store.find_pending_deduplication(None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_window_skips_agent() {
        let store = Arc::new(InMemoryStore::new());
        store.create(report_with_refs("US", &["worldnewsapi:1"])).await.unwrap();
        let agent = Arc::new(Scripted::new(vec![]));

        let resolved = stage(&store, &agent).execute(None).await.unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(agent.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_members_are_compared_with_each_other() {
        let store = Arc::new(InMemoryStore::new());
        let first = store.create(report_with_refs("US", &["worldnewsapi:1"])).await.unwrap();
        store.create(report_with_refs("US", &["worldnewsapi:2"])).await.unwrap();
        let agent = Arc::new(Scripted::new(vec![Reply::Answer(duplicate_of(first.id))]));

        let resolved = stage(&store, &agent).execute(None).await.unwrap();

        // The first report had nothing to compare against; the second was
        // compared with the first and merged into it.
        assert_eq!(agent.calls(), 1);
        assert_eq!(resolved[1].duplicate_of, Some(first.id));
        let canonical = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(canonical.source_references.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_duplicate_id_is_inconclusive() {
        let store = Arc::new(InMemoryStore::new());
        canonical(&store, &["worldnewsapi:1"]).await;
        let agent = Arc::new(Scripted::new(vec![Reply::Answer(duplicate_of(ReportId::new()))]));
        let window = store
            .find_recent_summaries(None, Utc::now() - Duration::days(3), &[])
            .await
            .unwrap();
        let candidate = report_with_refs("US", &["worldnewsapi:2"]);

        let check = check_duplicate(
            agent.as_ref(),
            &window,
            DeduplicationCandidate::Report(&candidate),
        )
        .await
        .unwrap();
        assert_eq!(check, DuplicateCheck::Inconclusive);
    }

    #[tokio::test]
    async fn test_references_merged_during_the_agent_call_survive() {
        let store = Arc::new(InMemoryStore::new());
        canonical(&store, &["worldnewsapi:1"]).await;
        let pending = store.create(report_with_refs("US", &["worldnewsapi:2"])).await.unwrap();
        let reference = SourceReference::new("worldnewsapi:99").unwrap();
        let agent = Arc::new(MergingAgent {
            store: store.clone(),
            reference: reference.clone(),
        });
        let stage = DeduplicationStage::new(store.clone(), agent, DeduplicationConfig::default());

        let resolved = stage.execute(None).await.unwrap();

        assert_eq!(resolved.len(), 1);
        let stored = store.find_by_id(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.deduplication_state, DeduplicationState::Complete);
        assert_eq!(stored.source_references.len(), 2);
        assert!(stored.source_references.contains(&reference));
    }
}
