//! Ingestion: turning provider clusters into reports.

use super::deduplication::{DuplicateCheck, check_duplicate};
use crate::agents::{DeduplicationCandidate, ReportDeduplicationAgent, ReportIngestionAgent};
use crate::config::IngestionConfig;
use crate::error::Result;
use crate::models::{
    Country, DeduplicationState, Language, Report, ReportDraft, SourceReference,
};
use crate::news::{NewsProvider, NewsReport};
use crate::store::{ReportRepository, ReportSummary};
use chrono::{Duration, Utc};
use itertools::Itertools;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// A cluster that survived filtering, with its parsed source references.
#[derive(Debug)]
pub struct Candidate {
    pub cluster: NewsReport,
    pub references: Vec<SourceReference>,
}

/// Cut the provider output down to the clusters worth ingesting.
///
/// Clusters are truncated to `max_clusters` first. A cluster is then dropped
/// when any of its articles was seen before, or when fewer than two of its
/// article ids are valid source references.
pub fn select_clusters(
    clusters: Vec<NewsReport>,
    seen: &HashSet<SourceReference>,
    max_clusters: usize,
) -> Vec<Candidate> {
    clusters
        .into_iter()
        .take(max_clusters)
        .filter_map(|cluster| {
            let references: Vec<SourceReference> = cluster
                .article_ids()
                .filter_map(|id| match SourceReference::new(id) {
                    Ok(reference) => Some(reference),
                    Err(e) => {
                        warn!(id, error = %e, "Dropping article with malformed id");
                        None
                    }
                })
                .unique()
                .collect();

            if let Some(known) = references.iter().find(|r| seen.contains(*r)) {
                debug!(reference = %known, "Skipping already ingested cluster");
                return None;
            }
            if references.len() < 2 {
                debug!(articles = references.len(), "Skipping uncorroborated cluster");
                return None;
            }
            Some(Candidate {
                cluster,
                references,
            })
        })
        .collect()
}

/// Fetches clusters for a locale and turns the new ones into reports.
///
/// With inline deduplication on, each cluster is first checked against the
/// country's recent reports. A duplicate is merged into the existing report
/// without calling the ingestion agent.
pub struct IngestionStage {
    news: Arc<dyn NewsProvider>,
    reports: Arc<dyn ReportRepository>,
    ingestion_agent: Arc<dyn ReportIngestionAgent>,
    deduplication_agent: Arc<dyn ReportDeduplicationAgent>,
    config: IngestionConfig,
}

impl IngestionStage {
    pub fn new(
        news: Arc<dyn NewsProvider>,
        reports: Arc<dyn ReportRepository>,
        ingestion_agent: Arc<dyn ReportIngestionAgent>,
        deduplication_agent: Arc<dyn ReportDeduplicationAgent>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            news,
            reports,
            ingestion_agent,
            deduplication_agent,
            config,
        }
    }

    /// Ingest the latest clusters for a locale, returning the reports created.
    ///
    /// A provider failure or a failed initial read aborts the run. Anything
    /// that goes wrong with a single cluster is logged and skipped.
    #[instrument(level = "info", skip_all, fields(%language, %country))]
    pub async fn execute(&self, language: &Language, country: &Country) -> Result<Vec<Report>> {
        let mut seen: HashSet<SourceReference> = self
            .reports
            .find_source_references(country, self.config.source_reference_window)
            .await?
            .into_iter()
            .collect();
        let since = Utc::now() - Duration::days(self.config.recent_facts_days);
        let mut known = self
            .reports
            .find_recent_summaries(Some(country), since, &[])
            .await?;

        let clusters = self.news.fetch_news(language, country).await?;
        let fetched = clusters.len();
        let candidates = select_clusters(clusters, &seen, self.config.max_clusters);
        info!(
            fetched,
            selected = candidates.len(),
            seen = seen.len(),
            known = known.len(),
            "Selected clusters for ingestion"
        );

        let mut created = Vec::new();
        let mut merged = 0usize;
        for candidate in candidates {
            let ids = candidate.references.iter().join(",");
            // Clusters in one response can share articles.
            if let Some(stored) = candidate.references.iter().find(|r| seen.contains(*r)) {
                debug!(reference = %stored, sources = %ids, "Skipping cluster with a source stored earlier in this run");
                continue;
            }
            let references = candidate.references.clone();
            match self.ingest(candidate, country, &known).await {
                Ok(Ingested::Created(report)) => {
                    info!(report_id = %report.id, sources = %ids, "Created report");
                    seen.extend(references);
                    known.insert(0, ReportSummary::from(&report));
                    created.push(report);
                }
                Ok(Ingested::Merged(report)) => {
                    info!(report_id = %report.id, sources = %ids, "Merged cluster into existing report");
                    seen.extend(references);
                    merged += 1;
                }
                Ok(Ingested::Skipped) => {
                    warn!(sources = %ids, "Ingestion agent gave no usable report");
                }
                Err(e) => {
                    error!(sources = %ids, error = %e, "Failed to ingest cluster");
                }
            }
        }

        info!(created = created.len(), merged, "Ingestion complete");
        Ok(created)
    }

    async fn ingest(
        &self,
        candidate: Candidate,
        country: &Country,
        known: &[ReportSummary],
    ) -> Result<Ingested> {
        let Candidate {
            cluster,
            references,
        } = candidate;

        let deduplication_state = if self.config.inline_deduplication {
            let check = match check_duplicate(
                self.deduplication_agent.as_ref(),
                known,
                DeduplicationCandidate::Cluster(&cluster),
            )
            .await
            {
                Ok(check) => check,
                Err(e) => {
                    warn!(error = %e, "Inline deduplication failed; leaving it to the standalone pass");
                    DuplicateCheck::Inconclusive
                }
            };
            match check {
                DuplicateCheck::DuplicateOf(id) => {
                    let report = self.reports.add_source_references(id, &references).await?;
                    return Ok(Ingested::Merged(report));
                }
                DuplicateCheck::Unique => DeduplicationState::Complete,
                DuplicateCheck::Inconclusive => DeduplicationState::Pending,
            }
        } else {
            DeduplicationState::Pending
        };

        let Some(result) = self.ingestion_agent.run(&cluster).await? else {
            return Ok(Ingested::Skipped);
        };

        let report = Report::new(
            ReportDraft {
                categories: result.categories,
                country: country.clone(),
                dateline: cluster.published_at,
                facts: result.facts,
                angles: result.angles,
                source_references: references,
                traits: result.traits,
                deduplication_state,
            },
            Utc::now(),
        )?;
        let report = self.reports.create(report).await?;
        Ok(Ingested::Created(report))
    }
}

enum Ingested {
    Created(Report),
    Merged(Report),
    Skipped,
}
