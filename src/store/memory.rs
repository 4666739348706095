//! In-memory implementation of both repositories.
//!
//! All state lives behind one mutex, and every change is applied to the
//! stored copy while that lock is held. When opened with a snapshot path the
//! whole state is rewritten to that JSON file after every mutating call
//! (write to a temp file, then rename), and loaded from it on open. Flushes
//! are serialized so the file never goes back to an older state.

use super::{ArticleQuery, ArticleRepository, ReportRepository, ReportSummary};
use crate::error::{Error, Result};
use crate::models::{
    Article, AudienceTier, ClassificationState, ContentTraits, Country, DeduplicationState,
    Language, Report, ReportId, SourceReference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;
use tracing::{debug, info, instrument};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    reports: Vec<Report>,
    #[serde(default)]
    articles: Vec<Article>,
}

/// Report and article store held in memory, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    snapshot: Option<PathBuf>,
    /// Held from serialization through rename.
    flush_lock: tokio::sync::Mutex<()>,
}

impl InMemoryStore {
    /// An empty store that is never written to disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store persisted at `path`, starting empty if the file does not exist yet.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str::<StoreState>(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            reports = state.reports.len(),
            articles = state.articles.len(),
            "Opened store snapshot"
        );
        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
            flush_lock: tokio::sync::Mutex::new(()),
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let _flushing = self.flush_lock.lock().await;
        let json = {
            let state = self.state()?;
            serde_json::to_string_pretty(&*state)?
        };
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "Flushed store snapshot");
        Ok(())
    }

    /// Apply `change` to the stored report under the lock, then flush.
    async fn modify_report(
        &self,
        id: ReportId,
        change: impl FnOnce(&mut Report) -> Result<()>,
    ) -> Result<Report> {
        let updated = {
            let mut state = self.state()?;
            let report = state
                .reports
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| Error::Store(format!("report {id} not found")))?;
            change(report)?;
            report.clone()
        };
        self.flush().await?;
        Ok(updated)
    }
}

fn oldest_first(mut reports: Vec<Report>, limit: usize) -> Vec<Report> {
    reports.sort_by_key(|r| r.created_at);
    reports.truncate(limit);
    reports
}

#[async_trait]
impl ReportRepository for InMemoryStore {
    async fn create(&self, report: Report) -> Result<Report> {
        {
            let mut state = self.state()?;
            if state.reports.iter().any(|r| r.id == report.id) {
                return Err(Error::Store(format!("report {} already exists", report.id)));
            }
            state.reports.push(report.clone());
        }
        self.flush().await?;
        Ok(report)
    }

    async fn mark_classified(
        &self,
        id: ReportId,
        tier: AudienceTier,
        reason: String,
        traits: Option<ContentTraits>,
    ) -> Result<Report> {
        self.modify_report(id, |report| report.classify(tier, reason, traits, Utc::now()))
            .await
    }

    async fn resolve_deduplication(
        &self,
        id: ReportId,
        duplicate_of: Option<ReportId>,
    ) -> Result<Report> {
        self.modify_report(id, |report| {
            report.resolve_deduplication(duplicate_of, Utc::now())
        })
        .await
    }

    async fn find_by_id(&self, id: ReportId) -> Result<Option<Report>> {
        let state = self.state()?;
        Ok(state.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn find_pending_deduplication(
        &self,
        country: Option<&Country>,
        limit: usize,
    ) -> Result<Vec<Report>> {
        let state = self.state()?;
        let pending = state
            .reports
            .iter()
            .filter(|r| r.deduplication_state == DeduplicationState::Pending)
            .filter(|r| country.is_none_or(|c| &r.country == c))
            .cloned()
            .collect();
        Ok(oldest_first(pending, limit))
    }

    async fn find_pending_classification(&self, limit: usize) -> Result<Vec<Report>> {
        let state = self.state()?;
        let pending = state
            .reports
            .iter()
            .filter(|r| r.classification_state == ClassificationState::Pending)
            .filter(|r| r.deduplication_state == DeduplicationState::Complete)
            .filter(|r| !r.is_alias())
            .cloned()
            .collect();
        Ok(oldest_first(pending, limit))
    }

    async fn find_publishable_without_articles(
        &self,
        country: &Country,
        language: &Language,
        limit: usize,
    ) -> Result<Vec<Report>> {
        let state = self.state()?;
        let reports = state
            .reports
            .iter()
            .filter(|r| &r.country == country && r.is_publishable())
            .filter(|r| {
                !state
                    .articles
                    .iter()
                    .any(|a| &a.language == language && a.report_ids.contains(&r.id))
            })
            .cloned()
            .collect();
        Ok(oldest_first(reports, limit))
    }

    async fn find_source_references(
        &self,
        country: &Country,
        limit: usize,
    ) -> Result<Vec<SourceReference>> {
        let state = self.state()?;
        let mut reports: Vec<&Report> = state
            .reports
            .iter()
            .filter(|r| &r.country == country)
            .collect();
        reports.sort_by_key(|r| Reverse(r.created_at));
        Ok(reports
            .into_iter()
            .flat_map(|r| r.source_references.iter().cloned())
            .take(limit)
            .collect())
    }

    async fn add_source_references(
        &self,
        id: ReportId,
        references: &[SourceReference],
    ) -> Result<Report> {
        self.modify_report(id, |report| {
            report.add_source_references(references.iter().cloned(), Utc::now());
            Ok(())
        })
        .await
    }

    async fn find_recent_summaries(
        &self,
        country: Option<&Country>,
        since: DateTime<Utc>,
        exclude: &[ReportId],
    ) -> Result<Vec<ReportSummary>> {
        let state = self.state()?;
        let mut recent: Vec<&Report> = state
            .reports
            .iter()
            .filter(|r| !r.is_alias() && r.created_at >= since)
            .filter(|r| country.is_none_or(|c| &r.country == c))
            .filter(|r| !exclude.contains(&r.id))
            .collect();
        recent.sort_by_key(|r| Reverse(r.created_at));
        Ok(recent.into_iter().map(ReportSummary::from).collect())
    }
}

#[async_trait]
impl ArticleRepository for InMemoryStore {
    async fn create_many(&self, articles: Vec<Article>) -> Result<Vec<Article>> {
        if articles.is_empty() {
            return Ok(articles);
        }
        {
            let mut state = self.state()?;
            state.articles.extend(articles.iter().cloned());
        }
        self.flush().await?;
        Ok(articles)
    }

    async fn find_many(&self, query: &ArticleQuery) -> Result<Vec<Article>> {
        let state = self.state()?;
        let mut matching: Vec<&Article> =
            state.articles.iter().filter(|a| query.matches(a)).collect();
        matching.sort_by_key(|a| (Reverse(a.published_at), a.id));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn count_many(&self, query: &ArticleQuery) -> Result<usize> {
        let state = self.state()?;
        Ok(state.articles.iter().filter(|a| query.matches(a)).count())
    }
}
