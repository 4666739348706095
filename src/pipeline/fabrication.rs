//! Fabrication: keeping a controlled share of invented articles in each locale.
//!
//! The controller samples the most recent articles of a locale and tops the
//! fabricated share up to roughly one in three (`ceil(window / 3)` with the
//! default divisor), never more than `max_per_run` at a time and never before
//! the locale holds `min_total_articles` real content.

use crate::agents::{
    ArticleFabricationAgent, FabricationContext, FabricationRequest, RecentArticle,
};
use crate::config::FabricationConfig;
use crate::error::Result;
use crate::models::{Article, Country, FabricatedDraft, Language};
use crate::store::{ArticleQuery, ArticleRepository};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How many fabricated articles a run should add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricationQuota {
    /// Fabricated articles already in the sample.
    pub existing: usize,
    /// Fabricated articles the sample should hold.
    pub desired: usize,
    /// Shortfall, capped at the per-run maximum.
    pub to_generate: usize,
}

impl FabricationQuota {
    /// Compute the quota for `recent`, the newest articles of a locale.
    ///
    /// # Arguments
    ///
    /// * `recent` - Sample of recent articles, authentic and fabricated
    /// * `target_divisor` - One in `target_divisor` articles should be fabricated
    /// * `max_per_run` - Upper bound on `to_generate`
    pub fn compute(recent: &[Article], target_divisor: usize, max_per_run: usize) -> Self {
        let existing = recent.iter().filter(|a| a.is_fabricated()).count();
        let desired = recent.len().div_ceil(target_divisor.max(1));
        Self {
            existing,
            desired,
            to_generate: desired.saturating_sub(existing).min(max_per_run),
        }
    }
}

/// Pick a publish time for a fabricated article.
///
/// `recent` is ordered oldest first. A negative `insert_after` places the
/// article shortly before the oldest one; any other index is clamped into
/// range and the article lands shortly after that one. The result is never
/// later than one minute before `now`. Without recent articles it falls
/// anywhere in the last 24 hours.
pub fn placement_time(
    recent: &[DateTime<Utc>],
    insert_after: i64,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
    min_offset_minutes: i64,
    max_offset_minutes: i64,
) -> DateTime<Utc> {
    let (Some(oldest), Some(newest_index)) = (recent.first(), recent.len().checked_sub(1)) else {
        return now - Duration::seconds(rng.random_range(0..=86_400));
    };

    let offset = Duration::seconds(
        rng.random_range(min_offset_minutes * 60..=max_offset_minutes * 60),
    );
    let placed = match usize::try_from(insert_after) {
        Err(_) => *oldest - offset,
        Ok(index) => recent[index.min(newest_index)] + offset,
    };

    if placed > now {
        now - Duration::minutes(1)
    } else {
        placed
    }
}

/// Tops up a locale's fabricated articles after composition.
///
/// Each fabricated article gets a publish time between existing articles so
/// it cannot be spotted by its position in the feed.
pub struct FabricationController {
    /// Where recent articles are read and fabricated ones stored.
    articles: Arc<dyn ArticleRepository>,
    agent: Arc<dyn ArticleFabricationAgent>,
    config: FabricationConfig,
}

impl FabricationController {
    /// Create a controller writing to `articles`.
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        agent: Arc<dyn ArticleFabricationAgent>,
        config: FabricationConfig,
    ) -> Self {
        Self {
            articles,
            agent,
            config,
        }
    }

    /// Generate and persist this run's fabricated articles for a locale.
    ///
    /// # Returns
    ///
    /// The stored fabricated articles; empty when fabrication is disabled,
    /// the locale is below its baseline, or the share is already met. A
    /// failed agent call skips that one article.
    #[instrument(level = "info", skip_all, fields(%language, %country))]
    pub async fn fabricate(&self, language: &Language, country: &Country) -> Result<Vec<Article>> {
        if !self.config.enabled {
            debug!("Fabrication disabled");
            return Ok(Vec::new());
        }

        let locale = ArticleQuery::for_locale(language, country);
        let total = self.articles.count_many(&locale).await?;
        if total < self.config.min_total_articles {
            info!(
                total,
                baseline = self.config.min_total_articles,
                "Not enough articles yet; skipping fabrication"
            );
            return Ok(Vec::new());
        }

        let mut recent = self
            .articles
            .find_many(&locale.with_limit(self.config.recent_window))
            .await?;
        let quota = FabricationQuota::compute(
            &recent,
            self.config.target_divisor,
            self.config.max_per_run,
        );
        if quota.to_generate == 0 {
            info!(
                existing = quota.existing,
                desired = quota.desired,
                "Fabrication ratio already satisfied"
            );
            return Ok(Vec::new());
        }
        info!(
            total,
            sample = recent.len(),
            existing = quota.existing,
            to_generate = quota.to_generate,
            "Fabricating articles"
        );

        recent.reverse();
        let published: Vec<DateTime<Utc>> = recent.iter().map(|a| a.published_at).collect();
        let context = FabricationContext {
            current_date: Utc::now(),
            recent_articles: recent
                .into_iter()
                .map(|a| RecentArticle {
                    headline: a.headline,
                    body: a.body,
                    frames: a.frames,
                    published_at: a.published_at,
                })
                .collect(),
        };
        let request = FabricationRequest {
            target_country: country,
            target_language: language,
            context: &context,
            tone: self.config.tone,
            target_category: None,
        };

        let mut generated = Vec::with_capacity(quota.to_generate);
        for attempt in 1..=quota.to_generate {
            let result = match self.agent.run(&request).await {
                Ok(Some(result)) => result,
                Ok(None) => {
                    warn!(attempt, "Fabrication agent gave no usable article");
                    continue;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Fabrication failed");
                    continue;
                }
            };

            let now = Utc::now();
            let published_at = placement_time(
                &published,
                result.insert_after_index,
                now,
                &mut rand::rng(),
                self.config.min_offset_minutes,
                self.config.max_offset_minutes,
            );
            let draft = FabricatedDraft {
                headline: result.headline,
                body: result.body,
                category: result.category,
                country: country.clone(),
                language: language.clone(),
                clarification: result.clarification,
                published_at,
            };
            match Article::fabricated(draft, now) {
                Ok(article) => {
                    debug!(
                        attempt,
                        article_id = %article.id,
                        tone = ?result.tone,
                        %published_at,
                        "Fabricated article"
                    );
                    generated.push(article);
                }
                Err(e) => warn!(attempt, error = %e, "Rejected fabricated article"),
            }
        }

        let generated = self.articles.create_many(generated).await?;
        info!(generated = generated.len(), "Fabrication complete");
        Ok(generated)
    }
}
