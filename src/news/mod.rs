//! News sources feeding the ingestion stage.
//!
//! A provider returns clusters of articles that cover the same event. Each
//! article id is namespaced by provider (`worldnewsapi:<n>`) so it can be
//! matched against the source references already stored on reports.

pub mod worldnews;

use crate::error::Result;
use crate::models::{Country, Language};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One source article as the provider returned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsArticle {
    /// Provider-namespaced id, e.g. `worldnewsapi:123`.
    pub id: String,
    pub headline: String,
    pub body: String,
}

/// A cluster of articles about one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsReport {
    pub articles: Vec<NewsArticle>,
    /// Earliest publish time among the articles.
    pub published_at: DateTime<Utc>,
}

impl NewsReport {
    /// Ids of the cluster's articles, in provider order.
    pub fn article_ids(&self) -> impl Iterator<Item = &str> {
        self.articles.iter().map(|a| a.id.as_str())
    }
}

/// A source of clustered top news for a locale.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Fetch the current clusters for `language` in `country`.
    ///
    /// # Returns
    ///
    /// Clusters in the provider's ranking order, or an error when the
    /// provider could not be reached. The ingestion stage aborts on `Err`.
    async fn fetch_news(&self, language: &Language, country: &Country)
    -> Result<Vec<NewsReport>>;
}
