//! [World News API](https://worldnewsapi.com) client.
//!
//! Uses the `top-news` endpoint, which already groups articles into
//! clusters covering the same story. A cluster's publish time is the
//! earliest publish date among its articles.

use super::{NewsArticle, NewsProvider, NewsReport};
use crate::error::{Error, Result};
use crate::models::{Country, Language};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.worldnewsapi.com";
const ID_PREFIX: &str = "worldnewsapi";
const PUBLISH_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct TopNewsResponse {
    #[serde(default)]
    top_news: Vec<TopNewsCluster>,
}

#[derive(Debug, Deserialize)]
struct TopNewsCluster {
    #[serde(default)]
    news: Vec<TopNewsArticle>,
}

#[derive(Debug, Deserialize)]
struct TopNewsArticle {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    publish_date: Option<String>,
}

/// Client for the World News API `top-news` endpoint.
#[derive(Debug, Clone)]
pub struct WorldNewsProvider {
    /// HTTP client with the configured timeout.
    client: reqwest::Client,
    /// API root; `top-news` is joined onto it.
    base_url: Url,
    /// Sent as the `x-api-key` header.
    api_key: String,
}

impl WorldNewsProvider {
    /// Create a client for the API at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `api_key` - World News API key
    /// * `base_url` - API root, usually [`DEFAULT_BASE_URL`]
    /// * `timeout` - Per-request timeout
    ///
    /// # Returns
    ///
    /// An error if `base_url` does not parse or the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid World News API url {base_url:?}: {e}")))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn top_news_url(&self, language: &Language, country: &Country) -> Result<Url> {
        let mut url = self
            .base_url
            .join("top-news")
            .map_err(|e| Error::Config(format!("invalid World News API url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("source-country", &country.as_str().to_lowercase())
            .append_pair("language", language.as_str())
            .append_pair("headlines-only", "false");
        Ok(url)
    }
}

#[async_trait]
impl NewsProvider for WorldNewsProvider {
    #[instrument(level = "info", skip_all, fields(%language, %country))]
    async fn fetch_news(
        &self,
        language: &Language,
        country: &Country,
    ) -> Result<Vec<NewsReport>> {
        let url = self.top_news_url(language, country)?;
        debug!(%url, "Requesting top news");
        let response = self
            .client
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "World News API returned {status}: {}",
                crate::utils::truncate_for_log(&body, 300)
            )));
        }

        let payload: TopNewsResponse = response.json().await?;
        let clusters = clusters_from_response(payload, Utc::now());
        info!(clusters = clusters.len(), "Fetched top news clusters");
        Ok(clusters)
    }
}

fn clusters_from_response(payload: TopNewsResponse, now: DateTime<Utc>) -> Vec<NewsReport> {
    payload
        .top_news
        .into_iter()
        .filter(|cluster| !cluster.news.is_empty())
        .map(|cluster| {
            let published_at = cluster
                .news
                .iter()
                .filter_map(|a| a.publish_date.as_deref().and_then(parse_publish_date))
                .min()
                .unwrap_or(now);
            let articles = cluster
                .news
                .into_iter()
                .map(|a| NewsArticle {
                    id: format!("{ID_PREFIX}:{}", a.id),
                    headline: a.title,
                    body: a.text,
                })
                .collect();
            NewsReport {
                articles,
                published_at,
            }
        })
        .collect()
}

fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    match NaiveDateTime::parse_from_str(raw.trim(), PUBLISH_DATE_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            warn!(raw, error = %e, "Unparseable publish_date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "top_news": [
            {"news": [
                {"id": 101, "title": "Storm hits coast", "text": "A storm made landfall.", "publish_date": "2025-05-06 10:30:00"},
                {"id": 102, "title": "Coastal storm", "text": "Residents evacuated.", "publish_date": "2025-05-06 09:15:00"}
            ]},
            {"news": []},
            {"news": [
                {"id": 103, "title": "Markets rally", "text": "Stocks rose.", "publish_date": "not a date"}
            ]}
        ],
        "language": "en",
        "country": "us"
    }"#;

    #[test]
    fn test_clusters_from_response() {
        let payload: TopNewsResponse = serde_json::from_str(SAMPLE).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 5, 7, 0, 0, 0).unwrap();
        let clusters = clusters_from_response(payload, now);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].articles.len(), 2);
        assert_eq!(clusters[0].articles[0].id, "worldnewsapi:101");
        assert_eq!(
            clusters[0].published_at,
            Utc.with_ymd_and_hms(2025, 5, 6, 9, 15, 0).unwrap()
        );
        assert_eq!(clusters[1].published_at, now);
    }

    #[test]
    fn test_top_news_url() {
        let provider =
            WorldNewsProvider::new("key", DEFAULT_BASE_URL, Duration::from_secs(5)).unwrap();
        let url = provider
            .top_news_url(&Language::new("en").unwrap(), &Country::new("US").unwrap())
            .unwrap();
        assert_eq!(url.path(), "/top-news");
        let query = url.query().unwrap();
        assert!(query.contains("source-country=us"));
        assert!(query.contains("language=en"));
    }
}
