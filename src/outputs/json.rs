//! JSON run editions.
//!
//! Each locale run is written to `{json_output_dir}/{date}/{language}-{country}.json`,
//! where the date is the UTC day the run started. A later run on the same
//! day for the same locale replaces the earlier edition.

use crate::error::Result;
use crate::pipeline::RunSummary;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Where the edition for `summary` lives under `json_output_dir`.
pub fn edition_path(summary: &RunSummary, json_output_dir: &Path) -> PathBuf {
    json_output_dir
        .join(summary.started_at.date_naive().to_string())
        .join(format!("{}-{}.json", summary.language, summary.country))
}

/// Serialize a run summary into its dated edition file.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir.display()))]
pub async fn write_edition(summary: &RunSummary, json_output_dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(summary)?;
    let path = edition_path(summary, json_output_dir);

    if let Some(dir) = path.parent() {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        articles = summary.articles.len(),
        fabricated = summary.fabricated.len(),
        "Wrote JSON edition"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classification::ClassificationSummary;
    use crate::testing::{fabricated_article, locale};
    use chrono::{TimeZone, Utc};

    fn summary() -> RunSummary {
        let (language, country) = locale();
        let started_at = Utc.with_ymd_and_hms(2025, 5, 6, 8, 30, 0).unwrap();
        RunSummary {
            language,
            country,
            started_at,
            finished_at: started_at,
            reports: Vec::new(),
            deduplicated: Vec::new(),
            classification: ClassificationSummary::default(),
            articles: Vec::new(),
            fabricated: vec![fabricated_article(started_at)],
        }
    }

    #[test]
    fn test_edition_path_uses_run_date_and_locale() {
        let path = edition_path(&summary(), Path::new("/srv/news"));
        assert_eq!(path, PathBuf::from("/srv/news/2025-05-06/en-US.json"));
    }

    #[tokio::test]
    async fn test_write_edition() {
        let dir = std::env::temp_dir().join(format!("report_desk_editions_{}", uuid::Uuid::new_v4()));

        let path = write_edition(&summary(), &dir).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["language"], "en");
        assert_eq!(written["country"], "US");
        assert_eq!(written["fabricated"].as_array().unwrap().len(), 1);
        assert_eq!(written["classification"]["totalReviewed"], 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
