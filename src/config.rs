//! Pipeline configuration loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) gives a working
//! configuration for a single `en:US` locale.
//!
//! ```yaml
//! locales:
//!   - en:US
//!   - de:DE
//! fabrication:
//!   min_total_articles: 10
//!   max_per_run: 3
//! llm:
//!   max_retries: 5
//! ```

use crate::error::{Error, Result};
use crate::models::{Country, Language, Tone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// A `(language, country)` pair the pipeline runs for, written `en:US`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    pub language: Language,
    pub country: Country,
}

impl FromStr for Locale {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (language, country) = s
            .split_once(':')
            .ok_or_else(|| Error::Config(format!("locale {s:?} must look like en:US")))?;
        Ok(Locale {
            language: Language::new(language)?,
            country: Country::new(country)?,
        })
    }
}

impl TryFrom<String> for Locale {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(value: Locale) -> String {
        value.to_string()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Clusters taken from the provider per run.
    pub max_clusters: usize,
    /// How many of the most recent source references count as "already seen".
    pub source_reference_window: usize,
    /// Age limit of the reports inline deduplication compares against.
    pub recent_facts_days: i64,
    /// Check each cluster for duplicates before asking the ingestion agent.
    pub inline_deduplication: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_clusters: 3,
            source_reference_window: 5000,
            recent_facts_days: 3,
            inline_deduplication: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// Pending reports resolved per run.
    pub batch_size: usize,
    /// Age limit of the canonical reports a candidate is compared against.
    pub window_days: i64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            window_days: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub batch_size: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub batch_size: usize,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self { batch_size: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricationConfig {
    pub enabled: bool,
    /// No fabrication until a locale has at least this many articles.
    pub min_total_articles: usize,
    /// Recent articles sampled to measure the fabricated share.
    pub recent_window: usize,
    /// Aim for `ceil(window / target_divisor)` fabricated articles in the sample.
    pub target_divisor: usize,
    /// Fabrications added per run, at most [`FabricationConfig::MAX_PER_RUN`].
    pub max_per_run: usize,
    /// Unset lets the agent pick.
    pub tone: Option<Tone>,
    pub min_offset_minutes: i64,
    pub max_offset_minutes: i64,
}

impl FabricationConfig {
    pub const MAX_PER_RUN: usize = 3;
}

impl Default for FabricationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_total_articles: 10,
            recent_window: 10,
            target_divisor: 3,
            max_per_run: Self::MAX_PER_RUN,
            tone: None,
            min_offset_minutes: 2,
            max_offset_minutes: 10,
        }
    }
}

/// awful_aj chat template names, one per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateNames {
    pub ingestion: String,
    pub deduplication: String,
    pub classification: String,
    pub composition: String,
    pub fabrication: String,
}

impl Default for TemplateNames {
    fn default() -> Self {
        Self {
            ingestion: "report_ingestion".to_string(),
            deduplication: "report_deduplication".to_string(),
            classification: "report_classification".to_string(),
            composition: "article_composition".to_string(),
            fabrication: "article_fabrication".to_string(),
        }
    }
}

/// Retry settings and template names for the LLM agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Retries per prompt after the first failed attempt.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub templates: TemplateNames,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            templates: TemplateNames::default(),
        }
    }
}

impl LlmConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: crate::news::worldnews::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Top-level pipeline configuration. Every section and field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub locales: Vec<Locale>,
    pub ingestion: IngestionConfig,
    pub deduplication: DeduplicationConfig,
    pub classification: ClassificationConfig,
    pub composition: CompositionConfig,
    pub fabrication: FabricationConfig,
    pub llm: LlmConfig,
    pub news: NewsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locales: vec![Locale {
                language: Language::new("en").expect("valid language"),
                country: Country::new("US").expect("valid country"),
            }],
            ingestion: IngestionConfig::default(),
            deduplication: DeduplicationConfig::default(),
            classification: ClassificationConfig::default(),
            composition: CompositionConfig::default(),
            fabrication: FabricationConfig::default(),
            llm: LlmConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a config document. An empty document gives the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = if yaml.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    /// Read and parse the config file at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml(&yaml)?;
        info!(locales = config.locales.len(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Reject values the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        let f = &self.fabrication;
        if f.target_divisor == 0 {
            return Err(Error::Config("fabrication.target_divisor must be > 0".into()));
        }
        if f.max_per_run > FabricationConfig::MAX_PER_RUN {
            return Err(Error::Config(format!(
                "fabrication.max_per_run must be at most {}, got {}",
                FabricationConfig::MAX_PER_RUN,
                f.max_per_run
            )));
        }
        if f.min_offset_minutes < 0 || f.min_offset_minutes > f.max_offset_minutes {
            return Err(Error::Config(format!(
                "fabrication offsets must satisfy 0 <= min ({}) <= max ({})",
                f.min_offset_minutes, f.max_offset_minutes
            )));
        }
        if self.ingestion.recent_facts_days < 0 || self.deduplication.window_days < 0 {
            return Err(Error::Config("day windows cannot be negative".into()));
        }
        if self.locales.is_empty() {
            return Err(Error::Config("at least one locale is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = PipelineConfig::from_yaml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.locales[0].to_string(), "en:US");
        assert_eq!(config.fabrication.min_total_articles, 10);
        assert_eq!(config.ingestion.max_clusters, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
locales:
  - en:us
  - de:DE
fabrication:
  max_per_run: 1
  tone: satirical
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.locales.len(), 2);
        assert_eq!(config.locales[0].country.as_str(), "US");
        assert_eq!(config.fabrication.max_per_run, 1);
        assert_eq!(config.fabrication.tone, Some(Tone::Satirical));
        assert_eq!(config.fabrication.recent_window, 10);
        assert_eq!(config.composition.batch_size, 20);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(PipelineConfig::from_yaml("locales: [english]").is_err());
        assert!(PipelineConfig::from_yaml("fabrication:\n  target_divisor: 0").is_err());
        assert!(PipelineConfig::from_yaml("fabrication:\n  max_per_run: 4").is_err());
        assert!(PipelineConfig::from_yaml("fabrication:\n  max_per_run: 0").is_ok());
        assert!(
            PipelineConfig::from_yaml(
                "fabrication:\n  min_offset_minutes: 10\n  max_offset_minutes: 2"
            )
            .is_err()
        );
        assert!(PipelineConfig::from_yaml("locales: []").is_err());
    }

    #[test]
    fn test_locale_parsing() {
        let locale: Locale = "fr:fr".parse().unwrap();
        assert_eq!(locale.language.as_str(), "fr");
        assert_eq!(locale.country.as_str(), "FR");
        assert!("fr".parse::<Locale>().is_err());
    }
}
