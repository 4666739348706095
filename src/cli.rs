//! Command-line interface definitions for Report Desk.
//!
//! All arguments can be provided via command-line flags or environment variables.

use crate::config::Locale;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a pipeline run.
///
/// # Examples
///
/// ```sh
/// # One run for every locale in the config file
/// report_desk --config pipeline.yaml --store ./data/store.json
///
/// # Override locales and write JSON editions
/// report_desk -s ./data/store.json -l en:US -l de:DE -j ./json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the pipeline config YAML
    #[arg(short, long, env = "REPORT_DESK_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON snapshot file backing the report and article store
    #[arg(short, long, env = "REPORT_DESK_STORE")]
    pub store: Option<PathBuf>,

    /// Output directory for per-locale JSON run editions
    #[arg(short, long)]
    pub json_output_dir: Option<PathBuf>,

    /// Locale to run, written `language:COUNTRY`; repeat for several (overrides the config)
    #[arg(short, long = "locale")]
    pub locales: Vec<Locale>,

    /// Locale runs allowed in flight at once
    #[arg(long, default_value_t = 1)]
    pub parallel_locales: usize,

    /// World News API key
    #[arg(long, env = "WORLDNEWS_API_KEY", hide_env_values = true)]
    pub worldnews_api_key: String,

    /// awful_aj config.yaml (defaults to the one in the awful_aj config dir)
    #[arg(long, env = "AWFUL_AJ_CONFIG")]
    pub llm_config: Option<PathBuf>,
}
