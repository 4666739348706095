//! # Report Desk
//!
//! A news pipeline that distills clusters of source articles into verified
//! reports, composes neutral articles with one frame per editorial angle,
//! and seeds a controlled share of labeled fabrications for a fake-news
//! detection game.
//!
//! ## Usage
//!
//! ```sh
//! WORLDNEWS_API_KEY=... report_desk --config pipeline.yaml --store ./data/store.json -j ./json
//! ```
//!
//! ## Architecture
//!
//! Each locale (`language:COUNTRY`) runs the same four stages in order:
//! 1. **Ingestion**: fetch clusters from the World News API, skip already seen
//!    sources, distill new clusters into reports
//! 2. **Deduplication**: fold reports about the same event into one
//! 3. **Classification**: assign each report an audience tier
//! 4. **Composition**: write articles for publishable reports, then top up
//!    the fabricated share
//!
//! Every agent is backed by an awful_aj chat template.

use awful_aj::config::AwfulJadeConfig;
use awful_aj::{config as aj_config, config_dir, template};
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod agents;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod news;
mod outputs;
mod pipeline;
mod store;
#[cfg(test)]
mod testing;
mod utils;

use agents::llm::{
    LlmArticleCompositionAgent, LlmArticleFabricationAgent, LlmReportClassificationAgent,
    LlmReportDeduplicationAgent, LlmReportIngestionAgent,
};
use cli::Cli;
use config::{LlmConfig, PipelineConfig};
use llm::{AskFnWrapper, RetryAsk};
use news::worldnews::WorldNewsProvider;
use outputs::json;
use pipeline::{Pipeline, PipelineDeps};
use store::memory::InMemoryStore;
use utils::ensure_writable_dir;

/// Bind an awful_aj template to the shared config, with retries.
async fn template_asker(
    shared: &Arc<AwfulJadeConfig>,
    name: &str,
    llm: &LlmConfig,
) -> Result<RetryAsk<AskFnWrapper>, Box<dyn Error>> {
    let template = template::load_template(name).await?;
    info!(template = name, "Loaded template");
    let asker = AskFnWrapper {
        config: Arc::clone(shared),
        template: Arc::new(template),
    };
    Ok(RetryAsk::new(asker, llm.max_retries, llm.base_delay()).with_max_delay(llm.max_delay()))
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("report_desk starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.store, ?args.json_output_dir, "Parsed CLI arguments");

    // ---- Pipeline config ----
    let mut pipeline_config = match &args.config {
        Some(path) => PipelineConfig::load(path).await?,
        None => PipelineConfig::default(),
    };
    if !args.locales.is_empty() {
        pipeline_config.locales = args.locales.clone();
    }

    // Early check: ensure JSON output dir is writable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "JSON output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    }

    // ---- Store ----
    let store = Arc::new(match &args.store {
        Some(path) => InMemoryStore::open(path).await?,
        None => InMemoryStore::new(),
    });

    // ---- Load awful_aj config & templates ----
    let conf_file = match &args.llm_config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file
        .to_str()
        .ok_or("awful_aj config path is not valid UTF-8")?;
    let aj = Arc::new(aj_config::load_config(config_path)?);
    info!(config_path, "Loaded awful_aj configuration");

    let llm_config = &pipeline_config.llm;
    let templates = &llm_config.templates;
    let news = WorldNewsProvider::new(
        args.worldnews_api_key.clone(),
        &pipeline_config.news.base_url,
        Duration::from_secs(pipeline_config.news.timeout_secs),
    )?;
    let deps = PipelineDeps {
        news: Arc::new(news),
        reports: store.clone(),
        articles: store.clone(),
        ingestion_agent: Arc::new(LlmReportIngestionAgent::new(
            template_asker(&aj, &templates.ingestion, llm_config).await?,
        )),
        deduplication_agent: Arc::new(LlmReportDeduplicationAgent::new(
            template_asker(&aj, &templates.deduplication, llm_config).await?,
        )),
        classification_agent: Arc::new(LlmReportClassificationAgent::new(
            template_asker(&aj, &templates.classification, llm_config).await?,
        )),
        composition_agent: Arc::new(LlmArticleCompositionAgent::new(
            template_asker(&aj, &templates.composition, llm_config).await?,
        )),
        fabrication_agent: Arc::new(LlmArticleFabricationAgent::new(
            template_asker(&aj, &templates.fabrication, llm_config).await?,
        )),
    };
    let pipeline = Pipeline::new(deps, &pipeline_config);

    // ---- Run every locale ----
    let pipeline = &pipeline;
    let json_output_dir = args.json_output_dir.as_deref();
    let parallel = args.parallel_locales.max(1);
    info!(
        locales = pipeline_config.locales.len(),
        parallel, "Starting locale runs"
    );

    let results: Vec<bool> = stream::iter(pipeline_config.locales.iter())
        .map(|locale| async move {
            let summary = match pipeline.execute(&locale.language, &locale.country).await {
                Ok(summary) => summary,
                Err(e) => {
                    error!(%locale, error = %e, "Locale run failed");
                    return false;
                }
            };
            if let Some(dir) = json_output_dir {
                if let Err(e) = json::write_edition(&summary, dir).await {
                    error!(%locale, error = %e, "Failed to write JSON edition");
                }
            }
            true
        })
        .buffer_unordered(parallel)
        .collect()
        .await;

    let failed = results.iter().filter(|ok| !**ok).count();
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        succeeded = results.len() - failed,
        failed,
        "Execution complete"
    );

    if failed > 0 {
        return Err(format!("{failed} locale run(s) failed").into());
    }
    Ok(())
}
