//! LLM access with exponential backoff and JSON answer parsing.
//!
//! - [`AskAsync`]: send a prompt, get a response
//! - [`AskFnWrapper`]: `awful_aj::api::ask` bound to one config and template
//! - [`RetryAsk`]: decorator adding retries with backoff and jitter
//! - [`ask_json`]: ask, then parse the answer as JSON, re-asking once when the
//!   answer was cut off mid-document
//!
//! # Backoff
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::{Error, Result};
use crate::utils::{looks_truncated, truncate_for_log};
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors send text to an LLM and return its answer. Decorators such
/// as [`RetryAsk`] and test doubles implement it too.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    ///
    /// # Arguments
    ///
    /// * `text` - The rendered prompt
    ///
    /// # Returns
    ///
    /// The LLM's response, or an error if the request failed.
    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn StdError>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// Rate limits, dropped connections and server errors are retried with a
/// doubling delay plus jitter. The last error is returned once
/// `max_retries` retries have failed.
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay before jitter.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying LLM client to wrap
    /// * `max_retries` - Maximum number of retry attempts
    /// * `base_delay` - Initial delay between retries
    ///
    /// The delay cap defaults to 30 seconds; see [`RetryAsk::with_max_delay`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = AskFnWrapper { config, template };
    /// let retry_client = RetryAsk::new(client, 5, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    /// Replace the delay cap.
    pub fn with_max_delay(mut self, max_delay: StdDuration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff before retry `attempt` (1-based), without jitter.
    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(31) as u32;
        let delay = self.base_delay.saturating_mul(1u32 << shift);
        delay.min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn StdError>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.delay_for(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask`, bound to a config and a chat template.
///
/// One wrapper exists per agent; they share the config and differ in template.
#[derive(Debug, Clone)]
pub struct AskFnWrapper {
    /// The awful_aj configuration (API endpoint, model, keys).
    pub config: Arc<AwfulJadeConfig>,
    /// The chat template holding the agent's system prompt.
    pub template: Arc<ChatTemplate>,
}

impl AskAsync for AskFnWrapper {
    type Response = String;

    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn StdError>> {
        let t0 = Instant::now();
        let res = ask(&self.config, text.to_string(), &self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

/// Strip a surrounding Markdown code fence, which some models add around JSON.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Ask and parse the answer as `T`.
///
/// # Arguments
///
/// * `asker` - The client to ask, usually a [`RetryAsk`]
/// * `prompt` - The rendered prompt
/// * `label` - Agent name used in logs and errors
///
/// # Returns
///
/// `Ok(None)` when the model answers `null` or answers with JSON that does
/// not fit `T`. A truncated answer is re-asked once. Transport failures
/// (after the asker's own retries) are `Err`.
#[instrument(level = "info", skip_all, fields(agent = label))]
pub async fn ask_json<T, A>(asker: &A, prompt: &str, label: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    A: AskAsync<Response = String>,
{
    let t0 = Instant::now();
    let mut response = asker
        .ask(prompt)
        .await
        .map_err(|e| Error::Agent(format!("{label}: {e}")))?;
    let mut parsed = serde_json::from_str::<Option<T>>(strip_code_fence(&response));

    if let Err(e) = &parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing; re-asking once");
            response = asker
                .ask(prompt)
                .await
                .map_err(|e| Error::Agent(format!("{label}: {e}")))?;
            parsed = serde_json::from_str::<Option<T>>(strip_code_fence(&response));
        }
    }

    match parsed {
        Ok(value) => {
            debug!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                null = value.is_none(),
                "Parsed agent answer"
            );
            Ok(value)
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&response, 300),
                "Model returned non-conforming JSON"
            );
            Ok(None)
        }
    }
}
