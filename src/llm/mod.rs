pub mod openai;
#[cfg(test)]
pub(crate) mod scripted;

use std::future::Future;
use std::time::Duration;

use crate::config::Settings;
use crate::error::Result;

pub use openai::OpenAiClient;

/// Text stored in place of a summary when the model call failed.
pub const FAILED_TEXT: &str = "Error";

/// Outcome of a single summarizer call.
///
/// A failed call is a value, not an error: the batch keeps going and the
/// failure contributes nothing but its marker text to a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Generated {
        text: String,
        total_tokens: u64,
        elapsed: Duration,
    },
    Failed {
        reason: String,
    },
}

impl Completion {
    pub fn text(&self) -> &str {
        match self {
            Completion::Generated { text, .. } => text,
            Completion::Failed { .. } => FAILED_TEXT,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        match self {
            Completion::Generated { total_tokens, .. } => *total_tokens,
            Completion::Failed { .. } => 0,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        match self {
            Completion::Generated { elapsed, .. } => elapsed.as_secs_f64(),
            Completion::Failed { .. } => 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Completion::Failed { .. })
    }
}

/// A text-completion backend that turns a block of updates into a summary.
pub trait Summarizer {
    /// Summarize `text`, instructing the model with `prefix`.
    ///
    /// Implementations never fail; transport or decoding problems come back
    /// as [`Completion::Failed`].
    fn summarize(&self, text: &str, prefix: &str) -> impl Future<Output = Completion> + Send;
}

/// Create the completion client from settings and `OPENAI_API_KEY`.
pub fn create_summarizer(settings: &Settings) -> Result<OpenAiClient> {
    Ok(OpenAiClient::from_env()?
        .with_model(settings.model.clone())
        .with_base_url(settings.base_url.clone()))
}
