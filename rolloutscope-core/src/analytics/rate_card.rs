//! Model rate card
//!
//! Prices are supplied by the host (fetched, cached, or hand-edited); this
//! module only models them and looks models up.

use crate::error::{Error, Result};
use crate::types::TokenUsage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// USD prices per million tokens for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRate {
    pub model: String,
    #[serde(rename = "inputUsdPer1M")]
    pub input_usd_per_1m: f64,
    #[serde(rename = "cachedInputUsdPer1M", default)]
    pub cached_input_usd_per_1m: f64,
    #[serde(rename = "outputUsdPer1M")]
    pub output_usd_per_1m: f64,
    /// Defaults to the output rate when absent
    #[serde(rename = "reasoningOutputUsdPer1M", default)]
    pub reasoning_output_usd_per_1m: Option<f64>,
}

impl ModelRate {
    /// Estimated USD cost of `usage`.
    ///
    /// Reasoning tokens are a subset of output tokens, so only the
    /// non-reasoning remainder is billed at the output rate.
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        let per_token = |tokens: u64, rate: f64| tokens as f64 / 1_000_000.0 * rate;
        let plain_output = usage
            .output_tokens
            .saturating_sub(usage.reasoning_output_tokens);
        let reasoning_rate = self
            .reasoning_output_usd_per_1m
            .unwrap_or(self.output_usd_per_1m);

        per_token(usage.input_tokens, self.input_usd_per_1m)
            + per_token(usage.cached_input_tokens, self.cached_input_usd_per_1m)
            + per_token(plain_output, self.output_usd_per_1m)
            + per_token(usage.reasoning_output_tokens, reasoning_rate)
    }
}

/// A set of model prices plus provenance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateCard {
    pub models: Vec<ModelRate>,
    pub updated_at: Option<String>,
    pub source: Option<String>,
    pub warnings: Vec<String>,
}

impl RateCard {
    /// Load a rate card from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let card: RateCard = serde_json::from_str(&contents).map_err(|e| Error::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        for warning in &card.warnings {
            tracing::warn!(path = %path.display(), warning = %warning, "Rate card warning");
        }
        Ok(card)
    }

    /// Case-insensitive lookup by model name.
    pub fn rate_for(&self, model: &str) -> Option<&ModelRate> {
        self.models
            .iter()
            .find(|rate| rate.model.eq_ignore_ascii_case(model))
    }
}
