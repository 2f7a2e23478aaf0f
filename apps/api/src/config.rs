use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::LlmSettings;
use crate::screening::batch::BatchPolicy;
use crate::screening::pricing::Pricing;

const DEFAULT_LLM_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_LLM_MODEL: &str = "gpt-4";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_temperature: f32,
    /// No built-in default: the rate depends on the provider's pricing tier.
    pub cost_usd_per_token: f64,
    /// No built-in default: fixed conversion used for the local-currency column.
    pub usd_to_inr_rate: f64,
    pub batch_policy: BatchPolicy,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm_temperature: f32 = parse_env("LLM_TEMPERATURE", "0.3")?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&llm_temperature),
            "LLM_TEMPERATURE must be between 0 and 1"
        );

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_api_url: optional_env("LLM_API_URL", DEFAULT_LLM_API_URL),
            llm_model: optional_env("LLM_MODEL", DEFAULT_LLM_MODEL),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", "60")?),
            llm_temperature,
            cost_usd_per_token: require_rate("LLM_COST_USD_PER_TOKEN")?,
            usd_to_inr_rate: require_rate("USD_TO_INR_RATE")?,
            batch_policy: parse_env("BATCH_FAILURE_POLICY", "all_or_nothing")?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", "10485760")?,
            port: parse_env("PORT", "8080")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_url: self.llm_api_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            timeout: self.llm_timeout,
        }
    }

    pub fn pricing(&self) -> Pricing {
        Pricing {
            usd_per_token: self.cost_usd_per_token,
            usd_to_inr: self.usd_to_inr_rate,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = optional_env(key, default);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}"))
}

fn require_rate(key: &str) -> Result<f64> {
    let raw = require_env(key)?;
    let rate: f64 = raw
        .parse()
        .with_context(|| format!("{key} must be a number, got '{raw}'"))?;
    anyhow::ensure!(
        rate.is_finite() && rate >= 0.0,
        "{key} must be a non-negative number"
    );
    Ok(rate)
}
