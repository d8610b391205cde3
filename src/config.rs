use crate::error::{Error, Result};
use std::env;
use std::sync::OnceLock;

use dotenvy::dotenv;

pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

pub const DEFAULT_BASELINE: &str = "- Comp: $120,000 CAD\n\
- Level: Lead Data Engineer\n\
- Stack: Python, SQL, cloud data platforms\n\
- Work type: Hybrid\n\
- Focus: Data Engineering";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub profile: String,
    pub min_score_threshold: f64,
    pub batch_limit: i64,
    pub model_identifier: String,
    pub candidate_baseline: String,
    pub run_name: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            anthropic_api_key: get_env("ANTHROPIC_API_KEY")?,
            telegram_bot_token: get_env("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: get_env("TELEGRAM_CHAT_ID")?,
            profile: get_env("PROFILE")?,
            min_score_threshold: get_env_parse("MIN_SCORE_THRESHOLD")?,
            batch_limit: get_env_parse("BATCH_LIMIT")?,
            model_identifier: env::var("MODEL_IDENTIFIER")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            candidate_baseline: env::var("CANDIDATE_BASELINE")
                .unwrap_or_else(|_| DEFAULT_BASELINE.to_string()),
            run_name: env::var("RUN_NAME").ok(),
        })
    }
}

/// Per-invocation settings passed into the orchestrator. Collects the
/// profile defaults and thresholds that would otherwise be scattered
/// across call sites.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub profile: String,
    pub min_score_threshold: f64,
    pub batch_limit: i64,
    pub model_identifier: String,
    /// Run the notify stage even when selection returns no new postings.
    pub notify_on_empty: bool,
}

impl RunConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            profile: config.profile.clone(),
            min_score_threshold: config.min_score_threshold,
            batch_limit: config.batch_limit,
            model_identifier: config.model_identifier.clone(),
            notify_on_empty: false,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
