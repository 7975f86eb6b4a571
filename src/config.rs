//! Environment-driven configuration and the `check` setup report.
//!
//! Variables may also come from a `.env` file in the working directory.

use crate::agent::{PriceAgent, PriceAgentConfig};
use crate::fetcher::{Fetcher, FetcherConfig};
use crate::llm_config::{ApiKeyValidator, LlmConfig, LlmSettings, ProviderChoice};
use crate::llm_providers::LlmProvider;
use crate::market::MarketCatalog;
use crate::reply::DEFAULT_MAX_CHARS;
use crate::social::{DryRunClient, SocialClient, XClient, DEFAULT_X_API_BASE};
use crate::{ListingSource, ScoutError, WebListingSource, DEFAULT_MAX_CONCURRENT};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub llm: LlmSettings,
    pub x_bearer_token: Option<String>,
    pub x_api_base: String,
    pub bot_handle: Option<String>,
    /// Log replies instead of posting them.
    pub dry_run: bool,
    pub timeout: Duration,
    pub max_concurrent: usize,
    /// JSON catalog replacing the built-in market values.
    pub catalog_path: Option<PathBuf>,
    pub reply_max_chars: usize,
    /// The `.env` file that was loaded, if any.
    pub env_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            x_bearer_token: None,
            x_api_base: DEFAULT_X_API_BASE.to_string(),
            bot_handle: None,
            dry_run: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            catalog_path: None,
            reply_max_chars: DEFAULT_MAX_CHARS,
            env_file: None,
        }
    }
}

impl AgentConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ScoutError> {
        let env_file = match dotenvy::dotenv() {
            Ok(path) => {
                debug!(path = %path.display(), "Loaded .env file");
                Some(path)
            }
            Err(e) => {
                debug!(error = %e, ".env file not loaded");
                None
            }
        };

        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.env_file = env_file;
        Ok(config)
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let provider = match get("LLM_PROVIDER") {
            Some(raw) => ProviderChoice::from_str(&raw)?,
            None => ProviderChoice::Auto,
        };

        Ok(Self {
            llm: LlmSettings {
                provider,
                openai_api_key: get("OPENAI_API_KEY"),
                openai_model: get("OPENAI_MODEL"),
                anthropic_api_key: get("ANTHROPIC_API_KEY"),
                anthropic_model: get("ANTHROPIC_MODEL"),
            },
            x_bearer_token: get("X_BEARER_TOKEN"),
            x_api_base: get("X_API_BASE").unwrap_or(defaults.x_api_base),
            bot_handle: get("BOT_HANDLE"),
            dry_run: get("SCOUT_DRY_RUN")
                .map(|v| parse_bool("SCOUT_DRY_RUN", &v))
                .transpose()?
                .unwrap_or(defaults.dry_run),
            timeout: get("SCOUT_TIMEOUT_SECS")
                .map(|v| parse_number::<u64>("SCOUT_TIMEOUT_SECS", &v))
                .transpose()?
                .map_or(defaults.timeout, Duration::from_secs),
            max_concurrent: get("SCOUT_MAX_CONCURRENCY")
                .map(|v| parse_number::<usize>("SCOUT_MAX_CONCURRENCY", &v))
                .transpose()?
                .unwrap_or(defaults.max_concurrent),
            catalog_path: get("SCOUT_CATALOG").map(PathBuf::from),
            reply_max_chars: get("SCOUT_REPLY_MAX_CHARS")
                .map(|v| parse_number::<usize>("SCOUT_REPLY_MAX_CHARS", &v))
                .transpose()?
                .unwrap_or(defaults.reply_max_chars),
            env_file: None,
        })
    }

    pub fn catalog(&self) -> Result<MarketCatalog, ScoutError> {
        match &self.catalog_path {
            Some(path) => MarketCatalog::from_json_file(path),
            None => Ok(MarketCatalog::default()),
        }
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout: self.timeout,
            ..FetcherConfig::default()
        }
    }

    pub fn llm_provider(&self) -> Result<Option<Arc<dyn LlmProvider>>, ScoutError> {
        LlmConfig::build(&self.llm)
    }

    /// The X client, or a dry-run client when posting is off or no token is set.
    pub fn social_client(&self) -> Result<Arc<dyn SocialClient>, ScoutError> {
        if self.dry_run {
            return Ok(Arc::new(DryRunClient::new()));
        }
        match &self.x_bearer_token {
            Some(token) => Ok(Arc::new(
                XClient::new(token.clone())?.with_base_url(self.x_api_base.clone()),
            )),
            None => {
                warn!("X_BEARER_TOKEN not set, replies will not be posted");
                Ok(Arc::new(DryRunClient::new()))
            }
        }
    }

    pub fn agent_config(&self) -> Result<PriceAgentConfig, ScoutError> {
        Ok(PriceAgentConfig {
            catalog: self.catalog()?,
            max_concurrent: self.max_concurrent,
            bot_handle: self.bot_handle.clone(),
            reply_max_chars: self.reply_max_chars,
            ..PriceAgentConfig::default()
        })
    }

    /// An agent that scrapes live pages.
    pub fn build_agent(&self) -> Result<PriceAgent, ScoutError> {
        let fetcher = Fetcher::new_with_config(self.fetcher_config())?;
        self.build_agent_with_source(Arc::new(WebListingSource::new_with_fetcher(fetcher)))
    }

    pub fn build_agent_with_source(
        &self,
        source: Arc<dyn ListingSource>,
    ) -> Result<PriceAgent, ScoutError> {
        Ok(PriceAgent::new_with_config(
            source,
            self.social_client()?,
            self.llm_provider()?,
            self.agent_config()?,
        ))
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ScoutError> {
    raw.parse::<T>().map_err(|_| {
        ScoutError::InvalidConfiguration(format!("{key} must be a non-negative integer, got '{raw}'"))
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ScoutError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScoutError::InvalidConfiguration(format!(
            "{key} must be true or false, got '{raw}'"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
    /// How to fix a failed check.
    pub hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }
}

/// Setup verification shown by `price-scout check`.
#[derive(Debug, Clone, Default)]
pub struct SetupReport {
    pub checks: Vec<CheckResult>,
}

impl SetupReport {
    pub fn check(config: &AgentConfig) -> Self {
        let mut checks = Vec::new();

        checks.push(match &config.env_file {
            Some(path) => CheckResult::pass(".env file", format!("loaded {}", path.display())),
            None => CheckResult::fail(
                ".env file",
                "no .env file found",
                "create .env with your API keys, or export them in the shell",
            ),
        });

        checks.push(check_llm(&config.llm));

        checks.push(match (&config.x_bearer_token, config.dry_run) {
            (_, true) => CheckResult::pass("posting", "dry run, replies are only logged"),
            (Some(_), false) => CheckResult::pass("posting", "X_BEARER_TOKEN is set"),
            (None, false) => CheckResult::fail(
                "posting",
                "X_BEARER_TOKEN is not set",
                "add X_BEARER_TOKEN, or set SCOUT_DRY_RUN=true",
            ),
        });

        checks.push(match config.catalog() {
            Ok(catalog) if catalog.is_empty() => CheckResult::fail(
                "catalog",
                "catalog has no categories",
                "add at least one category to the SCOUT_CATALOG file",
            ),
            Ok(catalog) => CheckResult::pass(
                "catalog",
                format!("{} categories ({})", catalog.len(), catalog.categories().collect::<Vec<_>>().join(", ")),
            ),
            Err(e) => CheckResult::fail(
                "catalog",
                e.to_string(),
                "point SCOUT_CATALOG at a readable JSON file",
            ),
        });

        Self { checks }
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

fn check_llm(settings: &LlmSettings) -> CheckResult {
    const NAME: &str = "LLM";
    const HINT: &str = "set OPENAI_API_KEY or ANTHROPIC_API_KEY, or LLM_PROVIDER=none";

    match LlmConfig::build(settings) {
        Ok(Some(provider)) => CheckResult::pass(NAME, format!("{} provider ready", provider.name())),
        Ok(None) if settings.provider == ProviderChoice::None => {
            CheckResult::pass(NAME, "disabled, template replies")
        }
        Ok(None) => {
            let key_error = settings
                .openai_api_key
                .as_deref()
                .map(ApiKeyValidator::validate_openai_key)
                .or_else(|| {
                    settings
                        .anthropic_api_key
                        .as_deref()
                        .map(ApiKeyValidator::validate_anthropic_key)
                })
                .and_then(Result::err);
            match key_error {
                Some(e) => CheckResult::fail(NAME, e.to_string(), HINT),
                None => CheckResult::fail(NAME, "no usable API key configured", HINT),
            }
        }
        Err(e) => CheckResult::fail(NAME, e.to_string(), HINT),
    }
}
