//! LLM configuration and validation utilities

use crate::llm_providers::{anthropic::AnthropicProvider, LlmProvider};
use crate::ScoutError;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which provider the agent should talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderChoice {
    /// OpenAI when a key is present, then Anthropic, else template replies.
    #[default]
    Auto,
    OpenAI,
    Anthropic,
    /// No LLM; replies come from the template.
    None,
}

impl FromStr for ProviderChoice {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(ProviderChoice::Auto),
            "openai" | "gpt" => Ok(ProviderChoice::OpenAI),
            "anthropic" | "claude" => Ok(ProviderChoice::Anthropic),
            "none" | "off" | "template" => Ok(ProviderChoice::None),
            other => Err(ScoutError::InvalidConfiguration(format!(
                "unknown LLM provider '{other}' (expected auto, openai, anthropic or none)"
            ))),
        }
    }
}

/// Credentials and model names for the supported providers.
#[derive(Clone, Default)]
pub struct LlmSettings {
    pub provider: ProviderChoice,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: Option<String>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_model", &self.openai_model)
            .field("anthropic_api_key", &self.anthropic_api_key.as_ref().map(|_| "<redacted>"))
            .field("anthropic_model", &self.anthropic_model)
            .finish()
    }
}

/// API key validation utilities
pub struct ApiKeyValidator;

impl ApiKeyValidator {
    /// Validate OpenAI API key format
    pub fn validate_openai_key(api_key: &str) -> Result<(), ScoutError> {
        Self::validate_key("OpenAI", api_key, "sk-")
    }

    /// Validate Anthropic API key format
    pub fn validate_anthropic_key(api_key: &str) -> Result<(), ScoutError> {
        Self::validate_key("Anthropic", api_key, "sk-ant-")
    }

    fn validate_key(provider: &str, api_key: &str, prefix: &str) -> Result<(), ScoutError> {
        if api_key.is_empty() {
            return Err(ScoutError::InvalidConfiguration(format!(
                "{provider} API key cannot be empty"
            )));
        }
        if !api_key.starts_with(prefix) {
            return Err(ScoutError::InvalidConfiguration(format!(
                "{provider} API key must start with '{prefix}'"
            )));
        }
        if api_key.len() < 20 {
            return Err(ScoutError::InvalidConfiguration(format!(
                "{provider} API key appears to be too short"
            )));
        }
        Ok(())
    }

    /// Validate model name for a given provider
    pub fn validate_model_name(provider: &str, model: &str) -> Result<(), ScoutError> {
        let valid_models: &[&str] = match provider.to_lowercase().as_str() {
            "openai" => &["gpt-4", "gpt-3.5-turbo", "gpt-5", "o1", "o3", "o4"],
            "anthropic" => &[
                "claude-3",
                "claude-sonnet-4",
                "claude-opus-4",
                "claude-haiku-4",
            ],
            // Other providers: no validation
            _ => return Ok(()),
        };

        if valid_models.iter().any(|m| model.starts_with(m)) {
            Ok(())
        } else {
            Err(ScoutError::InvalidConfiguration(format!(
                "Unknown {provider} model: {model}. Valid model prefixes: {}",
                valid_models.join(", ")
            )))
        }
    }
}

/// Configuration helper for LLM providers
pub struct LlmConfig;

impl LlmConfig {
    pub fn openai(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, ScoutError> {
        let api_key = settings.openai_api_key.as_deref().ok_or_else(|| {
            ScoutError::InvalidConfiguration("OPENAI_API_KEY environment variable not set".into())
        })?;
        ApiKeyValidator::validate_openai_key(api_key)?;

        #[cfg(feature = "openai")]
        {
            use crate::llm_providers::openai::{OpenAIProvider, DEFAULT_MODEL};

            let model = settings
                .openai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            ApiKeyValidator::validate_model_name("openai", &model)?;

            debug!(model = %model, "Using OpenAI provider");
            Ok(Arc::new(
                OpenAIProvider::new(api_key.to_string()).with_model(model),
            ))
        }

        #[cfg(not(feature = "openai"))]
        {
            Err(ScoutError::InvalidConfiguration(
                "built without the `openai` feature".into(),
            ))
        }
    }

    pub fn anthropic(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, ScoutError> {
        use crate::llm_providers::anthropic::DEFAULT_MODEL;

        let api_key = settings.anthropic_api_key.as_deref().ok_or_else(|| {
            ScoutError::InvalidConfiguration(
                "ANTHROPIC_API_KEY environment variable not set".into(),
            )
        })?;
        ApiKeyValidator::validate_anthropic_key(api_key)?;

        let model = settings
            .anthropic_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        ApiKeyValidator::validate_model_name("anthropic", &model)?;

        debug!(model = %model, "Using Anthropic provider");
        Ok(Arc::new(
            AnthropicProvider::new(api_key.to_string()).with_model(model),
        ))
    }

    /// Builds the configured provider. `Ok(None)` means template-only replies.
    ///
    /// An explicit choice fails loudly on bad credentials; `Auto` skips
    /// providers whose credentials are missing or malformed.
    pub fn build(settings: &LlmSettings) -> Result<Option<Arc<dyn LlmProvider>>, ScoutError> {
        match settings.provider {
            ProviderChoice::None => Ok(None),
            ProviderChoice::OpenAI => Self::openai(settings).map(Some),
            ProviderChoice::Anthropic => Self::anthropic(settings).map(Some),
            ProviderChoice::Auto => {
                if settings.openai_api_key.is_some() {
                    match Self::openai(settings) {
                        Ok(provider) => return Ok(Some(provider)),
                        Err(e) => warn!(error = %e, "Skipping OpenAI provider"),
                    }
                }
                if settings.anthropic_api_key.is_some() {
                    match Self::anthropic(settings) {
                        Ok(provider) => return Ok(Some(provider)),
                        Err(e) => warn!(error = %e, "Skipping Anthropic provider"),
                    }
                }
                info!("No LLM credentials found, replies will use the template");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_key_validation() {
        assert!(ApiKeyValidator::validate_openai_key("sk-1234567890abcdefghij").is_ok());

        assert!(ApiKeyValidator::validate_openai_key("").is_err());
        assert!(ApiKeyValidator::validate_openai_key("invalid").is_err());
        assert!(ApiKeyValidator::validate_openai_key("sk-short").is_err());
    }

    #[test]
    fn test_anthropic_key_validation() {
        assert!(ApiKeyValidator::validate_anthropic_key("sk-ant-REDACTED").is_ok());

        assert!(ApiKeyValidator::validate_anthropic_key("").is_err());
        assert!(ApiKeyValidator::validate_anthropic_key("sk-1234567890").is_err());
        assert!(ApiKeyValidator::validate_anthropic_key("sk-ant-short").is_err());
    }

    #[test]
    fn test_model_validation() {
        assert!(ApiKeyValidator::validate_model_name("openai", "gpt-4o").is_ok());
        assert!(ApiKeyValidator::validate_model_name("openai", "gpt-4o-mini").is_ok());
        assert!(ApiKeyValidator::validate_model_name("openai", "davinci").is_err());

        assert!(
            ApiKeyValidator::validate_model_name("anthropic", "claude-3-5-sonnet-20241022").is_ok()
        );
        assert!(ApiKeyValidator::validate_model_name("anthropic", "invalid-model").is_err());

        assert!(ApiKeyValidator::validate_model_name("local", "any-model").is_ok());
    }

    #[test]
    fn provider_choice_parsing() {
        assert_eq!("".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert_eq!("OpenAI".parse::<ProviderChoice>().unwrap(), ProviderChoice::OpenAI);
        assert_eq!("claude".parse::<ProviderChoice>().unwrap(), ProviderChoice::Anthropic);
        assert_eq!("none".parse::<ProviderChoice>().unwrap(), ProviderChoice::None);
        assert!("gemini".parse::<ProviderChoice>().is_err());
    }

    #[test]
    fn auto_without_keys_is_template_only() {
        let provider = LlmConfig::build(&LlmSettings::default()).unwrap();
        assert!(provider.is_none());
    }

    #[test]
    fn auto_skips_malformed_keys() {
        let settings = LlmSettings {
            openai_api_key: Some("not-a-key".into()),
            anthropic_api_key: Some("sk-ant-REDACTED".into()),
            ..LlmSettings::default()
        };
        let provider = LlmConfig::build(&settings).unwrap().unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn explicit_choice_requires_key() {
        let settings = LlmSettings {
            provider: ProviderChoice::Anthropic,
            ..LlmSettings::default()
        };
        assert!(matches!(
            LlmConfig::build(&settings),
            Err(ScoutError::InvalidConfiguration(_))
        ));
    }
}
