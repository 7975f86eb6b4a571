use async_trait::async_trait;

mod agent;
mod cache;
mod categorizer;
mod config;
pub mod demo;
mod error;
mod extractor;
mod fetcher;
pub mod intake;
mod listing_source;
pub mod llm_config;
pub mod llm_providers;
mod logging;
pub mod market;
pub mod reply;
pub mod social;
mod utils;
pub mod verdict;

pub use agent::{MentionOutcome, PriceAgent, PriceAgentConfig, DEFAULT_MAX_CONCURRENT};
pub use cache::{AssessmentCache, CacheStrategy};
pub use categorizer::{CategoryGuess, LlmCategorizer};
pub use config::{AgentConfig, CheckResult, SetupReport};
pub use demo::DemoListingSource;
pub use error::ScoutError;
pub use extractor::ListingExtractor;
pub use fetcher::{Fetcher, FetcherConfig};
pub use intake::{extract_listing_url, UrlPolicy};
pub use listing_source::WebListingSource;
pub use llm_config::{ApiKeyValidator, LlmConfig, LlmSettings, ProviderChoice};
pub use llm_providers::{CompletionRequest, LlmProvider, MockProvider};
#[cfg(feature = "logging")]
pub use logging::{setup_logging, LogConfig, LogLevelGuard};
pub use logging::{log_alert_card, log_assessment_card, log_error_card};
pub use market::{parse_price, MarketCatalog};
pub use reply::{Reply, ReplyComposer, ReplySource};
pub use social::{DryRunClient, MentionEvent, PostedReply, SocialClient, XClient};
pub use utils::{format_money, truncate_str};
pub use verdict::{Assessment, Recommendation, Thresholds, Verdict};

/// What could be read off a product page.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Listing {
    pub url: String,
    pub title: Option<String>,
    /// Price as it appeared on the page, e.g. `"$1,299.99"`.
    pub price_text: Option<String>,
    pub description: Option<String>,
    /// Market value known for this exact listing; overrides the catalog.
    #[serde(default)]
    pub reference_value: Option<f64>,
}

impl Listing {
    pub fn summary(&self) -> String {
        format!(
            "Title: {}\nPrice: {}\nDescription: {}",
            self.title.as_deref().unwrap_or("N/A"),
            self.price_text.as_deref().unwrap_or("N/A"),
            self.description.as_deref().unwrap_or("N/A"),
        )
    }
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, url: &str) -> Result<Listing, ScoutError>;
}
