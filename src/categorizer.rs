//! LLM fallback for product categorisation.
//!
//! Keyword matching covers the common cases. When it finds nothing, the
//! listing summary and the catalog's category names are sent to the model
//! together with a JSON schema generated from [`CategoryGuess`].

use crate::llm_providers::LlmProvider;
use crate::market::{MarketCatalog, UNKNOWN_CATEGORY};
use crate::utils::take_chars;
use crate::{Listing, ScoutError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Guesses below this confidence are discarded.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// The model's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryGuess {
    /// One of the offered category names, or "unknown".
    pub category: String,
    /// 0.0 to 1.0.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Clone)]
pub struct LlmCategorizer {
    provider: Arc<dyn LlmProvider>,
    max_summary_chars: usize,
}

impl LlmCategorizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_summary_chars: 2_000,
        }
    }

    /// Returns a catalog category, or `None` when the model cannot place it.
    #[instrument(level = "debug", skip_all, fields(url = %listing.url), err)]
    pub async fn categorize(
        &self,
        listing: &Listing,
        catalog: &MarketCatalog,
    ) -> Result<Option<String>, ScoutError> {
        if catalog.is_empty() {
            return Ok(None);
        }

        let schema = serde_json::to_value(schemars::schema_for!(CategoryGuess))?;
        let prompt = self.build_prompt(listing, catalog);

        let raw = self.provider.generate_json(prompt, schema).await?;
        let guess: CategoryGuess = serde_json::from_value(raw)?;
        debug!(category = %guess.category, confidence = guess.confidence, "LLM category guess");

        Ok(accept_guess(&guess, catalog))
    }

    fn build_prompt(&self, listing: &Listing, catalog: &MarketCatalog) -> String {
        let categories = catalog.categories().collect::<Vec<_>>().join(", ");
        format!(
            "Which product category does this listing belong to?\n\
             Allowed categories: {categories}, {UNKNOWN_CATEGORY}\n\n\
             Listing:\n{}",
            take_chars(&listing.summary(), self.max_summary_chars)
        )
    }
}

fn accept_guess(guess: &CategoryGuess, catalog: &MarketCatalog) -> Option<String> {
    let category = guess.category.trim().to_lowercase();
    if category == UNKNOWN_CATEGORY || guess.confidence < MIN_CONFIDENCE {
        return None;
    }
    catalog.contains(&category).then_some(category)
}
