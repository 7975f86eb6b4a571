//! Turns an [`Assessment`] into a post-sized reply.

use crate::llm_providers::{CompletionRequest, LlmProvider};
use crate::utils::{collapse_whitespace, format_money, truncate_str};
use crate::verdict::{Assessment, Verdict};
use crate::ScoutError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Maximum post length on the target platform.
pub const DEFAULT_MAX_CHARS: usize = 280;

pub const ALERT_PREFIX: &str = "🚨 Bargain alert!";

const SYSTEM_PROMPT: &str = "You write short, friendly social media replies about product prices. \
Use only the facts given. Do not invent prices, specs or links. \
Plain text, no hashtags, at most two sentences.";

/// Where the reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

#[derive(Clone)]
pub struct ReplyComposer {
    provider: Option<Arc<dyn LlmProvider>>,
    max_chars: usize,
}

impl Default for ReplyComposer {
    fn default() -> Self {
        Self::template_only()
    }
}

impl ReplyComposer {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            provider,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }

    pub fn template_only() -> Self {
        Self::new(None)
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(ALERT_PREFIX.chars().count() + 20);
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    #[instrument(level = "debug", skip_all, fields(url = %assessment.listing.url))]
    pub async fn compose(&self, assessment: &Assessment) -> Reply {
        if let Some(provider) = &self.provider {
            match self.compose_with_llm(provider.as_ref(), assessment).await {
                Ok(text) => {
                    return Reply {
                        text,
                        source: ReplySource::Llm,
                    }
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "LLM reply failed, using template");
                }
            }
        }

        Reply {
            text: self.frame(assessment, &template_body(assessment)),
            source: ReplySource::Template,
        }
    }

    async fn compose_with_llm(
        &self,
        provider: &dyn LlmProvider,
        assessment: &Assessment,
    ) -> Result<String, ScoutError> {
        let request = CompletionRequest::new(SYSTEM_PROMPT, fact_sheet(assessment))
            .with_temperature(0.3)
            .with_max_tokens(200);

        let raw = provider.complete(&request).await?;
        let body = collapse_whitespace(raw.trim().trim_matches('"'));
        if body.is_empty() {
            return Err(ScoutError::ExternalServiceError {
                service: provider.name().to_string(),
                message: "empty reply".to_string(),
            });
        }

        debug!(chars = body.chars().count(), "LLM reply drafted");
        Ok(self.frame(assessment, &body))
    }

    /// Adds the alert prefix and verdict label, shortening only the body to fit.
    fn frame(&self, assessment: &Assessment, body: &str) -> String {
        let prefix = if assessment.is_alert() && !body.starts_with(ALERT_PREFIX) {
            format!("{ALERT_PREFIX} ")
        } else {
            String::new()
        };
        let suffix = format!(" [{}]", verdict_tag(assessment));

        let budget = self
            .max_chars
            .saturating_sub(prefix.chars().count() + suffix.chars().count());
        format!("{prefix}{}{suffix}", truncate_str(body, budget))
    }

    fn clamp(&self, text: &str) -> String {
        truncate_str(text, self.max_chars)
    }

    /// Reply posted when the listing could not be analysed.
    pub fn failure_reply(&self, error: &ScoutError) -> String {
        let reason = match error {
            ScoutError::NotFound(_) => "that page doesn't seem to exist anymore",
            ScoutError::TimeoutError(_) | ScoutError::ConnectionError(_) | ScoutError::DnsError(_) => {
                "I couldn't reach that site"
            }
            ScoutError::ClientError { .. } | ScoutError::RateLimitError(_) => {
                "that site wouldn't let me in"
            }
            e if e.is_rejected_url() => "I can only look at public http(s) listing links",
            _ => "I couldn't read that listing",
        };
        self.clamp(&format!("Sorry, {reason}. Try another link?"))
    }
}

fn verdict_tag(assessment: &Assessment) -> String {
    format!("{} → {}", assessment.verdict.label(), assessment.recommendation)
}

/// The facts handed to the model, one per line.
pub fn fact_sheet(assessment: &Assessment) -> String {
    let listing = &assessment.listing;
    let mut lines = vec![format!(
        "Product: {}",
        listing.title.as_deref().unwrap_or("unknown product")
    )];

    if let Some(price) = assessment.price {
        lines.push(format!("Listed price: {}", format_money(price)));
    }
    if let Some(category) = &assessment.category {
        lines.push(format!("Category: {category}"));
    }
    if let Some(value) = assessment.market_value {
        lines.push(format!("Typical market value: {}", format_money(value)));
    }
    if let Some(change) = assessment.market_change() {
        lines.push(change);
    }
    lines.push(format!("Verdict: {}", assessment.verdict.label()));
    if let Verdict::Unrated(reason) = &assessment.verdict {
        lines.push(format!("Why unrated: {reason}"));
    }
    lines.push(format!("Recommendation: {}", assessment.recommendation));
    lines.join("\n")
}

/// Deterministic reply used without an LLM.
pub fn template_reply(assessment: &Assessment) -> String {
    format!("{} [{}]", template_body(assessment), verdict_tag(assessment))
}

fn template_body(assessment: &Assessment) -> String {
    let title = assessment
        .listing
        .title
        .as_deref()
        .map(|t| truncate_str(t, 80))
        .unwrap_or_else(|| "This listing".to_string());

    let (Some(price), Some(market), Some(pct)) = (
        assessment.price,
        assessment.market_value,
        assessment.percent_off(),
    ) else {
        let reason = match &assessment.verdict {
            Verdict::Unrated(reason) => reason.clone(),
            _ => "not enough data".to_string(),
        };
        return format!("I couldn't price-check {title}: {reason}.");
    };

    let price = format_money(price);
    let market = format_money(market);
    let category = assessment.category.as_deref().unwrap_or("this kind of item");

    match assessment.verdict {
        Verdict::Underpriced => format!(
            "{ALERT_PREFIX} {title} is listed at {price}, {pct}% below the typical {market} for a {category}."
        ),
        Verdict::GoodDeal => format!(
            "Nice find: {title} at {price} is {pct}% under the usual {market} for a {category}."
        ),
        Verdict::FairlyPriced => format!(
            "{title} at {price} is about what a {category} goes for (~{market}). Fair, not a steal."
        ),
        Verdict::Overpriced => format!(
            "{title} at {price} is {}% above the typical {market} for a {category}. I'd wait.",
            -pct
        ),
        Verdict::Unrated(ref reason) => format!("I couldn't price-check {title}: {reason}."),
    }
}
