use crate::categorizer::LlmCategorizer;
use crate::intake::{extract_listing_url, UrlPolicy};
use crate::llm_providers::LlmProvider;
use crate::logging::{log_alert_card, log_assessment_card, log_error_card};
use crate::market::MarketCatalog;
use crate::reply::{Reply, ReplyComposer, DEFAULT_MAX_CHARS};
use crate::social::{MentionEvent, PostedReply, SocialClient};
use crate::verdict::{assess, Assessment, Thresholds};
use crate::{AssessmentCache, CacheStrategy, Listing, ListingSource, ScoutError};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_MAX_CONCURRENT: usize = 16;

#[derive(Debug, Clone)]
pub struct PriceAgentConfig {
    pub catalog: MarketCatalog,
    pub thresholds: Thresholds,
    pub url_policy: UrlPolicy,
    pub cache_strategy: CacheStrategy,
    pub cache_capacity: usize,
    pub max_concurrent: usize,
    /// The bot's own handle; mentions authored by it are skipped.
    pub bot_handle: Option<String>,
    /// Post an apology when a mentioned listing cannot be analysed.
    pub reply_on_error: bool,
    /// Ask the LLM for a category when keyword detection finds none.
    pub llm_categorize: bool,
    pub reply_max_chars: usize,
}

impl Default for PriceAgentConfig {
    fn default() -> Self {
        Self {
            catalog: MarketCatalog::default(),
            thresholds: Thresholds::default(),
            url_policy: UrlPolicy::default(),
            cache_strategy: CacheStrategy::UseCache,
            cache_capacity: 1000,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            bot_handle: None,
            reply_on_error: true,
            llm_categorize: true,
            reply_max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// What happened to a mention.
#[derive(Debug, Clone)]
pub enum MentionOutcome {
    Replied {
        assessment: Box<Assessment>,
        reply: Reply,
        posted: PostedReply,
    },
    /// Analysis failed and an apology was posted instead.
    FailureReplied { error: String, posted: PostedReply },
    Ignored(String),
}

/// Runs the whole pipeline: URL in, verdict and posted reply out.
#[derive(Clone)]
pub struct PriceAgent {
    source: Arc<dyn ListingSource>,
    social: Arc<dyn SocialClient>,
    categorizer: Option<LlmCategorizer>,
    composer: ReplyComposer,
    cache: AssessmentCache,
    catalog: Arc<MarketCatalog>,
    thresholds: Thresholds,
    url_policy: UrlPolicy,
    cache_strategy: CacheStrategy,
    bot_handle: Option<String>,
    reply_on_error: bool,
    // Max Concurrent Analyses
    semaphore: Arc<Semaphore>,
}

impl PriceAgent {
    /// Template replies, default catalog and policy.
    pub fn new(source: Arc<dyn ListingSource>, social: Arc<dyn SocialClient>) -> Self {
        Self::new_with_config(source, social, None, PriceAgentConfig::default())
    }

    pub fn new_with_config(
        source: Arc<dyn ListingSource>,
        social: Arc<dyn SocialClient>,
        llm: Option<Arc<dyn LlmProvider>>,
        config: PriceAgentConfig,
    ) -> Self {
        debug!(
            source = source.name(),
            social = social.name(),
            llm = llm.as_ref().map(|p| p.name()).unwrap_or("none"),
            max_concurrent = config.max_concurrent,
            "Initializing PriceAgent"
        );

        let categorizer = llm
            .clone()
            .filter(|_| config.llm_categorize)
            .map(LlmCategorizer::new);
        let composer = ReplyComposer::new(llm).with_max_chars(config.reply_max_chars);

        Self {
            source,
            social,
            categorizer,
            composer,
            cache: AssessmentCache::new(config.cache_capacity),
            catalog: Arc::new(config.catalog),
            thresholds: config.thresholds,
            url_policy: config.url_policy,
            cache_strategy: config.cache_strategy,
            bot_handle: config
                .bot_handle
                .map(|h| h.trim_start_matches('@').to_lowercase()),
            reply_on_error: config.reply_on_error,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        }
    }

    pub fn catalog(&self) -> &MarketCatalog {
        &self.catalog
    }

    pub fn composer(&self) -> &ReplyComposer {
        &self.composer
    }

    pub fn cache(&self) -> &AssessmentCache {
        &self.cache
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn analyze(&self, url: &str) -> Result<Assessment, ScoutError> {
        let url = self.url_policy.validate(url)?.to_string();

        if let CacheStrategy::UseCache = self.cache_strategy {
            if let Some(cached) = self.cache.get(&url) {
                debug!(url = %url, "Assessment cache hit");
                return Ok(cached);
            }
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ScoutError::ConcurrencyLimitError)?;

        let listing = self.source.load(&url).await?;
        let category = self.resolve_category(&listing).await;
        let assessment = assess(listing, category, &self.catalog, &self.thresholds);

        if assessment.is_alert() {
            log_alert_card(&assessment);
        } else {
            log_assessment_card(&assessment);
        }

        if let CacheStrategy::UseCache = self.cache_strategy {
            if !self.cache.set(url, assessment.clone()) {
                debug!("Assessment cache full, result not stored");
            }
        }

        Ok(assessment)
    }

    /// One result per URL, in input order.
    pub async fn analyze_batch(&self, urls: &[&str]) -> Vec<Result<Assessment, ScoutError>> {
        info!(count = urls.len(), "Analyzing batch");
        join_all(urls.iter().map(|url| self.analyze(url))).await
    }

    #[instrument(level = "debug", skip_all, fields(mention = %event.id), err)]
    pub async fn handle_mention(&self, event: &MentionEvent) -> Result<MentionOutcome, ScoutError> {
        if self.is_own_mention(event) {
            debug!("Skipping mention authored by the bot");
            return Ok(MentionOutcome::Ignored("mention authored by the bot".into()));
        }

        let Some(url) = extract_listing_url(&event.text) else {
            ScoutError::NoListingUrl.log();
            return Ok(MentionOutcome::Ignored("no listing URL in mention".into()));
        };

        match self.analyze(&url).await {
            Ok(assessment) => {
                let reply = self.composer.compose(&assessment).await;
                let posted = self.social.post_reply(&event.id, &reply.text).await?;
                info!(
                    mention = %event.id,
                    reply = %posted.id,
                    verdict = assessment.verdict.label(),
                    "Replied to mention"
                );
                Ok(MentionOutcome::Replied {
                    assessment: Box::new(assessment),
                    reply,
                    posted,
                })
            }
            Err(e) => {
                e.log();
                log_error_card(&url, &e);
                if !self.reply_on_error {
                    return Err(e);
                }
                let text = self.composer.failure_reply(&e);
                let posted = self.social.post_reply(&event.id, &text).await?;
                Ok(MentionOutcome::FailureReplied {
                    error: e.to_string(),
                    posted,
                })
            }
        }
    }

    fn is_own_mention(&self, event: &MentionEvent) -> bool {
        self.bot_handle.as_deref().is_some_and(|handle| {
            event.author.trim_start_matches('@').eq_ignore_ascii_case(handle)
        })
    }

    async fn resolve_category(&self, listing: &Listing) -> Option<String> {
        let detected = [listing.title.as_deref(), listing.description.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|text| self.catalog.detect_category(text));
        if let Some(category) = detected {
            return Some(category.to_string());
        }

        if listing.reference_value.is_some() {
            return None;
        }
        let categorizer = self.categorizer.as_ref()?;
        match categorizer.categorize(listing, &self.catalog).await {
            Ok(category) => category,
            Err(e) => {
                warn!(error = %e, "LLM categorization failed");
                None
            }
        }
    }
}
