use crate::{Fetcher, Listing, ListingExtractor, ListingSource, ScoutError};
use async_trait::async_trait;
use tracing::instrument;

/// Loads listings from the live web: fetch with retries, then extract.
#[derive(Clone)]
pub struct WebListingSource {
    pub fetcher: Fetcher,
    extractor: ListingExtractor,
}

impl WebListingSource {
    pub fn new() -> Result<Self, ScoutError> {
        Ok(Self::new_with_fetcher(Fetcher::new()?))
    }

    pub fn new_with_fetcher(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            extractor: ListingExtractor::new(),
        }
    }
}

#[async_trait]
impl ListingSource for WebListingSource {
    fn name(&self) -> &str {
        "web"
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn load(&self, url: &str) -> Result<Listing, ScoutError> {
        let html = self.fetcher.fetch_with_backoff(url).await?;
        let listing = self.extractor.extract(&html, url);

        if listing.title.is_none() && listing.price_text.is_none() {
            return Err(ScoutError::ExtractError(format!(
                "no title or price found on {url}"
            )));
        }
        Ok(listing)
    }
}
