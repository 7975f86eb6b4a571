use crate::intake::UrlPolicy;
use crate::ScoutError;
use reqwest::{header::HeaderMap, redirect, Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Listing sites often refuse obvious bot agents, so default to a desktop browser.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 10;

const ACCEPTED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml", "text/plain"];

/// Creates a fetcher with custom configuration.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     timeout: Duration::from_secs(20),
///     max_retries: 1,
///     ..FetcherConfig::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Total attempts made by `fetch_with_backoff`, first one included.
    pub max_retries: u32,
    pub max_body_bytes: usize,
    pub initial_backoff: Duration,
    pub headers: Option<HeaderMap>,
    /// Checked against every redirect target before it is followed.
    pub redirect_policy: UrlPolicy,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            max_body_bytes: 5 * 1024 * 1024,
            initial_backoff: Duration::from_millis(1000),
            headers: None,
            redirect_policy: UrlPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new() -> Result<Self, ScoutError> {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    pub fn new_with_config(config: FetcherConfig) -> Result<Self, ScoutError> {
        let mut headers = config.headers.clone().unwrap_or_default();
        if !headers.contains_key(reqwest::header::ACCEPT) {
            headers.insert(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                    .parse()
                    .map_err(|e| ScoutError::InvalidConfiguration(format!("{e}")))?,
            );
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .default_headers(headers)
            .redirect(guarded_redirects(config.redirect_policy.clone()))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                ScoutError::InvalidConfiguration(format!("HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    pub fn with_client(client: Client, config: FetcherConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch(&self, url: &str) -> Result<String, ScoutError> {
        debug!(url = %url, "Starting fetch request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let response = check_status(response).await?;
        check_content_type(&response)?;

        let limit = self.config.max_body_bytes;
        if let Some(declared) = response.content_length() {
            if declared as usize > limit {
                return Err(ScoutError::ContentTooLarge {
                    size: declared as usize,
                    limit,
                });
            }
        }

        let body = response.bytes().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            classify_transport_error(&e)
        })?;

        if body.len() > limit {
            return Err(ScoutError::ContentTooLarge {
                size: body.len(),
                limit,
            });
        }

        let content = String::from_utf8_lossy(&body).into_owned();
        debug!(url = %url, content_length = content.len(), "Successfully fetched webpage");
        Ok(content)
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch_with_backoff(&self, url: &str) -> Result<String, ScoutError> {
        let max_retries = self.config.max_retries.max(1);
        let mut delay = self.config.initial_backoff;

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(attempt, "Attempting to fetch URL");

            match self.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    warn!(
                        error = %e,
                        attempt,
                        "Request failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    if attempt >= max_retries && e.is_transient() {
                        error!(error = %e, "Max retries exceeded");
                    }
                    return Err(e);
                }
            }
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ScoutError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let reason = status.canonical_reason().unwrap_or("unknown status");
    Err(error_for_status(status, &url, reason))
}

/// Maps an unsuccessful HTTP status onto the error the caller can act on.
pub fn error_for_status(status: StatusCode, url: &str, reason: &str) -> ScoutError {
    match status.as_u16() {
        404 => ScoutError::NotFound(format!("{url} not found")),
        429 => ScoutError::RateLimitError(format!("{url} answered 429")),
        code @ 400..=499 => ScoutError::ClientError {
            status: code,
            message: format!("{reason} ({url})"),
        },
        code @ 500..=599 => ScoutError::ServerError {
            status: code,
            message: format!("{reason} ({url})"),
        },
        code => ScoutError::FetchError(format!("unexpected status {code} from {url}")),
    }
}

fn check_content_type(response: &Response) -> Result<(), ScoutError> {
    let Some(value) = response.headers().get(reqwest::header::CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = value.to_str().unwrap_or_default().to_ascii_lowercase();
    if is_accepted_content_type(&content_type) {
        Ok(())
    } else {
        Err(ScoutError::InvalidContentType(content_type))
    }
}

pub(crate) fn is_accepted_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    ACCEPTED_CONTENT_TYPES.contains(&mime)
}

/// Follows redirects only while each hop still passes `policy`.
fn guarded_redirects(policy: UrlPolicy) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(ScoutError::RedirectBlocked(format!(
                "more than {MAX_REDIRECTS} redirects"
            )));
        }
        match policy.validate(attempt.url().as_str()) {
            Ok(_) => attempt.follow(),
            Err(e) => {
                warn!(target_url = %attempt.url(), error = %e, "Refusing redirect");
                attempt.error(ScoutError::RedirectBlocked(e.to_string()))
            }
        }
    })
}

fn classify_transport_error(e: &reqwest::Error) -> ScoutError {
    if e.is_redirect() {
        let mut source = std::error::Error::source(e);
        while let Some(inner) = source {
            if let Some(ScoutError::RedirectBlocked(reason)) = inner.downcast_ref::<ScoutError>() {
                return ScoutError::RedirectBlocked(reason.clone());
            }
            source = inner.source();
        }
        return ScoutError::RedirectBlocked(error_chain(e));
    }

    if e.is_timeout() {
        return ScoutError::TimeoutError(e.to_string());
    }

    let chain = error_chain(e).to_lowercase();
    if e.is_connect() {
        if chain.contains("dns") || chain.contains("resolve") || chain.contains("lookup") {
            return ScoutError::DnsError(chain);
        }
        return ScoutError::ConnectionError(chain);
    }

    ScoutError::FetchError(chain)
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let url = "https://shop.example/item";
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, url, "Not Found"),
            ScoutError::NotFound(msg) if msg.contains("not found")
        ));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, url, "Too Many Requests"),
            ScoutError::RateLimitError(_)
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, url, "Forbidden"),
            ScoutError::ClientError { status: 403, .. }
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, url, "Bad Gateway"),
            ScoutError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn content_types() {
        assert!(is_accepted_content_type("text/html; charset=utf-8"));
        assert!(is_accepted_content_type("application/xhtml+xml"));
        assert!(!is_accepted_content_type("application/pdf"));
        assert!(!is_accepted_content_type("image/png"));
    }

    #[test]
    fn default_config() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
    }
}
