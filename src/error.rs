use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL scheme not allowed: {0}")]
    InvalidUrlScheme(String),

    #[error("Domain not in allow-list: {0}")]
    DomainNotAllowed(String),

    #[error("Domain is blocked: {0}")]
    DomainBlocked(String),

    #[error("Localhost URLs are not allowed")]
    LocalhostBlocked,

    #[error("Private IP address not allowed: {0}")]
    PrivateIpBlocked(String),

    #[error("Redirect blocked: {0}")]
    RedirectBlocked(String),

    #[error("No listing URL found in message")]
    NoListingUrl,

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("Page not found: {0}")]
    NotFound(String),

    #[error("Client error {status}: {message}")]
    ClientError { status: u16, message: String },

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Content too large: {size} bytes (limit {limit})")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("Failed to extract listing: {0}")]
    ExtractError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Authentication rejected by {service}: {message}")]
    AuthError { service: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Too many concurrent requests")]
    ConcurrencyLimitError,

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ScoutError {
    fn from(e: serde_json::Error) -> Self {
        ScoutError::ParseError(e.to_string())
    }
}

impl ScoutError {
    /// Errors worth retrying: the remote side may answer differently next time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ScoutError::TimeoutError(_)
                | ScoutError::ConnectionError(_)
                | ScoutError::ServerError { .. }
                | ScoutError::RateLimitError(_)
        )
    }

    /// True for URLs the policy refuses to fetch, redirect targets included.
    pub fn is_rejected_url(&self) -> bool {
        matches!(
            self,
            ScoutError::UrlParseError(_)
                | ScoutError::InvalidUrl(_)
                | ScoutError::InvalidUrlScheme(_)
                | ScoutError::DomainNotAllowed(_)
                | ScoutError::DomainBlocked(_)
                | ScoutError::LocalhostBlocked
                | ScoutError::PrivateIpBlocked(_)
                | ScoutError::RedirectBlocked(_)
        )
    }

    pub fn log(&self) {
        match self {
            ScoutError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            ScoutError::InvalidUrl(_)
            | ScoutError::InvalidUrlScheme(_)
            | ScoutError::DomainNotAllowed(_)
            | ScoutError::DomainBlocked(_)
            | ScoutError::LocalhostBlocked
            | ScoutError::PrivateIpBlocked(_) => {
                warn!(error = %self, "URL rejected by policy");
            }
            ScoutError::RedirectBlocked(e) => {
                warn!(error = %e, "Redirect target rejected by policy");
            }
            ScoutError::NoListingUrl => {
                warn!("Message did not contain a listing URL");
            }
            ScoutError::FetchError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            ScoutError::NotFound(e) => {
                warn!(error = %e, "Listing page not found");
            }
            ScoutError::ClientError { status, message } => {
                warn!(status = %status, error = %message, "Listing request rejected");
            }
            ScoutError::ServerError { status, message } => {
                error!(status = %status, error = %message, "Listing server failed");
            }
            ScoutError::DnsError(e) => {
                warn!(error = %e, "DNS resolution failed");
            }
            ScoutError::ConnectionError(e) => {
                warn!(error = %e, "Connection failed");
            }
            ScoutError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            ScoutError::InvalidContentType(e) => {
                warn!(error = %e, "Invalid content type received");
            }
            ScoutError::ContentTooLarge { size, limit } => {
                warn!(size = %size, limit = %limit, "Response body too large");
            }
            ScoutError::ExtractError(e) => {
                error!(error = %e, "Listing extraction failed");
            }
            ScoutError::ParseError(e) => {
                error!(error = %e, "Response parsing failed");
            }
            ScoutError::RateLimitError(e) => {
                warn!(error = %e, "Rate limit exceeded");
            }
            ScoutError::AuthError { service, message } => {
                error!(service = %service, error = %message, "Credentials rejected");
            }
            ScoutError::InvalidConfiguration(e) => {
                error!(error = %e, "Invalid configuration");
            }
            ScoutError::ConcurrencyLimitError => {
                warn!("Concurrency limit reached");
            }
            ScoutError::ExternalServiceError { service, message } => {
                error!(
                    service = %service,
                    error = %message,
                    "External service error occurred"
                );
            }
            ScoutError::Io(e) => {
                error!(error = %e, "I/O failure");
            }
        }
    }
}
