//! Posting replies back to the social platform.

use crate::ScoutError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_X_API_BASE: &str = "https://api.twitter.com";

/// A mention of the bot, as delivered by the platform's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionEvent {
    /// Id of the post that mentioned the bot; the reply targets it.
    pub id: String,
    /// Handle of the author, without `@`.
    #[serde(default)]
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedReply {
    pub id: String,
    pub in_reply_to: String,
    pub text: String,
}

#[async_trait]
pub trait SocialClient: Send + Sync {
    fn name(&self) -> &str;

    async fn post_reply(&self, in_reply_to: &str, text: &str) -> Result<PostedReply, ScoutError>;
}

#[derive(Serialize)]
struct CreatePostRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: String,
    #[serde(default)]
    text: Option<String>,
}

/// Client for the X (Twitter) v2 posts endpoint.
///
/// The bearer token must be a user-context token allowed to write posts.
#[derive(Clone)]
pub struct XClient {
    client: reqwest::Client,
    bearer_token: String,
    base_url: String,
}

impl XClient {
    pub fn new(bearer_token: impl Into<String>) -> Result<Self, ScoutError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("price-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ScoutError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            bearer_token: bearer_token.into(),
            base_url: DEFAULT_X_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn service_error(message: impl Into<String>) -> ScoutError {
    ScoutError::ExternalServiceError {
        service: "X".to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl SocialClient for XClient {
    fn name(&self) -> &str {
        "x"
    }

    #[instrument(level = "debug", skip(self, text), err)]
    async fn post_reply(&self, in_reply_to: &str, text: &str) -> Result<PostedReply, ScoutError> {
        let body = CreatePostRequest {
            text,
            reply: ReplyTarget {
                in_reply_to_tweet_id: in_reply_to,
            },
        };

        let response = self
            .client
            .post(format!("{}/2/tweets", self.base_url))
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| service_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ScoutError::AuthError {
                    service: "X".to_string(),
                    message: detail,
                },
                429 => ScoutError::RateLimitError(format!("X API: {detail}")),
                code => service_error(format!("status {code}: {detail}")),
            });
        }

        let created: CreatePostResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::ParseError(e.to_string()))?;

        info!(reply_id = %created.data.id, in_reply_to = %in_reply_to, "Posted reply");
        Ok(PostedReply {
            id: created.data.id,
            in_reply_to: in_reply_to.to_string(),
            text: created.data.text.unwrap_or_else(|| text.to_string()),
        })
    }
}

/// Logs replies instead of posting them; keeps a copy of each.
#[derive(Default)]
pub struct DryRunClient {
    posted: Mutex<Vec<PostedReply>>,
}

impl DryRunClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<PostedReply> {
        self.posted.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SocialClient for DryRunClient {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn post_reply(&self, in_reply_to: &str, text: &str) -> Result<PostedReply, ScoutError> {
        let mut posted = self
            .posted
            .lock()
            .map_err(|_| service_error("dry-run log poisoned"))?;

        let reply = PostedReply {
            id: format!("dry-run-{}", posted.len() + 1),
            in_reply_to: in_reply_to.to_string(),
            text: text.to_string(),
        };
        debug!(in_reply_to = %in_reply_to, text = %text, "Dry run: reply not posted");
        posted.push(reply.clone());
        Ok(reply)
    }
}
