mod common;

use common::{CannedResponse, TestServer};
use price_scout::{
    AgentConfig, DemoListingSource, MentionEvent, MentionOutcome, ScoutError, SocialClient,
    XClient,
};
use std::sync::Arc;

fn created(id: &str, text: &str) -> CannedResponse {
    CannedResponse::json(
        201,
        serde_json::json!({ "data": { "id": id, "text": text } }).to_string(),
    )
}

#[tokio::test]
async fn test_x_client_posts_reply() {
    let server = TestServer::always(created("1900", "posted text")).await;
    let client = XClient::new("test-token")
        .unwrap()
        .with_base_url(format!("{}/", server.base_url));

    let posted = client.post_reply("1800", "hello").await.unwrap();
    assert_eq!(posted.id, "1900");
    assert_eq!(posted.in_reply_to, "1800");
    assert_eq!(posted.text, "posted text");

    let seen = &server.requests()[0];
    assert_eq!(seen.path(), "/2/tweets");
    assert_eq!(seen.header("authorization").as_deref(), Some("Bearer test-token"));

    let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["text"], "hello");
    assert_eq!(body["reply"]["in_reply_to_tweet_id"], "1800");
}

#[tokio::test]
async fn test_x_client_error_mapping() {
    for status in [401u16, 403, 429, 500] {
        let server = TestServer::always(CannedResponse::json(status, r#"{"title":"nope"}"#)).await;
        let client = XClient::new("t").unwrap().with_base_url(&server.base_url);
        let err = client.post_reply("1", "x").await.unwrap_err();

        let mapped = match status {
            401 | 403 => matches!(err, ScoutError::AuthError { .. }),
            429 => matches!(err, ScoutError::RateLimitError(_)),
            _ => matches!(err, ScoutError::ExternalServiceError { .. }),
        };
        assert!(mapped, "status {status} mapped to {err:?}");
    }
}

#[tokio::test]
async fn test_configured_agent_posts_to_x() {
    let server = TestServer::always(created("2001", "ok")).await;
    let config = AgentConfig {
        x_bearer_token: Some("test-token".into()),
        x_api_base: server.base_url.clone(),
        bot_handle: Some("pricescout".into()),
        llm: price_scout::LlmSettings {
            provider: price_scout::ProviderChoice::None,
            ..Default::default()
        },
        ..Default::default()
    };
    let agent = config
        .build_agent_with_source(Arc::new(DemoListingSource::new()))
        .unwrap();

    let event = MentionEvent {
        id: "1999".into(),
        author: "shopper".into(),
        text: "@pricescout https://marketplace.example/laptop-dell-xps-13".into(),
    };
    let outcome = agent.handle_mention(&event).await.unwrap();
    assert!(matches!(outcome, MentionOutcome::Replied { ref posted, .. } if posted.id == "2001"));

    let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(body["reply"]["in_reply_to_tweet_id"], "1999");
    assert!(body["text"].as_str().unwrap().contains("[UNDERPRICED → BUY]"));

    let own = MentionEvent {
        author: "@PriceScout".into(),
        ..event
    };
    assert!(matches!(
        agent.handle_mention(&own).await.unwrap(),
        MentionOutcome::Ignored(_)
    ));
    assert_eq!(server.requests().len(), 1);
}
