use price_scout::{extract_listing_url, ScoutError, UrlPolicy};

#[test]
fn test_finds_url_in_mention() {
    assert_eq!(
        extract_listing_url("@pricescout is this worth it? https://shop.example/item/42"),
        Some("https://shop.example/item/42".to_string())
    );
    assert_eq!(
        extract_listing_url("check (https://shop.example/a?b=1&c=2)."),
        Some("https://shop.example/a?b=1&c=2".to_string())
    );
    assert_eq!(extract_listing_url("no link here, just vibes"), None);
}

#[test]
fn test_takes_first_of_several_urls() {
    let text = "compare http://a.example/1 with https://b.example/2";
    assert_eq!(extract_listing_url(text).as_deref(), Some("http://a.example/1"));
}

#[test]
fn test_skips_malformed_link() {
    let text = "typo http://:80/x, real one https://shop.example/item/7";
    assert_eq!(
        extract_listing_url(text).as_deref(),
        Some("https://shop.example/item/7")
    );
}

#[test]
fn test_default_scheme_rules() {
    let policy = UrlPolicy::default();

    assert!(policy.validate("http://example.com").is_ok());
    assert!(policy.validate("https://example.com/listing").is_ok());

    assert!(matches!(
        policy.validate("file:///etc/passwd"),
        Err(ScoutError::InvalidUrlScheme(_))
    ));
    assert!(matches!(
        policy.validate("ftp://example.com"),
        Err(ScoutError::InvalidUrlScheme(_))
    ));
    assert!(matches!(
        policy.validate("javascript:alert(1)"),
        Err(ScoutError::InvalidUrlScheme(_))
    ));
}

#[test]
fn test_unparseable_url() {
    assert!(matches!(
        UrlPolicy::default().validate("not a url"),
        Err(ScoutError::UrlParseError(_))
    ));
}

#[test]
fn test_localhost_blocking() {
    let policy = UrlPolicy::default();

    for url in [
        "http://localhost",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://[::1]",
        "http://shop.localhost/item",
    ] {
        assert!(
            matches!(policy.validate(url), Err(ScoutError::LocalhostBlocked)),
            "{url} should be blocked"
        );
    }
}

#[test]
fn test_private_ip_blocking() {
    let policy = UrlPolicy::default();

    for url in [
        "http://10.0.0.1",
        "http://172.16.0.1",
        "http://192.168.1.1/admin",
        "http://169.254.169.254/latest/meta-data",
        "http://[fc00::1]",
        "http://[::ffff:192.168.0.1]",
    ] {
        assert!(
            matches!(policy.validate(url), Err(ScoutError::PrivateIpBlocked(_))),
            "{url} should be blocked"
        );
    }

    assert!(policy.validate("http://8.8.8.8").is_ok());
}

#[test]
fn test_permissive_allows_loopback() {
    let policy = UrlPolicy::permissive();
    assert!(policy.validate("http://127.0.0.1:8080/item").is_ok());
    assert!(policy.validate("http://192.168.1.1").is_ok());
    assert!(policy.validate("ftp://example.com").is_err());
}

#[test]
fn test_domain_lists() {
    let allow = UrlPolicy::default().allow_domain("ebay.com");
    assert!(allow.validate("https://ebay.com/itm/1").is_ok());
    assert!(allow.validate("https://www.ebay.com/itm/1").is_ok());
    assert!(matches!(
        allow.validate("https://notebay.com/itm/1"),
        Err(ScoutError::DomainNotAllowed(_))
    ));

    let block = UrlPolicy::default().block_domain("Scam.example");
    assert!(matches!(
        block.validate("https://deals.scam.example/x"),
        Err(ScoutError::DomainBlocked(_))
    ));
    assert!(block.validate("https://shop.example/x").is_ok());
}

#[test]
fn test_rejected_urls_are_flagged() {
    let err = UrlPolicy::default()
        .validate("http://localhost")
        .unwrap_err();
    assert!(err.is_rejected_url());
    assert!(!err.is_transient());
}
