//! Tests for reading field configuration.

use pretty_assertions::assert_eq;
use refdrop_core::config::{Config, FetchConfig, LocatorConfig, SourceKind};
use refdrop_core::error::ConfigError;
use refdrop_core::hook::Locator;
use refdrop_core::source::{ListShape, RemoteItem};

const SAMPLE: &str = r#"{
    "stop_on_error": true,
    "http": {"timeout_secs": 5},
    "fields": [
        {
            "title": "TestVersion",
            "sources": [
                {"kind": "github_tags", "owner": "acme", "repo": "widgets", "prefix": "tags/"},
                {"kind": "github_branches", "owner": "acme", "repo": "widgets"}
            ]
        },
        {
            "title": "cmd /c",
            "locator": "custom_parameter",
            "sources": [
                {"kind": "bitbucket_branches", "owner": "acme", "repo": "tools"}
            ]
        },
        {
            "title": "Build",
            "locator": {"selector": "select[name=build], input[name=build]"},
            "sources": [
                {"kind": "url", "url": "https://ci.test/builds", "shape": "wrapped", "field": "id"}
            ]
        }
    ]
}"#;

#[test]
fn test_parse_sample_config() {
    let config = Config::from_json(SAMPLE).unwrap();
    assert!(config.randomize_ids);
    assert!(config.stop_on_error);
    assert_eq!(config.http.timeout_secs, 5);
    assert_eq!(config.http.user_agent, FetchConfig::default().user_agent);

    assert_eq!(config.fields.len(), 3);
    assert_eq!(config.fields[0].locator, LocatorConfig::TableCell);
    assert_eq!(config.fields[1].locator, LocatorConfig::CustomParameter);
    assert_eq!(
        config.fields[2].sources[0].kind,
        SourceKind::Url {
            url: "https://ci.test/builds".to_string(),
            shape: ListShape::Wrapped,
        }
    );
    assert_eq!(config.fields[2].sources[0].field, "id");
    assert_eq!(config.fields[0].sources[1].field, "name");
    assert_eq!(config.fields[0].sources[1].prefix, "");
}

#[test]
fn test_bindings_resolve_endpoints() {
    let bindings = Config::from_json(SAMPLE).unwrap().bindings().unwrap();
    assert_eq!(bindings.len(), 3);

    let urls: Vec<String> = bindings[0]
        .loader()
        .steps()
        .iter()
        .map(|step| step.endpoint.to_string())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://api.github.com/repos/acme/widgets/tags",
            "https://api.github.com/repos/acme/widgets/branches",
        ]
    );
    let tag = (bindings[0].loader().steps()[0].label)(&RemoteItem::named("v1"));
    assert_eq!(tag.as_deref(), Some("tags/v1"));

    let bitbucket = &bindings[1].loader().steps()[0].endpoint;
    assert_eq!(
        bitbucket.to_string(),
        "https://api.bitbucket.org/2.0/repositories/acme/tools/refs/branches"
    );
    assert_eq!(bitbucket.shape(), ListShape::Wrapped);
    assert_eq!(bindings[1].locator(), &Locator::CustomParameter);

    assert_eq!(
        bindings[2].selector().unwrap().as_str(),
        "select[name=build], input[name=build]"
    );
}

#[test]
fn test_field_without_sources_rejected() {
    let err = Config::from_json(r#"{"fields": [{"title": "Empty", "sources": []}]}"#)
        .unwrap()
        .bindings()
        .unwrap_err();
    assert!(matches!(err, ConfigError::NoSources(ref title) if title == "Empty"));
}

#[test]
fn test_repository_segments_validated() {
    let json = r#"{"fields": [{"title": "T", "sources": [
        {"kind": "github_tags", "owner": "acme", "repo": "../admin"}
    ]}]}"#;
    let err = Config::from_json(json).unwrap().bindings().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidRepo(_)));
}

#[test]
fn test_bad_url_and_selector_rejected() {
    let json = r#"{"fields": [{"title": "T", "sources": [
        {"kind": "url", "url": "not a url", "shape": "bare"}
    ]}]}"#;
    let err = Config::from_json(json).unwrap().bindings().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { .. }));

    let json = r#"{"fields": [{"title": "T", "locator": {"selector": "td::before"}, "sources": [
        {"kind": "url", "url": "https://ci.test/x", "shape": "bare"}
    ]}]}"#;
    let err = Config::from_json(json).unwrap().bindings().unwrap_err();
    assert!(matches!(err, ConfigError::Selector(_)));
}

#[test]
fn test_unknown_source_kind_is_a_json_error() {
    let err = Config::from_json(r#"{"fields": [{"title": "T", "sources": [{"kind": "gitlab"}]}]}"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
    assert!(err.to_string().starts_with("invalid config"));
}
