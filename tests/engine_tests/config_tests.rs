//! Tests for Config defaults, builder and validation

use std::path::Path;
use std::time::Duration;

use sqbot::{Config, QueryError, QueryHandle};

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.addr(), "127.0.0.1:10011");
    assert_eq!(config.connect_timeout(), Duration::from_secs(8));
    assert_eq!(config.socket_timeout(), Duration::from_millis(500));
    assert_eq!(config.keepalive(), Duration::from_secs(240));
    assert_eq!(config.request_delay_ms, 125);
    assert_eq!(config.blocking_timeout(), Duration::from_secs(30));
    assert!(config.net_dump.is_none());
    assert_eq!(config.command_prefix, "!");
    assert_eq!(config.command_pool_size, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder() {
    let config = Config::builder()
        .host("ts.example.org")
        .port(10022)
        .socket_timeout_ms(100)
        .keepalive_secs(60)
        .request_delay_ms(0)
        .net_dump("/tmp/query.log")
        .command_prefix(".")
        .build();

    assert_eq!(config.addr(), "ts.example.org:10022");
    assert_eq!(config.socket_timeout_ms, 100);
    assert_eq!(config.keepalive_secs, 60);
    assert_eq!(config.request_delay_ms, 0);
    assert_eq!(config.net_dump.as_deref(), Some(Path::new("/tmp/query.log")));
    assert_eq!(config.command_prefix, ".");
}

#[test]
fn test_validate_rejects_unusable_values() {
    for config in [
        Config::builder().host("").build(),
        Config::builder().connect_timeout_ms(0).build(),
        Config::builder().socket_timeout_ms(0).build(),
        Config::builder().keepalive_secs(0).build(),
        Config::builder().command_pool_size(0).build(),
    ] {
        assert!(matches!(config.validate(), Err(QueryError::Config(_))), "{:?}", config);
    }
}

#[test]
fn test_detached_handle_validates_config() {
    let result = QueryHandle::detached(Config::builder().keepalive_secs(0).build());
    assert!(matches!(result, Err(QueryError::Config(_))));
}
