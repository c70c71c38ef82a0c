//! Tests for key mapping, version translation and configuration

use treekv::config::{Config, RetryPolicy};
use treekv::key::{disassemble_key, disassemble_prefix, PathMapper};
use treekv::version::{to_native, to_user, ANY_VERSION, SET_RACE_VERSION};
use treekv::KvError;

// =============================================================================
// Key Decomposition Tests
// =============================================================================

#[test]
fn test_disassemble_single_segment() {
    assert_eq!(disassemble_key("/key").unwrap(), vec!["key"]);
}

#[test]
fn test_disassemble_nested_key() {
    assert_eq!(disassemble_key("/a/b/c").unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_disassemble_round_trips() {
    for key in ["/a", "/a/b", "/with space/x", "/ünïcode/ключ"] {
        let segments = disassemble_key(key).unwrap();
        assert_eq!(format!("/{}", segments.join("/")), key);
    }
}

#[test]
fn test_malformed_keys_rejected() {
    for key in ["", "/", "key", "/a/", "/a//b", "/.", "/a/..", "/zookeeper", "/a/\nb"] {
        match disassemble_key(key) {
            Err(KvError::MalformedKey(_)) => {}
            other => panic!("expected MalformedKey for {:?}, got {:?}", key, other),
        }
    }
}

#[test]
fn test_empty_prefix_has_no_segments() {
    assert!(disassemble_prefix("").unwrap().is_empty());
    assert!(disassemble_prefix("/").unwrap().is_empty());
    assert_eq!(disassemble_prefix("/app/v1").unwrap(), vec!["app", "v1"]);
    assert!(disassemble_prefix("app").is_err());
}

// =============================================================================
// Path Mapper Tests
// =============================================================================

#[test]
fn test_assemble_with_prefix() {
    let mapper = PathMapper::from_prefix("/app/v1").unwrap();
    assert_eq!(mapper.node_path("/a/b").unwrap(), "/app/v1/a/b");
    assert_eq!(mapper.root(), "/app/v1");
}

#[test]
fn test_assemble_without_prefix() {
    let mapper = PathMapper::from_prefix("").unwrap();
    assert_eq!(mapper.node_path("/a").unwrap(), "/a");
    assert_eq!(mapper.root(), "/");
}

#[test]
fn test_node_path_rejects_malformed_key() {
    let mapper = PathMapper::from_prefix("/app").unwrap();
    assert!(matches!(mapper.node_path("a/b"), Err(KvError::MalformedKey(_))));
}

// =============================================================================
// Version Translation Tests
// =============================================================================

#[test]
fn test_user_version_is_native_plus_one() {
    assert_eq!(to_user(0), 1);
    assert_eq!(to_user(41), 42);
}

#[test]
fn test_native_version_is_user_minus_one() {
    assert_eq!(to_native(1), 0);
    assert_eq!(to_native(42), 41);
}

#[test]
fn test_zero_maps_to_any_version() {
    assert_eq!(to_native(0), ANY_VERSION);
}

#[test]
fn test_oversized_version_never_matches() {
    assert_eq!(to_native(u64::MAX), i64::MAX);
    assert_ne!(to_native(u64::MAX), ANY_VERSION);
}

#[test]
fn test_set_race_sentinel_value() {
    assert_eq!(SET_RACE_VERSION, 1u64 << 62);
    assert_eq!(to_native(SET_RACE_VERSION) + 1, 1i64 << 62);
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_defaults() {
    let config = Config::default();
    assert_eq!(config.address, "mem://local");
    assert_eq!(config.prefix, "");
    assert_eq!(config.session_timeout_ms, 10_000);
    assert_eq!(config.retry, RetryPolicy::Unbounded);
    config.validate().unwrap();
}

#[test]
fn test_config_builder() {
    let config = Config::builder()
        .address("mem://other")
        .prefix("/app")
        .session_timeout_ms(500)
        .retry(RetryPolicy::Bounded {
            max_attempts: 3,
            base_backoff_ms: 1,
            max_backoff_ms: 10,
        })
        .build();

    assert_eq!(config.address, "mem://other");
    assert_eq!(config.prefix, "/app");
    assert_eq!(config.session_timeout().as_millis(), 500);
    config.validate().unwrap();
}

#[test]
fn test_config_rejects_bad_prefix() {
    let config = Config::builder().prefix("app/").build();
    assert!(matches!(config.validate(), Err(KvError::Config(_))));
}

#[test]
fn test_config_rejects_empty_address() {
    let config = Config::builder().address("").build();
    assert!(matches!(config.validate(), Err(KvError::Config(_))));
}

#[test]
fn test_config_rejects_zero_attempts() {
    let config = Config::builder()
        .retry(RetryPolicy::Bounded {
            max_attempts: 0,
            base_backoff_ms: 1,
            max_backoff_ms: 1,
        })
        .build();
    assert!(matches!(config.validate(), Err(KvError::Config(_))));
}

#[test]
fn test_bounded_backoff_doubles_and_caps() {
    let policy = RetryPolicy::Bounded {
        max_attempts: 10,
        base_backoff_ms: 5,
        max_backoff_ms: 30,
    };

    assert_eq!(policy.backoff(1).as_millis(), 5);
    assert_eq!(policy.backoff(2).as_millis(), 10);
    assert_eq!(policy.backoff(3).as_millis(), 20);
    assert_eq!(policy.backoff(4).as_millis(), 30);
    assert_eq!(policy.backoff(60).as_millis(), 30);

    assert!(policy.allows(9));
    assert!(!policy.allows(10));
}

#[test]
fn test_unbounded_policy_never_waits() {
    let policy = RetryPolicy::Unbounded;
    assert!(policy.backoff(1000).is_zero());
    assert!(policy.allows(u32::MAX));
}
