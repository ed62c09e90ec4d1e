//! Store endpoint precedence, test mode and load path resolution

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use vanity_config::{EndpointOrigin, StoreEndpoint};
use vanity_core::{Playground, PlaygroundConfig, VanityError};
use vanity_experiment::StoreKind;

fn app_root() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn write_redis_yml(root: &TempDir, contents: &str) {
    let dir = root.path().join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("redis.yml"), contents).unwrap();
}

fn playground(root: &TempDir, environment: &str) -> Playground {
    Playground::new(
        PlaygroundConfig::new()
            .with_root(root.path())
            .with_environment(environment),
    )
}

#[test]
fn default_endpoint_without_file_or_override() {
    let root = app_root();
    let resolved = playground(&root, "production").store_endpoint().unwrap();
    assert_eq!(resolved.endpoint.to_string(), "localhost:6379");
    assert_eq!(resolved.origin, EndpointOrigin::Default);
}

#[test]
fn explicit_setting_wins() {
    let root = app_root();
    write_redis_yml(&root, "production: internal.local:6379\n");
    let playground = playground(&root, "production");
    playground.configure_store("127.0.0.1:6379").unwrap();

    let resolved = playground.store_endpoint().unwrap();
    assert_eq!(resolved.endpoint.to_string(), "127.0.0.1:6379");
    assert_eq!(resolved.origin, EndpointOrigin::Explicit);
}

#[test]
fn config_file_entry_beats_default() {
    let root = app_root();
    write_redis_yml(&root, "production: internal.local:6379\n");
    let resolved = playground(&root, "production").store_endpoint().unwrap();
    assert_eq!(resolved.endpoint, StoreEndpoint::new("internal.local", 6379));
    assert!(matches!(resolved.origin, EndpointOrigin::ConfigFile(_)));
}

#[test]
fn config_file_without_environment_falls_back() {
    let root = app_root();
    write_redis_yml(&root, "development: internal.local:6379\n");
    let resolved = playground(&root, "production").store_endpoint().unwrap();
    assert_eq!(resolved.endpoint.to_string(), "localhost:6379");
    assert_eq!(resolved.origin, EndpointOrigin::Default);
}

#[test]
fn malformed_config_file_is_an_error() {
    let root = app_root();
    write_redis_yml(&root, "production: [unclosed\n");
    let err = playground(&root, "production").store_endpoint().unwrap_err();
    assert!(matches!(err, VanityError::Config(_)));
}

#[test]
fn networked_store_uses_resolved_endpoint() {
    let root = app_root();
    write_redis_yml(&root, "production: internal.local:6390\n");
    let playground = playground(&root, "production");
    let store = playground.store().unwrap();
    assert_eq!(store.kind(), StoreKind::Redis);
    assert_eq!(store.describe(), "internal.local:6390");
}

#[test]
fn test_mode_uses_memory_double() {
    let root = app_root();
    let playground = playground(&root, "test");
    assert_eq!(playground.store_kind().unwrap(), StoreKind::Redis);

    playground.use_test_store();
    assert_eq!(playground.store_kind().unwrap(), StoreKind::Memory);
    for handle in 0..3 {
        let store = playground.store().unwrap();
        assert_eq!(store.kind(), StoreKind::Memory, "call {handle}");
        assert_eq!(store.describe(), "memory");
    }
}

#[test]
fn load_path_defaults_under_root() {
    let root = app_root();
    let playground = playground(&root, "test");
    assert_eq!(playground.load_path(), root.path().join("experiments"));
}

#[test]
fn relative_load_path_joins_root() {
    let root = app_root();
    let playground = playground(&root, "test");
    playground.configure("predictions");
    assert_eq!(playground.load_path(), root.path().join("predictions"));
}

#[test]
fn absolute_load_path_is_unchanged() {
    let root = app_root();
    let playground = playground(&root, "test");
    let absolute = PathBuf::from("/tmp/experiments");
    playground.configure(&absolute);
    assert_eq!(playground.load_path(), absolute);
}
