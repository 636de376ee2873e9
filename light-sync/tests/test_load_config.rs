use light_sync::load_config::{load_config, PASSWORD_ENV, URL_ENV, USER_ENV};
use light_sync_core::collect::ConflictPolicy;
use light_sync_core::ArtifactKind;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
server:
  url: "http://localhost:8080"
  user: "admin@example.com"
  client_id: "f7d42348-c647-4efb-a52d-4c5787421e72"
  timeout_secs: 10
sync:
  concurrency: 4
  retry_attempts: 5
  retry_backoff_ms: 50
jobs:
  - kind: page
    roots: ["src/main/resources/pages"]
    sql_output: "target/page.sql"
  - kind: rule
    roots: ["src/main/java", "src/generated/java"]
    encoding: "ISO-8859-1"
    interface: "BusinessRule"
    on_duplicate: reject
    sql_output: "target/rule.sql"
    document_store: "target/docstore"
"#;

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

fn clear_env() {
    env::remove_var(PASSWORD_ENV);
    env::remove_var(URL_ENV);
    env::remove_var(USER_ENV);
}

/// A full config maps every section onto typed values and picks up the password from env.
#[test]
#[serial]
fn test_load_config_success_with_all_sections() {
    clear_env();
    env::set_var(PASSWORD_ENV, "s3cret");
    let config_file = config_file(FULL_CONFIG);

    let config = load_config(config_file.path()).expect("Config should load");

    assert_eq!(config.server.url, "http://localhost:8080");
    assert_eq!(config.server.password, "s3cret");
    assert_eq!(config.server.timeout(), Duration::from_secs(10));
    assert_eq!(config.jobs.len(), 2);

    let page = &config.jobs[0];
    assert_eq!(page.kind, ArtifactKind::Page);
    assert_eq!(page.encoding, "UTF-8");
    assert_eq!(page.on_duplicate, ConflictPolicy::KeepLast);
    assert_eq!(page.sql_output, Some(PathBuf::from("target/page.sql")));

    let rule = &config.jobs[1];
    assert_eq!(rule.roots.len(), 2);
    let predicate = rule.predicate();
    assert_eq!(predicate.kind, ArtifactKind::Rule);
    assert_eq!(predicate.encoding, "ISO-8859-1");
    assert_eq!(predicate.interface, "BusinessRule");
    assert_eq!(predicate.on_duplicate, ConflictPolicy::Reject);

    let options = config.sync.options(true);
    assert_eq!(options.concurrency, 4);
    assert_eq!(options.retry.max_attempts, 5);
    assert_eq!(options.retry.initial_backoff, Duration::from_millis(50));
    assert!(options.dry_run);
    clear_env();
}

/// Omitted sections fall back to the documented defaults.
#[test]
#[serial]
fn test_load_config_defaults() {
    clear_env();
    env::set_var(PASSWORD_ENV, "pw");
    let config_file = config_file(
        r#"
server:
  url: "http://localhost:8080"
  user: "admin"
  client_id: "c"
jobs:
  - kind: rules
    roots: ["src"]
"#,
    );

    let config = load_config(config_file.path()).expect("Config should load");
    assert_eq!(config.server.timeout(), Duration::from_secs(5));
    assert_eq!(config.jobs[0].kind, ArtifactKind::Rule);
    assert_eq!(config.jobs[0].interface, "Rule");
    let options = config.sync.options(false);
    assert_eq!(options.concurrency, 1);
    assert_eq!(options.retry.max_attempts, 3);
    assert_eq!(options.retry.initial_backoff, Duration::from_millis(200));
    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_server_url_and_user() {
    clear_env();
    env::set_var(PASSWORD_ENV, "pw");
    env::set_var(URL_ENV, "https://light.internal");
    env::set_var(USER_ENV, "ci-bot");
    let config_file = config_file(FULL_CONFIG);

    let config = load_config(config_file.path()).expect("Config should load");
    assert_eq!(config.server.url, "https://light.internal");
    assert_eq!(config.server.user, "ci-bot");
    clear_env();
}

#[test]
#[serial]
fn test_missing_password_is_an_error() {
    clear_env();
    let config_file = config_file(FULL_CONFIG);

    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains(PASSWORD_ENV), "{err}");
}

#[test]
#[serial]
fn test_password_is_redacted_from_debug_output() {
    clear_env();
    env::set_var(PASSWORD_ENV, "do-not-print-me");
    let config_file = config_file(FULL_CONFIG);

    let config = load_config(config_file.path()).expect("Config should load");
    let debug = format!("{config:?}");
    assert!(!debug.contains("do-not-print-me"));
    clear_env();
}

#[test]
#[serial]
fn test_document_store_on_page_job_is_rejected() {
    clear_env();
    env::set_var(PASSWORD_ENV, "pw");
    let config_file = config_file(
        r#"
server: { url: "http://x", user: "u", client_id: "c" }
jobs:
  - kind: page
    roots: ["pages"]
    document_store: "store"
"#,
    );

    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("document_store"), "{err}");
    clear_env();
}

#[test]
#[serial]
fn test_unknown_job_kind_fails_to_parse() {
    clear_env();
    env::set_var(PASSWORD_ENV, "pw");
    let config_file = config_file(
        r#"
server: { url: "http://x", user: "u", client_id: "c" }
jobs:
  - kind: stylesheet
    roots: ["css"]
"#,
    );

    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"), "{err}");
    clear_env();
}

#[test]
#[serial]
fn test_zero_timeout_is_rejected() {
    clear_env();
    env::set_var(PASSWORD_ENV, "pw");
    let config_file = config_file(
        r#"
server: { url: "http://x", user: "u", client_id: "c", timeout_secs: 0 }
jobs: []
"#,
    );

    let err = load_config(config_file.path()).unwrap_err();
    assert!(err.to_string().contains("timeout_secs"), "{err}");
    clear_env();
}

#[test]
fn test_missing_config_file_is_an_error() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
