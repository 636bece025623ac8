// tests/config_env.rs
use er_wait_capture::config::{AlertChannel, FetcherKind, SinkKind, ENV_CONFIG_PATH};
use er_wait_capture::{CaptureConfig, ConfigError, Settings};
use serial_test::serial;
use std::env;
use std::fs;

const ALL_KEYS: &[&str] = &[
    ENV_CONFIG_PATH,
    "POLL_INTERVAL_SECS",
    "SETTLE_SECS",
    "STAGGER_SECS",
    "FETCH_TIMEOUT_SECS",
    "DISCOVERY_SELECTOR",
    "CAPTURE_SINKS",
    "CSV_DIR",
    "MONGO_DB_URL",
    "TWILIO_ACCOUNT_SID",
    "TWILIO_AUTH_TOKEN",
    "MY_TWILIO_NUM",
    "MY_PHONE_NUM",
];

fn clear_env() {
    for k in ALL_KEYS {
        env::remove_var(k);
    }
}

fn write_config(body: &str) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    fs::write(file.path(), body).unwrap();
    file
}

#[test]
#[serial]
fn file_then_env_overrides() {
    clear_env();
    let file = write_config(
        r#"
poll_interval_secs = 600
fetcher = "http"
sinks = ["csv"]
alerts = "log"
"#,
    );
    env::set_var(ENV_CONFIG_PATH, file.path());
    env::set_var("POLL_INTERVAL_SECS", "120");
    env::set_var("CSV_DIR", "/var/lib/capture");

    let cfg = CaptureConfig::load_default().unwrap();
    assert_eq!(cfg.poll_interval_secs, 120);
    assert_eq!(cfg.fetcher, FetcherKind::Http);
    assert_eq!(cfg.sinks, vec![SinkKind::Csv]);
    assert_eq!(cfg.alerts, AlertChannel::Log);
    assert_eq!(cfg.csv_dir.to_str(), Some("/var/lib/capture"));
    // untouched keys keep their defaults
    assert_eq!(cfg.stagger_secs, 30);
    clear_env();
}

#[test]
#[serial]
fn csv_and_log_need_no_secrets() {
    clear_env();
    let file = write_config("sinks = [\"csv\"]\nalerts = \"log\"\n");
    env::set_var(ENV_CONFIG_PATH, file.path());

    let settings = Settings::from_env().unwrap();
    assert!(settings.secrets.mongo_url.is_none());
    assert!(settings.secrets.twilio.is_none());
    clear_env();
}

#[test]
#[serial]
fn default_sinks_require_mongo_url() {
    clear_env();
    let file = write_config("alerts = \"log\"\n");
    env::set_var(ENV_CONFIG_PATH, file.path());

    let err = Settings::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv("MONGO_DB_URL")));

    env::set_var("MONGO_DB_URL", "mongodb://localhost:27017");
    let settings = Settings::from_env().unwrap();
    assert_eq!(
        settings.secrets.mongo_url.as_deref(),
        Some("mongodb://localhost:27017")
    );
    clear_env();
}

#[test]
#[serial]
fn blank_env_values_count_as_unset() {
    clear_env();
    let file = write_config("sinks = [\"csv\"]\nalerts = \"log\"\n");
    env::set_var(ENV_CONFIG_PATH, file.path());
    env::set_var("POLL_INTERVAL_SECS", "   ");

    let cfg = CaptureConfig::load_default().unwrap();
    assert_eq!(cfg.poll_interval_secs, 3600);
    clear_env();
}

#[test]
#[serial]
fn unreadable_config_path_is_reported() {
    clear_env();
    env::set_var(ENV_CONFIG_PATH, "/nonexistent/capture.toml");
    let err = CaptureConfig::load_default().unwrap_err();
    assert!(matches!(err, ConfigError::File { ref path, .. } if path == "/nonexistent/capture.toml"));
    clear_env();
}

#[test]
#[serial]
fn bad_override_value_is_rejected() {
    clear_env();
    let file = write_config("sinks = [\"csv\"]\nalerts = \"log\"\n");
    env::set_var(ENV_CONFIG_PATH, file.path());
    env::set_var("CAPTURE_SINKS", "csv,postgres");

    let err = CaptureConfig::load_default().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "sinks", .. }));
    clear_env();
}
