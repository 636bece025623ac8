// src/config.rs
//! Capture configuration: tunables from TOML (+ env overrides), secrets from env only.

use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::fetch::PageSource;

pub const DEFAULT_CONFIG_PATH: &str = "config/capture.toml";
pub const ENV_CONFIG_PATH: &str = "CAPTURE_CONFIG_PATH";

pub const ENV_MONGO_URL: &str = "MONGO_DB_URL";
pub const ENV_TWILIO_SID: &str = "TWILIO_ACCOUNT_SID";
pub const ENV_TWILIO_TOKEN: &str = "TWILIO_AUTH_TOKEN";
pub const ENV_TWILIO_FROM: &str = "MY_TWILIO_NUM";
pub const ENV_TWILIO_TO: &str = "MY_PHONE_NUM";

pub const DEFAULT_ROOT_URL: &str = "https://www.albertahealthservices.ca";
pub const DEFAULT_LANDING_PATH: &str = "/waittimes/waittimes.aspx";
pub const DEFAULT_DISCOVERY_SELECTOR: &str = "a.btn.btn-primary.btn-lg.in-btn-blue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    Chrome,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Mongo,
    Csv,
}

impl FromStr for SinkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" => Ok(SinkKind::Mongo),
            "csv" => Ok(SinkKind::Csv),
            other => Err(ConfigError::Invalid {
                key: "sinks",
                reason: format!("unknown sink {other:?}"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Sms,
    /// Log only; for local runs without an SMS account.
    Log,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub poll_interval_secs: u64,
    pub settle_secs: u64,
    pub stagger_secs: u64,
    pub fetch_timeout_secs: u64,
    pub notify_window_secs: i64,
    pub root_url: String,
    pub landing_path: String,
    /// Empty or absent: the landing page is the data page.
    pub discovery_selector: Option<String>,
    pub fetcher: FetcherKind,
    pub chrome_path: Option<PathBuf>,
    pub sinks: Vec<SinkKind>,
    pub csv_dir: PathBuf,
    pub database: String,
    pub alerts: AlertChannel,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3600,
            settle_secs: 3,
            stagger_secs: 30,
            fetch_timeout_secs: 180,
            notify_window_secs: 24 * 3600,
            root_url: DEFAULT_ROOT_URL.to_string(),
            landing_path: DEFAULT_LANDING_PATH.to_string(),
            discovery_selector: Some(DEFAULT_DISCOVERY_SELECTOR.to_string()),
            fetcher: FetcherKind::Chrome,
            chrome_path: None,
            sinks: vec![SinkKind::Mongo],
            csv_dir: PathBuf::from("."),
            database: "erWaitTimesDB".to_string(),
            alerts: AlertChannel::Sms,
        }
    }
}

/// Env lookup that treats blank values as unset.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("{raw:?}: {e}"),
    })
}

impl CaptureConfig {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let file_err = |source: crate::error::BoxError| ConfigError::File {
            path: path.display().to_string(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(|e| file_err(e.into()))?;
        toml::from_str(&content).map_err(|e| file_err(e.into()))
    }

    /// $CAPTURE_CONFIG_PATH, else config/capture.toml if present, else defaults;
    /// then env overrides, then validation.
    pub fn load_default() -> Result<Self, ConfigError> {
        let mut cfg = match env_lookup(ENV_CONFIG_PATH) {
            Some(p) => Self::load_from(Path::new(&p))?,
            None => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from(p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(env_lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_u64("POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("SETTLE_SECS") {
            self.settle_secs = parse_u64("SETTLE_SECS", &v)?;
        }
        if let Some(v) = get("STAGGER_SECS") {
            self.stagger_secs = parse_u64("STAGGER_SECS", &v)?;
        }
        if let Some(v) = get("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = parse_u64("FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("DISCOVERY_SELECTOR") {
            self.discovery_selector = Some(v);
        }
        if let Some(v) = get("CAPTURE_SINKS") {
            self.sinks = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(SinkKind::from_str)
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = get("CSV_DIR") {
            self.csv_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                reason: "must be > 0".into(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_secs",
                reason: "must be > 0".into(),
            });
        }
        if self.sinks.is_empty() {
            return Err(ConfigError::Invalid {
                key: "sinks",
                reason: "at least one sink is required".into(),
            });
        }
        if let Some((i, dup)) = self
            .sinks
            .iter()
            .enumerate()
            .find(|&(i, kind)| self.sinks[..i].contains(kind))
        {
            return Err(ConfigError::Invalid {
                key: "sinks",
                reason: format!("{dup:?} listed more than once (entry {i})"),
            });
        }
        if let Some(sel) = self.discovery() {
            scraper::Selector::parse(sel).map_err(|e| ConfigError::Invalid {
                key: "discovery_selector",
                reason: format!("{sel:?}: {e:?}"),
            })?;
        }
        self.page_source().map(|_| ())
    }

    fn discovery(&self) -> Option<&str> {
        self.discovery_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn page_source(&self) -> Result<PageSource, ConfigError> {
        let bad_url = |reason: String| ConfigError::Invalid {
            key: "root_url",
            reason,
        };
        let root = Url::parse(&self.root_url).map_err(|e| bad_url(e.to_string()))?;
        let landing = root
            .join(&self.landing_path)
            .map_err(|e| bad_url(e.to_string()))?;
        Ok(match self.discovery() {
            Some(sel) => PageSource::Discovered {
                landing,
                root,
                selector: sel.to_string(),
            },
            None => PageSource::Fixed(landing),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn uses_sink(&self, kind: SinkKind) -> bool {
        self.sinks.contains(&kind)
    }
}

#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

impl fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from_number", &self.from_number)
            .field("to_number", &self.to_number)
            .finish()
    }
}

/// Secrets required by the enabled sinks and alert channel.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub mongo_url: Option<String>,
    pub twilio: Option<TwilioCredentials>,
}

impl Secrets {
    pub fn from_env(cfg: &CaptureConfig) -> Result<Self, ConfigError> {
        Self::from_lookup(cfg, env_lookup)
    }

    pub fn from_lookup<F>(cfg: &CaptureConfig, get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| get(key).ok_or(ConfigError::MissingEnv(key));

        let mongo_url = if cfg.uses_sink(SinkKind::Mongo) {
            Some(require(ENV_MONGO_URL)?)
        } else {
            None
        };
        let twilio = match cfg.alerts {
            AlertChannel::Sms => Some(TwilioCredentials {
                account_sid: require(ENV_TWILIO_SID)?,
                auth_token: require(ENV_TWILIO_TOKEN)?,
                from_number: require(ENV_TWILIO_FROM)?,
                to_number: require(ENV_TWILIO_TO)?,
            }),
            AlertChannel::Log => None,
        };
        Ok(Self { mongo_url, twilio })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config: CaptureConfig,
    pub secrets: Secrets,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = CaptureConfig::load_default()?;
        let secrets = Secrets::from_env(&config)?;
        Ok(Self { config, secrets })
    }
}
