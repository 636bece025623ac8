// src/error.rs
//! Typed errors for the capture pipeline. Adapters (SMS, Mongo, CSV, browser)
//! use `anyhow` internally and are folded into these at the stage boundary.

use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Deployment errors: raised at construction time, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported city {0:?}: expected \"Calgary\" or \"Edmonton\"")]
    UnsupportedCity(String),
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("reading config file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("browser session failed for {url}: {source}")]
    Browser {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetch of {url} exceeded deadline of {deadline:?}")]
    Deadline { url: String, deadline: Duration },
    #[error("fetch of {0} cancelled")]
    Cancelled(String),
    #[error("discovery link {selector:?} not found on {url}")]
    DiscoveryLinkMissing { url: String, selector: String },
    #[error("invalid url {url}: {reason}")]
    BadUrl { url: String, reason: String },
    #[error("fetch worker panicked")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document is empty")]
    EmptyDocument,
    #[error("no section matching {0:?} in document")]
    MissingSection(String),
    #[error("section lists {names} hospital names but {waits} wait-time blocks")]
    Misaligned { names: usize, waits: usize },
    #[error("invalid selector {0:?}")]
    Selector(String),
}

/// Cycle-fatal failure, tagged with the stage it happened in.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch stage: {0}")]
    Fetch(#[from] FetchError),
    #[error("parse stage: {0}")]
    Parse(#[from] ExtractError),
}

impl CycleError {
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "fetch",
            CycleError::Parse(_) => "parse",
        }
    }
}
