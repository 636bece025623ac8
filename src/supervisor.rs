// src/supervisor.rs
//! Wires collaborators from `Settings` and runs pollers.

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::city::City;
use crate::config::{AlertChannel, FetcherKind, Settings, SinkKind};
use crate::error::{ConfigError, CycleError};
use crate::fetch::chrome::ChromeFetcher;
use crate::fetch::http::HttpFetcher;
use crate::fetch::{PageFetcher, PageSource};
use crate::notify::sms::TwilioSms;
use crate::notify::throttle::Throttle;
use crate::notify::{AlertSink, LogOnlySink, Notifier};
use crate::poller::{CityPoller, PollTiming};
use crate::sink::csv::CsvSink;
use crate::sink::mongo::MongoSink;
use crate::sink::ObservationSink;

/// Status returned by the on-demand surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    pub result: i32,
}

pub struct Supervisor {
    source: PageSource,
    fetcher: Arc<dyn PageFetcher>,
    sinks: Vec<Arc<dyn ObservationSink>>,
    notifier: Arc<Notifier>,
    timing: PollTiming,
}

impl Supervisor {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let cfg = &settings.config;
        let source = cfg.page_source()?;

        let fetcher: Arc<dyn PageFetcher> = match cfg.fetcher {
            FetcherKind::Chrome => Arc::new(
                ChromeFetcher::new(cfg.chrome_path.clone())
                    .with_idle_timeout(cfg.fetch_timeout()),
            ),
            FetcherKind::Http => Arc::new(HttpFetcher::new()),
        };

        let mut sinks: Vec<Arc<dyn ObservationSink>> = Vec::with_capacity(cfg.sinks.len());
        for kind in &cfg.sinks {
            match kind {
                SinkKind::Mongo => {
                    let uri = settings
                        .secrets
                        .mongo_url
                        .clone()
                        .ok_or(ConfigError::MissingEnv(crate::config::ENV_MONGO_URL))?;
                    sinks.push(Arc::new(MongoSink::new(uri, cfg.database.clone())));
                }
                SinkKind::Csv => sinks.push(Arc::new(CsvSink::new(cfg.csv_dir.clone()))),
            }
        }

        let alerts: Arc<dyn AlertSink> = match cfg.alerts {
            AlertChannel::Sms => {
                let creds = settings
                    .secrets
                    .twilio
                    .clone()
                    .ok_or(ConfigError::MissingEnv(crate::config::ENV_TWILIO_SID))?;
                Arc::new(TwilioSms::new(creds))
            }
            AlertChannel::Log => Arc::new(LogOnlySink),
        };
        let notifier = Arc::new(Notifier::new(alerts, Throttle::new(cfg.notify_window_secs)));

        Ok(Self::with_parts(
            source,
            fetcher,
            sinks,
            notifier,
            PollTiming::from_config(cfg),
        ))
    }

    pub fn with_parts(
        source: PageSource,
        fetcher: Arc<dyn PageFetcher>,
        sinks: Vec<Arc<dyn ObservationSink>>,
        notifier: Arc<Notifier>,
        timing: PollTiming,
    ) -> Self {
        Self {
            source,
            fetcher,
            sinks,
            notifier,
            timing,
        }
    }

    /// All pollers share this supervisor's notifier, fetcher and sinks.
    pub fn poller(&self, city: City) -> CityPoller {
        CityPoller::new(
            city,
            self.source.clone(),
            Arc::clone(&self.fetcher),
            self.sinks.clone(),
            Arc::clone(&self.notifier),
            self.timing,
        )
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Long-running surface: one task per city, returns when all have stopped.
    pub async fn run_all(&self, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();
        for city in City::ALL {
            let poller = self.poller(city);
            let token = cancel.clone();
            tasks.spawn(async move { poller.run_forever(token).await });
            info!(target: "capture", %city, "poller started");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(target: "capture", error = %e, "poller task ended abnormally");
            }
        }
    }

    /// On-demand surface: exactly one cycle for `city`.
    pub async fn run_once(
        &self,
        city: City,
        cancel: &CancellationToken,
    ) -> Result<InvocationResult, CycleError> {
        self.poller(city).capture(cancel).await?;
        Ok(InvocationResult { result: 0 })
    }
}
