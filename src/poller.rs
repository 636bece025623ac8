// src/poller.rs
//! One city's capture loop: stagger → fetch → parse/extract → persist → sleep.

use chrono::Local;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::city::City;
use crate::config::CaptureConfig;
use crate::error::{CycleError, FetchError};
use crate::extract::extract_from_html;
use crate::fetch::{FetchOptions, PageFetcher, PageSource};
use crate::notify::Notifier;
use crate::observation::Observation;
use crate::sink::ObservationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    pub interval: Duration,
    pub settle: Duration,
    pub stagger: Duration,
    pub fetch_timeout: Duration,
}

impl PollTiming {
    pub fn from_config(cfg: &CaptureConfig) -> Self {
        Self {
            interval: cfg.poll_interval(),
            settle: cfg.settle(),
            stagger: cfg.stagger(),
            fetch_timeout: cfg.fetch_timeout(),
        }
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            settle: self.settle,
            deadline: self.fetch_timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub observation: Observation,
    pub persisted: Vec<&'static str>,
    pub failed_sinks: Vec<&'static str>,
}

pub struct CityPoller {
    city: City,
    source: PageSource,
    fetcher: Arc<dyn PageFetcher>,
    sinks: Vec<Arc<dyn ObservationSink>>,
    notifier: Arc<Notifier>,
    timing: PollTiming,
}

/// Sleeps `d`; false if cancelled first.
async fn pause(d: Duration, cancel: &CancellationToken) -> bool {
    if d.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

impl CityPoller {
    pub fn new(
        city: City,
        source: PageSource,
        fetcher: Arc<dyn PageFetcher>,
        sinks: Vec<Arc<dyn ObservationSink>>,
        notifier: Arc<Notifier>,
        timing: PollTiming,
    ) -> Self {
        Self {
            city,
            source,
            fetcher,
            sinks,
            notifier,
            timing,
        }
    }

    pub fn city(&self) -> City {
        self.city
    }

    /// One cycle without failure escalation. Sink failures are notified here
    /// and never fail the cycle.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let city = self.city;

        if city.is_second_mover() && !pause(self.timing.stagger, cancel).await {
            return Err(FetchError::Cancelled(format!("{city} stagger")).into());
        }

        let opts = self.timing.fetch_options();
        info!(target: "capture", %city, entry = %self.source.entry_url(), "obtaining wait data");
        let (url, page) = self.source.load(self.fetcher.as_ref(), opts, cancel).await?;
        debug!(target: "capture", %city, %url, bytes = page.len(), "page loaded");

        let observation = extract_from_html(&page, city, Local::now().naive_local())?;
        let unknown = observation.unknown_count();
        if unknown > 0 {
            counter!("capture_hospitals_unknown_total", "city" => city.as_str()).increment(unknown as u64);
        }

        let mut persisted = Vec::with_capacity(self.sinks.len());
        let mut failed_sinks = Vec::new();
        for sink in &self.sinks {
            match sink.persist(city, &observation).await {
                Ok(()) => persisted.push(sink.name()),
                Err(e) => {
                    counter!("capture_persist_errors_total", "city" => city.as_str(), "sink" => sink.name())
                        .increment(1);
                    failed_sinks.push(sink.name());
                    self.notifier
                        .notify(
                            &format!("Exception happened in {city} write to {} sink.", sink.name()),
                            &format!("{e:#}"),
                        )
                        .await;
                }
            }
        }

        info!(
            target: "capture",
            %city,
            timestamp = observation.timestamp(),
            hospitals = observation.hospital_count(),
            unknown,
            persisted = ?persisted,
            "polled wait times"
        );
        Ok(CycleReport {
            observation,
            persisted,
            failed_sinks,
        })
    }

    /// One cycle with escalation: cycle-fatal failures are notified and returned.
    pub async fn capture(&self, cancel: &CancellationToken) -> Result<CycleReport, CycleError> {
        let city = self.city;
        counter!("capture_cycles_total", "city" => city.as_str()).increment(1);

        let res = self.run_cycle(cancel).await;
        match &res {
            Ok(_) => {
                gauge!("capture_last_success_ts", "city" => city.as_str())
                    .set(chrono::Utc::now().timestamp() as f64);
            }
            Err(CycleError::Fetch(FetchError::Cancelled(_))) => {
                info!(target: "capture", %city, "cycle cancelled");
            }
            Err(e) => {
                counter!("capture_failures_total", "city" => city.as_str(), "stage" => e.stage())
                    .increment(1);
                warn!(target: "capture", %city, stage = e.stage(), error = %e, "cycle failed");
                self.notifier
                    .notify(
                        &format!("Exception happened in {city} capture ({} stage).", e.stage()),
                        &e.to_string(),
                    )
                    .await;
            }
        }
        res
    }

    /// Runs cycles until `cancel` fires, sleeping the full interval after each
    /// one whether it succeeded or not.
    pub async fn run_forever(&self, cancel: CancellationToken) {
        let city = self.city;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let _ = self.capture(&cancel).await;

            info!(
                target: "capture",
                %city,
                secs = self.timing.interval.as_secs(),
                "waiting to poll again"
            );
            if !pause(self.timing.interval, &cancel).await {
                break;
            }
        }
        info!(target: "capture", %city, "poller stopped");
    }
}
