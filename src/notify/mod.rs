// src/notify/mod.rs
pub mod sms;
pub mod throttle;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use self::throttle::Throttle;

/// Outbound channel for operator alerts.
#[async_trait::async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, body: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Dispatched,
    /// Attempted and failed; the window is still consumed.
    DispatchFailed,
    Suppressed,
}

impl NotifyOutcome {
    fn as_label(self) -> &'static str {
        match self {
            NotifyOutcome::Dispatched => "dispatched",
            NotifyOutcome::DispatchFailed => "failed",
            NotifyOutcome::Suppressed => "suppressed",
        }
    }
}

/// Logs every alert and forwards at most one per throttle window.
/// One instance is shared by all pollers, so the window is process-wide.
pub struct Notifier {
    sink: Arc<dyn AlertSink>,
    throttle: Mutex<Throttle>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn AlertSink>, throttle: Throttle) -> Self {
        Self {
            sink,
            throttle: Mutex::new(throttle),
        }
    }

    pub async fn notify(&self, description: &str, detail: &str) -> NotifyOutcome {
        self.notify_at(description, detail, Utc::now()).await
    }

    /// Never fails: dispatch errors are logged and swallowed.
    pub async fn notify_at(&self, description: &str, detail: &str, now: DateTime<Utc>) -> NotifyOutcome {
        error!(target: "notify", %description, %detail, "capture alert");

        // Claim under the lock so two pollers can't both pass the check.
        let claimed = {
            let mut th = self.throttle.lock().unwrap_or_else(|p| p.into_inner());
            th.try_claim(now)
        };

        let outcome = if !claimed {
            info!(target: "notify", sink = self.sink.name(), "alert suppressed by throttle window");
            NotifyOutcome::Suppressed
        } else {
            let body = format!("{description}\n{detail}");
            match self.sink.dispatch(&body).await {
                Ok(()) => NotifyOutcome::Dispatched,
                Err(e) => {
                    warn!(target: "notify", sink = self.sink.name(), error = %format!("{e:#}"), "alert dispatch failed");
                    NotifyOutcome::DispatchFailed
                }
            }
        };

        counter!("notify_dispatch_total", "outcome" => outcome.as_label()).increment(1);
        outcome
    }

    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.throttle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .last_sent_at()
    }
}

/// Sink that only logs; stands in where no SMS account is wired.
pub struct LogOnlySink;

#[async_trait::async_trait]
impl AlertSink for LogOnlySink {
    async fn dispatch(&self, body: &str) -> Result<()> {
        info!(target: "notify", %body, "log-only alert");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log-only"
    }
}
