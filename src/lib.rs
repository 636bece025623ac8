// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod city;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod notify;
pub mod observation;
pub mod poller;
pub mod sink;
pub mod supervisor;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::city::City;
pub use crate::config::{CaptureConfig, Settings};
pub use crate::error::{ConfigError, CycleError, ExtractError, FetchError};
pub use crate::notify::{Notifier, NotifyOutcome};
pub use crate::observation::Observation;
pub use crate::poller::{CityPoller, PollTiming};
pub use crate::supervisor::{InvocationResult, Supervisor};
