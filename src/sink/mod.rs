// src/sink/mod.rs
pub mod csv;
pub mod mongo;

use anyhow::Result;

use crate::city::City;
use crate::observation::Observation;

/// Durable destination for observations. Append-only, no dedup.
#[async_trait::async_trait]
pub trait ObservationSink: Send + Sync {
    async fn persist(&self, city: City, obs: &Observation) -> Result<()>;
    fn name(&self) -> &'static str;
}
