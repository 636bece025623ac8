//! On-demand entrypoint: runs exactly one capture cycle for one city.
//!
//! Usage: `capture-once <Calgary|Edmonton>` (or set `CAPTURE_CITY`).
//! Prints `{"result":0}` on success; exits non-zero if the fetch/parse stage fails.

use anyhow::{Context, Result};
use er_wait_capture::config::env_lookup;
use er_wait_capture::{telemetry, City, Settings, Supervisor};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let raw = std::env::args()
        .nth(1)
        .or_else(|| env_lookup("CAPTURE_CITY"))
        .context("usage: capture-once <Calgary|Edmonton>")?;
    let city: City = raw.parse()?;

    let settings = Settings::from_env()?;
    let supervisor = Supervisor::from_settings(&settings)?;

    tracing::info!(%city, "data capturing starting");
    let status = supervisor.run_once(city, &CancellationToken::new()).await?;
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}
