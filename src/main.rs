use std::process::ExitCode;
use std::sync::Arc;

use boxoffice::{ClientState, Config, LogWriter, Pacing, Subscribe, Venue};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "bad configuration");
            return ExitCode::FAILURE;
        }
    };
    cfg.pacing = Pacing::theatrical();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    match Venue::builder(cfg).with_subscribers(subs).build().run().await {
        Ok(report) => {
            tracing::info!(
                served = report.count(ClientState::Done),
                rejected = report.count(ClientState::Rejected),
                aborted = report.count(ClientState::Aborted),
                seats_left = report.seats.available,
                settlements = report.settlements_confirmed,
                restocks = report.restocks_applied,
                interrupted = report.interrupted,
                "venue closed"
            );
            for counter in &report.counters {
                tracing::info!(
                    counter = counter.counter,
                    drinks = counter.on_hand.drinks,
                    popcorn = counter.on_hand.popcorn,
                    restocks = counter.restocks,
                    "final stock"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "venue failed");
            ExitCode::FAILURE
        }
    }
}
