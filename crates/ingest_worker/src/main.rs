mod config;
mod ingest_worker;
mod runner;
mod telemetry;

use runner::Runner;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match config::IngestConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    telemetry::init(&config.log_level, config.log_json);

    info!("Starting tutorbase ingest worker");
    info!("Configuration: {:?}", config);

    let worker = match ingest_worker::IngestWorker::new(&config).await {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to initialize ingest worker");
            std::process::exit(1);
        }
    };
    let stats = worker.stats();

    let mut runner = Runner::new()
        .with_closer(move || async move {
            let snap = stats.snapshot();
            info!(
                consumed = snap.consumed,
                persisted = snap.inserted + snap.updated,
                retried = snap.retried,
                dead_lettered = snap.dead_lettered,
                "Final pipeline stats"
            );
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10));

    for process in worker.into_runner_processes() {
        runner = runner.with_app_process(process);
    }

    runner.run().await;
}
