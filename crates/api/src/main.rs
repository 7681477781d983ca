//! Drowsiness Monitor - Main Entry Point

use api::{config::MonitorConfig, init_logging, run_server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].as_str());

    let config = MonitorConfig::load(config_path)?;
    init_logging(&config.log_level);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Sensitivity {} (ear < {:.3}, mar > {:.3}), smoothing {} tick(s)",
        config.detection.sensitivity,
        config.detection.thresholds().ear,
        config.detection.thresholds().mar,
        config.detection.smoothing_ticks
    );

    run_server(config).await
}
