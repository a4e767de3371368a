use dotenv::dotenv;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod mint;
mod x402;

use config::Config;
use mint::Orchestrator;
use x402::HttpTransportFactory;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let filter = env::var("LOG_LEVEL")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::new().parse_filters(&filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.private_keys.is_empty() {
        log::error!("No PRIVATE_KEYS provided. Exiting.");
        return ExitCode::FAILURE;
    }

    let transports = Arc::new(HttpTransportFactory::new(config.request_timeout));
    let orchestrator = Orchestrator::new(config.mint_settings(), config.max_workers, transports);
    let report = orchestrator.run(config.private_keys.clone()).await;

    log::info!(
        "Final: {} success, {} failed",
        report.success_count(),
        report.failure_count()
    );
    for failed in report.failures() {
        log::info!(
            "Failed {}: {} ({})",
            failed.account_suffix,
            failed.error.as_deref().unwrap_or("unknown"),
            failed.error_type.as_deref().unwrap_or("unknown")
        );
    }

    match mint::write_json(&report, config.results_path.as_deref()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
