#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use log::error;
use std::env;
use ultitracker::app;
use ultitracker::config::Config;

/// Main entry point for the dashboard
///
/// Usage: `ultitracker [config.json]`. Without an argument the config path
/// comes from `ULTITRACKER_CONFIG`, then defaults to `config.json`.
#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config_path = Config::locate(env::args().nth(1));
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app::run(config).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
