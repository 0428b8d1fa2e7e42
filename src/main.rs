use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use veil::configuration::config::Config;
use veil::controller::controller_handler::Controller;

#[derive(Parser)]
#[command(name = "veil")]
#[command(version)]
#[command(about = "Provider service and tunnel session node")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(env = "VEIL_CONFIG")]
    config_file: PathBuf,
}

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    info!("Importing configuration");
    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration imported successfully");

    let controller = match Controller::new(config).await {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
