use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use rangeforge::config::{self, Settings};
use rangeforge::orchestrator::{self, BuildOptions};
use rangeforge::utils::duration::parse_duration_to_seconds;

/// Topology compiler for Active Directory attack-range deployments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a full-build topology JSON file
    #[arg(short, long, conflicts_with = "update")]
    topology: Option<PathBuf>,

    /// Path to an incremental-update request JSON file
    #[arg(short, long)]
    update: Option<PathBuf>,

    /// Output directory for the compiled module plan
    #[arg(short, long, default_value = "range_output")]
    output: PathBuf,

    /// Path to a deployment settings YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Public IP address of the operator, allow-listed on the entry point
    #[arg(long, default_value = "")]
    caller_ip: String,

    /// Deployment identifier to reuse instead of generating one
    #[arg(long)]
    deployment_id: Option<String>,

    /// Deployment lifetime override, e.g. "4h" or "90m"
    #[arg(long)]
    expires_in: Option<String>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting Rangeforge topology compiler");
    info!("Output directory: {:?}", args.output);

    let settings = match &args.config {
        Some(path) => config::load_settings(path)
            .wrap_err_with(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => Settings::default(),
    };

    let expires_in_secs = match &args.expires_in {
        Some(raw) => Some(
            parse_duration_to_seconds(raw)
                .map_err(|e| eyre!("Invalid --expires-in value: {}", e))?,
        ),
        None => None,
    };

    let options = BuildOptions {
        caller_ip: args.caller_ip.clone(),
        deployment_id: args.deployment_id.clone(),
        expires_in_secs,
    };

    match (&args.topology, &args.update) {
        (Some(topology_path), None) => {
            info!("Running full-build profile on {:?}", topology_path);
            orchestrator::run_full_build(topology_path, &args.output, &settings, &options)?;
        }
        (None, Some(update_path)) => {
            info!("Running incremental-update profile on {:?}", update_path);
            orchestrator::run_update(update_path, &args.output, &settings, &options)?;
        }
        _ => {
            return Err(eyre!(
                "Exactly one of --topology or --update must be provided"
            ));
        }
    }

    info!("Compilation completed successfully");
    Ok(())
}
