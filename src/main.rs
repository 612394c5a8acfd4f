use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};

use fission::cli::Cli;
use fission::config::AppConfig;
use fission::logger::{self, VerbosityLevel};
use fission::{CancelFlag, Fission};

/// 128 + SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Handle --init flag first (before any other processing)
    if args.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("Created default configuration file at: {}", path.display());
                println!("Edit this file to customize settings, then run fission again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let loaded = match &args.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.apply_env() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }
    args.apply_overrides(&mut config);

    let verbosity = VerbosityLevel::from_verbose_count(args.verbose);
    if let Err(e) = logger::init_logging(verbosity, args.log_file_path()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_flag.is_cancelled() {
            eprintln!("\nSecond interrupt received. Exiting immediately.");
            std::process::exit(EXIT_INTERRUPTED);
        }
        handler_flag.cancel();
        eprintln!("\nInterrupt received. Finishing in-flight lookups and saving results...");
    })
    .unwrap_or_else(|e| {
        warn!("Failed to set Ctrl-C handler: {}. Interrupt signals may not be handled gracefully.", e);
    });

    let fission = match Fission::from_config(config, cancel.clone()) {
        Ok(fission) => fission,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let summary = match fission.run(args.skip_ip_to_domain, args.skip_domain_to_ip).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Run failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if cancel.is_cancelled() || !summary.is_complete() {
        warn!("Run interrupted by user; partial results were saved.");
        std::process::exit(EXIT_INTERRUPTED);
    }

    Ok(())
}
