use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Summary = 1,   // Phase progress and counts (default)
    Detailed = 2,  // Per-item outcomes, warnings
    Debug = 3,     // Every request and lookup
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Summary => "fission=info,warn",
            VerbosityLevel::Detailed => "fission=debug,warn",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// Install the global subscriber: stderr plus an optional append-only log file.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
pub fn init_logging(verbosity: VerbosityLevel, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", path.display(), e))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}
