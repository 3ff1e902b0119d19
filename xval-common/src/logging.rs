//! Tracing subscriber bootstrap shared by XVAL binaries

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Subscriber used while the configuration is still being resolved
///
/// `RUST_LOG` applies when set, otherwise INFO and above.
pub fn bootstrap_subscriber<W>(writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish()
}

/// Run `f` with a stderr bootstrap subscriber installed for the current thread
///
/// Config resolution warns about missing files before `init_tracing` can
/// run; this keeps those events visible.
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), f)
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` overrides the configured level when set. When a log file is
/// configured, output is appended to it without ANSI colors.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    result.map_err(|e| Error::Internal(format!("Tracing init failed: {}", e)))
}
