//! Tracing subscriber setup shared by the image processing binaries.
//!
//! Events go to the console, to a file, or both. Filtering follows the
//! `RUST_LOG` environment variable and defaults to `info`.

use std::path::{Path, PathBuf};

use time::{UtcOffset, format_description::well_known::Iso8601};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::OffsetTime},
    layer::SubscriberExt,
};

const DEFAULT_FILTER: &str = "info";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("local UTC offset: {0}")]
    Offset(#[from] time::error::ComponentRange),
    #[error("log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    SetGlobalDefault(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Keeps logging alive until dropped.
#[must_use = "logging ends when the guard is dropped"]
pub struct Guard {
    path: Option<PathBuf>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            tracing::debug!("Closing log file \"{}\".", path.display());
        }
    }
}

/// Log to the console.
///
/// If a global subscriber is already installed (e.g. by a test harness),
/// that one keeps receiving events.
pub fn init() -> impl Drop {
    match initiate_logging::<&str>(None, false) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging not initiated: {e}");
            Guard { path: None }
        }
    }
}

/// Timestamps in the local offset at the time of the call.
fn local_timer() -> Result<OffsetTime<Iso8601>, Error> {
    let offset = chrono::Local::now().offset().local_minus_utc();
    Ok(OffsetTime::new(
        UtcOffset::from_whole_seconds(offset)?,
        Iso8601::DEFAULT,
    ))
}

#[cfg(windows)]
fn console_supports_ansi() -> bool {
    ansi_term::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
fn console_supports_ansi() -> bool {
    true
}

/// Start logging to file and console, both optional.
pub fn initiate_logging<P: AsRef<Path>>(path: Option<P>, disable_console: bool) -> Result<Guard, Error> {
    let timer = local_timer()?;

    let file_layer = match &path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            Some(
                fmt::layer()
                    .with_timer(timer.clone())
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };

    let console_layer = (!disable_console).then(|| {
        fmt::layer()
            .with_timer(timer)
            .with_writer(std::io::stderr)
            .with_ansi(console_supports_ansi())
            .with_target(true)
    });

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter);
    tracing::subscriber::set_global_default(collector)?;

    let filter_source = match std::env::var("RUST_LOG") {
        Ok(var) => format!("RUST_LOG=\"{var}\""),
        Err(_) => format!("default filter \"{DEFAULT_FILTER}\""),
    };
    match &path {
        Some(path) => tracing::debug!(
            "Logging to \"{}\" with {filter_source}.",
            path.as_ref().display()
        ),
        None => tracing::debug!("Logging to console with {filter_source}."),
    }

    Ok(Guard {
        path: path.map(|p| p.as_ref().to_path_buf()),
    })
}
