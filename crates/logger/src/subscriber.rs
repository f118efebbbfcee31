use std::env::var;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer, Registry, filter::EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Level used until the configuration file has been read.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::WARN;

/// Handle to the installed subscriber, used to change the level once the
/// configured one is known.
#[derive(Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Switch the default directive to `level` ("trace" .. "error").
    ///
    /// Unknown names keep the current filter. `RUST_LOG` still wins over the
    /// default directive.
    pub fn set_level(&self, level: &str) {
        let Ok(level) = LevelFilter::from_str(level) else {
            warn!("Unknown log level {level:?}, keeping current level");
            return;
        };

        if let Err(error) = self.filter.reload(env_filter(level)) {
            warn!("Failed to change log level: {error}");
        }
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr unless `log_file` is given, in which case they are
/// appended to that file. `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> io::Result<LogHandle> {
    let (filter, handle) = reload::Layer::new(env_filter(level));

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match (log_format.as_str(), log_file) {
        ("json", Some(path)) => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(Mutex::new(open_log_file(path)?))
            .with_filter(filter)
            .boxed(),
        ("json", None) => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        (_, Some(path)) => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(open_log_file(path)?))
            .with_filter(filter)
            .boxed(),
        (_, None) => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();

    Ok(LogHandle { filter: handle })
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
