//! Global tracing subscriber for the devstrip binary.
//!
//! Log lines go to stderr. stdout is reserved for command output such as the
//! rewritten descriptor printed by `devstrip strip`.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives, consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "DEVSTRIP_LOG";

/// `text` or `json`; the `--json` flag wins when set.
pub const LOG_FORMAT_ENV: &str = "DEVSTRIP_LOG_FORMAT";

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

impl LogFormat {
    /// `--json` forces JSON; otherwise the environment value decides, and an
    /// unreadable value falls back to text.
    pub fn resolve(json_flag: bool, env_value: Option<&str>) -> Self {
        if json_flag {
            return LogFormat::Json;
        }
        env_value
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

/// First non-blank directive among `DEVSTRIP_LOG`, `RUST_LOG` and `level`.
fn filter_directive(level: Level, devstrip_log: Option<String>, rust_log: Option<String>) -> String {
    devstrip_log
        .into_iter()
        .chain(rust_log)
        .find(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| level.as_str().to_ascii_lowercase())
}

fn env_filter(level: Level) -> EnvFilter {
    let directive = filter_directive(
        level,
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let format = LogFormat::resolve(json, std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let text_layer = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
