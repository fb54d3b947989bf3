//! Logging initialization for tilepack using `tracing` and `tracing-subscriber`.
//!
//! Configuration is static and controlled by:
//! - [`EnvFilter`]: log level filtering, usually from `RUST_LOG`
//! - [`LogFormat`]: output format, usually from `TILEPACK_FORMAT`

use std::str::FromStr;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

mod progress;
pub use progress::TileProgress;

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs.
    Full,

    /// A variant of the full format, optimized for short line lengths (default).
    Compact,

    /// Short lines without timestamps, targets or ANSI colors.
    Bare,

    /// Multi-line logs for local debugging.
    Pretty,

    /// Newline-delimited JSON logs.
    Json,
}

impl LogFormat {
    /// Installs the global subscriber for the selected format.
    pub fn init(self, env_filter: EnvFilter) {
        let dispatch = match self {
            LogFormat::Full => tracing_subscriber::fmt()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Compact => tracing_subscriber::fmt()
                .compact()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Bare => tracing_subscriber::fmt()
                .compact()
                .with_span_events(FmtSpan::NONE)
                .without_time()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .finish()
                .into(),
        };
        // `SubscriberInitExt::init()` would install its own `LogTracer`, clashing with `init_log_bridge`
        if let Err(e) = tracing::dispatcher::set_global_default(dispatch) {
            eprintln!("Warning: unable to set the global tracing subscriber: {e}");
        }
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "bare" => Ok(Self::Bare),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: json, full, compact, bare or pretty"
            )),
        }
    }
}

fn log_level_filter(env_filter: &EnvFilter) -> Option<log::LevelFilter> {
    let level = env_filter.max_level_hint().map(LevelFilter::into_level)??;
    Some(match level {
        Level::TRACE => log::LevelFilter::Trace,
        Level::DEBUG => log::LevelFilter::Debug,
        Level::INFO => log::LevelFilter::Info,
        Level::WARN => log::LevelFilter::Warn,
        Level::ERROR => log::LevelFilter::Error,
    })
}

/// Forwards `log` records (emitted by the `qgisweb` crate) into `tracing`.
///
/// Must be called once, before the subscriber is installed.
fn init_log_bridge(env_filter: &EnvFilter) {
    let mut log_builder = tracing_log::LogTracer::builder()
        .with_interest_cache(tracing_log::InterestCacheConfig::default());
    if let Some(max_level) = log_level_filter(env_filter) {
        log_builder = log_builder.with_max_level(max_level);
    }
    if let Err(e) = log_builder.init() {
        eprintln!("Warning: unable to forward log records to tracing: {e}");
    }
}

/// Initializes the global tracing subscriber.
///
/// An invalid `filter` falls back to `debug`, an invalid `format` to [`LogFormat::default`].
pub fn init_tracing(filter: &str, format: Option<String>) {
    let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid filter string '{filter}' passed, falling back to 'debug'");
        EnvFilter::new("debug")
    });

    let log_format = format
        .and_then(|s| {
            s.parse::<LogFormat>()
                .map_err(|e| {
                    eprintln!("Warning: {e}");
                    eprintln!(
                        "Falling back to default format ({:?})",
                        LogFormat::default()
                    );
                })
                .ok()
        })
        .unwrap_or_default();

    init_log_bridge(&env_filter);
    log_format.init(env_filter);
}

/// Mirrors the level given for `replacement` (e.g. `tilepack=`) onto `qgisweb=`,
/// unless the filter already configures `qgisweb` itself.
#[must_use]
pub fn ensure_qgisweb_log_level_matches(
    env_filter: Option<String>,
    replacement: &'static str,
) -> String {
    let Some(rust_log) = env_filter else {
        return format!("{replacement}info,qgisweb=info");
    };
    if rust_log.contains("qgisweb=") {
        return rust_log;
    }
    match rust_log
        .split(',')
        .find_map(|s| s.trim().strip_prefix(replacement))
    {
        Some(level) => format!("{rust_log},qgisweb={level}"),
        None => rust_log,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, "tilepack=info,qgisweb=info")]
    #[case(Some("tilepack=debug"), "tilepack=debug,qgisweb=debug")]
    #[case(Some("warn,tilepack=trace"), "warn,tilepack=trace,qgisweb=trace")]
    #[case(Some("tilepack=debug,qgisweb=warn"), "tilepack=debug,qgisweb=warn")]
    #[case(Some("info"), "info")]
    fn test_qgisweb_level(#[case] input: Option<&str>, #[case] expected: &str) {
        assert_eq!(
            ensure_qgisweb_log_level_matches(input.map(ToString::to_string), "tilepack="),
            expected
        );
    }

    #[rstest]
    #[case("json", Ok(LogFormat::Json))]
    #[case("JSONL", Ok(LogFormat::Json))]
    #[case("compact", Ok(LogFormat::Compact))]
    #[case("verbose", Ok(LogFormat::Pretty))]
    #[case("bare", Ok(LogFormat::Bare))]
    #[case("fancy", Err(()))]
    fn test_log_format(#[case] input: &str, #[case] expected: Result<LogFormat, ()>) {
        assert_eq!(input.parse::<LogFormat>().map_err(|_| ()), expected);
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(
            log_level_filter(&EnvFilter::new("warn")),
            Some(log::LevelFilter::Warn)
        );
        assert_eq!(
            log_level_filter(&EnvFilter::new("tilepack=debug")),
            Some(log::LevelFilter::Debug)
        );
    }
}
