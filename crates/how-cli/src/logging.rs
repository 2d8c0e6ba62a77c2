//! Logging configuration and initialization.
//!
//! Events go to stderr so command output on stdout stays pipeable. Presets are
//! picked from CLI flags, `--log target=level` refines them, and `RUST_LOG`
//! replaces both when set.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix added to `--log` targets that do not name a crate-qualified target.
const TARGET_PREFIX: &str = "how::";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Warnings from `how`, e.g. memory unavailable
    #[default]
    Production,
    /// Store lifecycle and config writes
    Verbose,
    /// Every query with its row count
    Debug,
    Trace,
    /// Errors only
    Quiet,
}

impl LogPreset {
    fn directives(self) -> &'static [&'static str] {
        match self {
            LogPreset::Production => &["how=warn"],
            LogPreset::Verbose => &["how=info"],
            LogPreset::Debug => &["how=debug"],
            LogPreset::Trace => &["how=trace"],
            LogPreset::Quiet => &["how=error"],
        }
    }
}

/// Logging configuration built from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides (e.g., "how::memory" -> DEBUG)
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    /// Quiet beats trace beats debug beats verbose.
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        // "memory=debug,config=info" or repeated flags
        let overrides = log_overrides
            .iter()
            .flat_map(|arg| arg.split(','))
            .filter_map(|part| {
                let (target, level) = part.split_once('=')?;
                let level = parse_level(level.trim())?;
                Some((qualify_target(target.trim()), level))
            })
            .collect();

        Self {
            preset,
            overrides,
            format,
        }
    }

    /// Build an EnvFilter from this configuration.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives()).unwrap_or_else(|_| EnvFilter::new("how=warn"))
    }

    /// Filter directives for the preset followed by the overrides.
    fn directives(&self) -> String {
        let mut directives: Vec<String> =
            self.preset.directives().iter().map(|d| d.to_string()).collect();

        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort();
        for (target, level) in overrides {
            directives.push(format!("{}={}", target, level.as_str().to_lowercase()));
        }
        directives.join(",")
    }
}

/// "memory" -> "how::memory"; "how" and "how::…" pass through.
fn qualify_target(target: &str) -> String {
    if target == "how" || target.starts_with(TARGET_PREFIX) {
        target.to_string()
    } else {
        format!("{}{}", TARGET_PREFIX, target)
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "warning" => Some(Level::WARN),
        other => other.parse().ok(),
    }
}

/// Initialize the tracing subscriber with the given configuration.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .without_time(),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_config_from_cli_preset_priority() {
        let preset = |v, d, t, q| LogConfig::from_cli(v, d, t, q, vec![], LogFormat::Text).preset;

        assert_eq!(preset(true, true, true, true), LogPreset::Quiet);
        assert_eq!(preset(true, true, true, false), LogPreset::Trace);
        assert_eq!(preset(true, true, false, false), LogPreset::Debug);
        assert_eq!(preset(true, false, false, false), LogPreset::Verbose);
        assert_eq!(preset(false, false, false, false), LogPreset::Production);
    }

    #[test]
    fn test_overrides_are_qualified() {
        let config = LogConfig::from_cli(
            false,
            false,
            false,
            false,
            vec!["memory=debug".into(), "how::config=Warning,how=info".into()],
            LogFormat::Text,
        );

        assert_eq!(config.overrides.get("how::memory"), Some(&Level::DEBUG));
        assert_eq!(config.overrides.get("how::config"), Some(&Level::WARN));
        assert_eq!(config.overrides.get("how"), Some(&Level::INFO));
    }

    #[test]
    fn test_malformed_overrides_are_skipped() {
        let config = LogConfig::from_cli(
            false,
            false,
            false,
            false,
            vec!["memory".into(), "config=loud".into()],
            LogFormat::Text,
        );
        assert!(config.overrides.is_empty());
    }

    #[test]
    fn test_directives_append_overrides_to_preset() {
        let config = LogConfig::from_cli(
            true,
            false,
            false,
            false,
            vec!["memory=trace".into()],
            LogFormat::Json,
        );
        assert_eq!(config.directives(), "how=info,how::memory=trace");
    }
}
