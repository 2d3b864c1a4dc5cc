//! Check configuration
//!
//! A [`CheckConfig`] gathers everything that shapes one reachability check
//! apart from the program itself: the target label, the input model and the
//! exploration budget. It can be built in code, deserialized with serde, or
//! read from a line-based directive file:
//!
//! ```text
//! \* five reads, then reads block
//! LABEL end
//! MAX_READS 5
//! NO_CHANGE_ON_EOF TRUE
//! MAX_STATES 1000000
//! TIME_LIMIT 30
//! ```
//!
//! One directive per line; `\*` starts a comment that runs to the end of the
//! line and `(* … *)` comments may appear inline. All problems are collected
//! and reported together, each with its 1-based line number.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use braincheck_core::IoModel;
use serde::{Deserialize, Serialize};

use crate::explore::ExploreConfig;
use crate::search::SearchLimits;

/// Progress is logged after this many expansions unless configured otherwise
pub const DEFAULT_PROGRESS_INTERVAL: usize = 100_000;

/// Settings for one reachability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Label whose reachability is checked
    pub label: Option<String>,
    pub io: IoModel,
    /// Stop with an incomplete result after this many distinct states
    pub max_states: Option<usize>,
    /// Stop with an incomplete result after this much time
    pub time_limit: Option<Duration>,
    /// Expansions between progress log lines (0 disables)
    pub progress_interval: usize,
    /// Worker threads for graph exploration
    pub graph_workers: Option<usize>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        CheckConfig {
            label: None,
            io: IoModel::default(),
            max_states: None,
            time_limit: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            graph_workers: None,
        }
    }
}

/// A problem found while parsing a directive file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl CheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::default()
    }

    /// Parse a directive file. Unset directives keep their defaults.
    pub fn parse(input: &str) -> Result<CheckConfig, Vec<ConfigError>> {
        let mut config = CheckConfig::default();
        let mut errors = Vec::new();

        for (line_num, raw_line) in input.lines().enumerate() {
            let line_num = line_num + 1;

            let without_comment = match raw_line.find("\\*") {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let stripped = strip_block_comments(without_comment);
            let line = stripped.trim();
            if line.is_empty() {
                continue;
            }

            let mut words = line.split_whitespace();
            let Some(directive) = words.next() else {
                continue;
            };
            let args: Vec<&str> = words.collect();

            let mut error = |message: String| {
                errors.push(ConfigError {
                    line: line_num,
                    message,
                })
            };

            match directive {
                "LABEL" => match args.as_slice() {
                    [name] => config.label = Some((*name).to_string()),
                    _ => error("LABEL requires exactly one label name".to_string()),
                },
                "MAX_READS" => match parse_single::<usize>(directive, &args) {
                    Ok(n) => config.io.max_reads = Some(n),
                    Err(msg) => error(msg),
                },
                "EOF_BYTE" => match parse_single::<u8>(directive, &args) {
                    Ok(b) => config.io.eof_byte = b,
                    Err(msg) => error(msg),
                },
                "NO_CHANGE_ON_EOF" => match args.as_slice() {
                    [] => config.io.no_change_on_eof = true,
                    [value] => match parse_bool(value) {
                        Some(b) => config.io.no_change_on_eof = b,
                        None => error(format!(
                            "NO_CHANGE_ON_EOF expects TRUE or FALSE, got '{}'",
                            value
                        )),
                    },
                    _ => error("NO_CHANGE_ON_EOF takes at most one value".to_string()),
                },
                "MAX_STATES" => match parse_single::<usize>(directive, &args) {
                    Ok(n) => config.max_states = Some(n),
                    Err(msg) => error(msg),
                },
                "TIME_LIMIT" => match parse_single::<u64>(directive, &args) {
                    Ok(secs) => config.time_limit = Some(Duration::from_secs(secs)),
                    Err(msg) => error(msg),
                },
                "PROGRESS_INTERVAL" => match parse_single::<usize>(directive, &args) {
                    Ok(n) => config.progress_interval = n,
                    Err(msg) => error(msg),
                },
                "WORKERS" => match parse_single::<usize>(directive, &args) {
                    Ok(0) => error("WORKERS must be at least 1".to_string()),
                    Ok(n) => config.graph_workers = Some(n),
                    Err(msg) => error(msg),
                },
                other => error(format!("unknown directive '{}'", other)),
            }
        }

        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Limits for the lasso search, sharing `cancel` if given
    pub fn search_limits(&self, cancel: Option<Arc<AtomicBool>>) -> SearchLimits {
        SearchLimits {
            max_states: self.max_states,
            time_limit: self.time_limit,
            cancel,
        }
    }

    pub fn explore_config(&self) -> ExploreConfig {
        ExploreConfig {
            max_states: self.max_states,
            workers: self.graph_workers,
        }
    }
}

fn parse_single<T: std::str::FromStr>(directive: &str, args: &[&str]) -> Result<T, String> {
    match args {
        [value] => value
            .parse::<T>()
            .map_err(|_| format!("{} has an invalid value '{}'", directive, value)),
        _ => Err(format!("{} requires exactly one value", directive)),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_uppercase().as_str() {
        "TRUE" | "ON" | "YES" => Some(true),
        "FALSE" | "OFF" | "NO" => Some(false),
        _ => None,
    }
}

/// Remove `(* … *)` comments contained in one line
fn strip_block_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find("(*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*)") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Builder for [`CheckConfig`]
#[derive(Debug, Clone, Default)]
pub struct CheckConfigBuilder {
    config: CheckConfig,
}

impl CheckConfigBuilder {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    pub fn io(mut self, io: IoModel) -> Self {
        self.config.io = io;
        self
    }

    pub fn max_reads(mut self, max_reads: usize) -> Self {
        self.config.io.max_reads = Some(max_reads);
        self
    }

    pub fn eof_byte(mut self, eof_byte: u8) -> Self {
        self.config.io.eof_byte = eof_byte;
        self
    }

    pub fn no_change_on_eof(mut self, no_change: bool) -> Self {
        self.config.io.no_change_on_eof = no_change;
        self
    }

    pub fn max_states(mut self, max_states: usize) -> Self {
        self.config.max_states = Some(max_states);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.config.time_limit = Some(limit);
        self
    }

    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn graph_workers(mut self, workers: usize) -> Self {
        self.config.graph_workers = Some(workers);
        self
    }

    pub fn build(self) -> CheckConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let input = r#"
\* reads block once input is exhausted
LABEL end
MAX_READS 5
EOF_BYTE 255
NO_CHANGE_ON_EOF TRUE
MAX_STATES 1000
TIME_LIMIT 30
PROGRESS_INTERVAL 0
WORKERS 2
"#;
        let config = CheckConfig::parse(input).unwrap();
        assert_eq!(config.label.as_deref(), Some("end"));
        assert_eq!(config.io.max_reads, Some(5));
        assert_eq!(config.io.eof_byte, 255);
        assert!(config.io.no_change_on_eof);
        assert_eq!(config.max_states, Some(1000));
        assert_eq!(config.time_limit, Some(Duration::from_secs(30)));
        assert_eq!(config.progress_interval, 0);
        assert_eq!(config.graph_workers, Some(2));
    }

    #[test]
    fn test_defaults() {
        let config = CheckConfig::parse("").unwrap();
        assert_eq!(config, CheckConfig::default());
        assert_eq!(config.io, IoModel::unbounded());
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "LABEL done \\* the exit\n(* budget *) MAX_READS 2 (* reads *)\n";
        let config = CheckConfig::parse(input).unwrap();
        assert_eq!(config.label.as_deref(), Some("done"));
        assert_eq!(config.io.max_reads, Some(2));
    }

    #[test]
    fn test_bare_no_change_on_eof() {
        let config = CheckConfig::parse("NO_CHANGE_ON_EOF").unwrap();
        assert!(config.io.no_change_on_eof);
        let config = CheckConfig::parse("NO_CHANGE_ON_EOF false").unwrap();
        assert!(!config.io.no_change_on_eof);
    }

    #[test]
    fn test_errors_collected_with_lines() {
        let input = "LABEL\nMAX_READS lots\nEOF_BYTE 300\nFROBNICATE\nWORKERS 0\n";
        let errors = CheckConfig::parse(input).unwrap_err();
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 2, 3, 4, 5]);
        assert_eq!(errors[3].to_string(), "line 4: unknown directive 'FROBNICATE'");
        assert_eq!(
            errors[1].message,
            "MAX_READS has an invalid value 'lots'"
        );
    }

    #[test]
    fn test_builder() {
        let config = CheckConfig::builder()
            .label("end")
            .max_reads(5)
            .no_change_on_eof(true)
            .max_states(10)
            .time_limit(Duration::from_millis(500))
            .graph_workers(3)
            .build();
        assert_eq!(config.io, IoModel::with_max_reads(5).no_change_on_eof(true));
        assert_eq!(config.max_states, Some(10));
        assert_eq!(config.explore_config().workers, Some(3));

        let limits = config.search_limits(None);
        assert_eq!(limits.max_states, Some(10));
        assert_eq!(limits.time_limit, Some(Duration::from_millis(500)));
        assert!(limits.cancel.is_none());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = CheckConfig::builder().label("x").max_reads(1).build();
        let json = serde_json::to_string(&config).unwrap();
        let back: CheckConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);

        // missing fields fall back to defaults
        let partial: CheckConfig = serde_json::from_str(r#"{"label":"y"}"#).unwrap();
        assert_eq!(partial.label.as_deref(), Some("y"));
        assert_eq!(partial.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_strip_block_comments() {
        assert_eq!(strip_block_comments("a (* b *) c"), "a  c");
        assert_eq!(strip_block_comments("a (* open"), "a ");
    }
}
