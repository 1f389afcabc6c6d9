//! Logging backend
//!
//! All modules log through the `log` facade; this module installs the
//! flexi_logger backend once per process and owns its output formats:
//!
//! - `text`: `2026-01-01 12:00:00.000 WRN message`
//! - `ext`:  `text` plus `(finalizer/engine.rs:42)`
//! - `json`: one compact object per line
//!
//! Records always reach stderr; a configured log file receives a copy.
//! Colors only change the level tag and dim the timestamp/location.

use crate::core::sync::lock_ignoring_poison;
use flexi_logger::{DeferredNow, Duplicate, FileSpec, Logger, LoggerHandle};
use std::sync::{Mutex, OnceLock};

static LOGGER_HANDLE: OnceLock<Mutex<LoggerHandle>> = OnceLock::new();

/// Output format selected with `--log-format` / `[log] format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Ext,
    Json,
}

impl LogFormat {
    /// Unknown names fall back to `text`
    pub fn parse(name: Option<&str>) -> Self {
        match name {
            Some("ext") => LogFormat::Ext,
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let level_str = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level_str)?;

    logger = match (LogFormat::parse(log_format), color_enabled) {
        (LogFormat::Json, _) => logger.format(json_format),
        (LogFormat::Ext, true) => logger.format(extended_color_format),
        (LogFormat::Ext, false) => logger.format(extended_format),
        (LogFormat::Text, true) => logger.format(simple_color_format),
        (LogFormat::Text, false) => logger.format(simple_format),
    };

    if let Some(file_path) = log_file.filter(|path| *path != "none") {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger
            .log_to_file(file_spec)
            .duplicate_to_stderr(Duplicate::All);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));

    Ok(())
}

/// Change the active level at run time
///
/// Only the level can change once logging is running; format, file and color
/// are fixed by [`init_logging`].
pub fn reconfigure_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle_mutex = LOGGER_HANDLE
        .get()
        .ok_or("Logger handle not initialised. Call init_logging first.")?;
    let mut handle = lock_ignoring_poison(handle_mutex);
    handle.parse_and_push_temp_spec(log_level)?;
    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    use colored::Colorize;

    let abbr = level_abbr(level);
    match level {
        log::Level::Error => abbr.red().bold(),
        log::Level::Warn => abbr.magenta(),
        log::Level::Info => abbr.green(),
        log::Level::Debug => abbr.blue(),
        log::Level::Trace => abbr.cyan(),
    }
}

fn timestamp(now: &mut DeferredNow) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {}",
        timestamp(now),
        level_abbr(record.level()),
        record.args()
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {}",
        timestamp(now).dimmed(),
        level_colored(record.level()),
        record.args()
    )
}

fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        timestamp(now),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::Colorize;

    write!(
        w,
        "{} {} {} ({})",
        timestamp(now).dimmed(),
        level_colored(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let json_obj = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line()),
    });

    match serde_json::to_string(&json_obj) {
        Ok(json_string) => w.write_all(json_string.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

/// `finalizer::finalizer::engine` + line 42 -> `finalizer/engine.rs:42`
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = match target.strip_prefix("finalizer::") {
        Some(module_path) => module_path.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };

    match line {
        Some(line_num) => format!("{}:{}", path_like, line_num),
        None => path_like,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(
        format: fn(&mut dyn std::io::Write, &mut DeferredNow, &log::Record) -> std::io::Result<()>,
        level: log::Level,
        target: &str,
    ) -> String {
        let mut buffer = Vec::new();
        let mut now = DeferredNow::new();
        format(
            &mut buffer,
            &mut now,
            &log::Record::builder()
                .level(level)
                .target(target)
                .line(Some(42))
                .args(format_args!("finalizer timeout 5s (added at main.rs:10)"))
                .build(),
        )
        .expect("format should succeed");
        String::from_utf8(buffer).expect("Output should be valid UTF-8")
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
        assert_eq!(LogFormat::parse(Some("text")), LogFormat::Text);
        assert_eq!(LogFormat::parse(Some("ext")), LogFormat::Ext);
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("bogus")), LogFormat::Text);
    }

    #[test]
    fn test_simple_format_has_level_and_message() {
        let output = render(simple_format, log::Level::Warn, "finalizer::finalizer::engine");

        assert!(
            output.contains("WRN finalizer timeout 5s (added at main.rs:10)"),
            "got: {}",
            output
        );
        assert!(!output.contains("engine.rs"));
    }

    #[test]
    fn test_extended_format_appends_location() {
        let output = render(extended_format, log::Level::Info, "finalizer::lifecycle");

        assert!(output.contains("INF "), "got: {}", output);
        assert!(output.ends_with("(lifecycle.rs:42)"), "got: {}", output);
    }

    #[test]
    fn test_json_format_is_single_object() {
        let output = render(json_format, log::Level::Error, "finalizer::finalizer::engine");

        let value: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(value["level"], "ERR");
        assert_eq!(value["target"], "finalizer/engine.rs:42");
        assert!(value["message"]
            .as_str()
            .unwrap()
            .contains("finalizer timeout"));
        assert!(!output.contains('\n'));
    }

    #[test]
    fn test_format_target_as_path() {
        assert_eq!(
            format_target_as_path("finalizer::finalizer::rendezvous", Some(7)),
            "finalizer/rendezvous.rs:7"
        );
        assert_eq!(format_target_as_path("tokio::runtime", None), "tokio/runtime");
    }

    #[test]
    fn test_reconfigure_requires_init_or_succeeds() {
        // Other tests in the binary may have installed the logger already
        match reconfigure_logging("debug") {
            Ok(()) => assert!(LOGGER_HANDLE.get().is_some()),
            Err(e) => assert!(e.to_string().contains("not initialised")),
        }
    }
}
