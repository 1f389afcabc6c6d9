//! Command-line arguments
//!
//! Every setting here overrides the matching configuration file value.

use super::validation::{parse_step, validate_positive_millis, StepSpec};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "finalizer")]
#[command(about = "Shutdown drill: register cleanup steps and drain them on exit or alarm")]
#[command(version)]
#[command(after_help = "SIGINT/SIGTERM drain the exit finalizers, SIGALRM drains the alarm finalizers")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Per-item timeout for exit finalizers
    #[arg(short = 't', long = "timeout", value_name = "MS", value_parser = validate_positive_millis)]
    pub timeout_ms: Option<u64>,

    /// Drain exit finalizers in parallel
    #[arg(short = 'p', long = "parallel", action = ArgAction::SetTrue)]
    pub parallel: bool,

    /// Per-item timeout for alarm finalizers
    #[arg(long = "alarm-timeout", value_name = "MS", value_parser = validate_positive_millis)]
    pub alarm_timeout_ms: Option<u64>,

    /// Drain alarm finalizers in parallel
    #[arg(long = "alarm-parallel", action = ArgAction::SetTrue)]
    pub alarm_parallel: bool,

    /// Exit cleanup step that sleeps for MS (repeatable)
    #[arg(short = 's', long = "step", value_name = "NAME:MS", value_parser = parse_step, action = ArgAction::Append)]
    pub steps: Vec<StepSpec>,

    /// Alarm cleanup step that sleeps for MS (repeatable)
    #[arg(long = "alarm-step", value_name = "NAME:MS", value_parser = parse_step, action = ArgAction::Append)]
    pub alarm_steps: Vec<StepSpec>,

    /// Background worker that needs MS to stop once asked (repeatable)
    #[arg(short = 'w', long = "worker", value_name = "NAME:MS", value_parser = parse_step, action = ArgAction::Append)]
    pub workers: Vec<StepSpec>,

    /// Drain exit finalizers immediately instead of waiting for a signal
    #[arg(long = "run-once", action = ArgAction::SetTrue)]
    pub run_once: bool,

    /// Force colored output
    #[arg(long = "color", action = ArgAction::SetTrue, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color", action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,
}

impl Args {
    /// Resolve `--color` / `--no-color` against a configured default
    pub fn color_choice(&self, configured: Option<bool>) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            configured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["finalizer"]);
        assert!(args.config_file.is_none());
        assert!(args.timeout_ms.is_none());
        assert!(!args.parallel);
        assert!(!args.run_once);
        assert!(args.steps.is_empty());
        assert!(args.workers.is_empty());
    }

    #[test]
    fn test_repeatable_steps_and_workers() {
        let args = parse(&[
            "finalizer",
            "--step",
            "flush:200",
            "-s",
            "close:50",
            "--worker",
            "poller:100",
            "--alarm-step",
            "rotate:10",
        ]);

        assert_eq!(args.steps.len(), 2);
        assert_eq!(args.steps[1].name, "close");
        assert_eq!(args.workers[0].duration, Duration::from_millis(100));
        assert_eq!(args.alarm_steps[0].name, "rotate");
    }

    #[test]
    fn test_timeouts_must_be_positive() {
        assert!(Args::try_parse_from(["finalizer", "--timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["finalizer", "--alarm-timeout", "x"]).is_err());

        let args = parse(&["finalizer", "-t", "750", "--alarm-timeout", "100"]);
        assert_eq!(args.timeout_ms, Some(750));
        assert_eq!(args.alarm_timeout_ms, Some(100));
    }

    #[test]
    fn test_color_choice() {
        assert_eq!(parse(&["finalizer"]).color_choice(None), None);
        assert_eq!(parse(&["finalizer"]).color_choice(Some(false)), Some(false));
        assert_eq!(
            parse(&["finalizer", "--color"]).color_choice(Some(false)),
            Some(true)
        );
        assert_eq!(
            parse(&["finalizer", "--no-color"]).color_choice(Some(true)),
            Some(false)
        );
        assert!(Args::try_parse_from(["finalizer", "--color", "--no-color"]).is_err());
    }

    #[test]
    fn test_log_format_values_restricted() {
        assert!(Args::try_parse_from(["finalizer", "--log-format", "xml"]).is_err());
        assert_eq!(
            parse(&["finalizer", "-o", "json"]).log_format.as_deref(),
            Some("json")
        );
    }
}
