//! Daemon configuration from environment variables
//!
//! | Variable | Default |
//! |---|---|
//! | `CADENCE_NAME` | `cadence` |
//! | `CADENCE_INTERVAL` | `60s` (`once`, `immediate`, `250ms`, `10s`, `5m`, `1h`) |
//! | `CADENCE_COMMAND` | required, JSON array `["program", "arg", ...]` |
//! | `CADENCE_WORKING_DIR` | `.` |
//! | `CADENCE_ENV_ALLOWLIST` | `PATH,HOME,USER` |
//! | `CADENCE_COMMAND_TIMEOUT_MS` | unset (no limit) |
//! | `CADENCE_CANCEL_GRACE_MS` | `5000` |
//! | `CADENCE_LOG_FORMAT` | `pretty` (`json` for production) |
//! | `CADENCE_LOG_DIR` | unset (stdout only) |

use anyhow::{anyhow, Context, Result};
use cadence_core::Schedule;
use cadence_infra_system::CommandSpec;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NAME: &str = "cadence";
pub const DEFAULT_INTERVAL: &str = "60s";
pub const DEFAULT_CANCEL_GRACE_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub name: String,
    pub schedule: Schedule,
    pub command: CommandSpec,
    pub cancel_grace: Duration,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup (the process environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let name = get("CADENCE_NAME").unwrap_or_else(|| DEFAULT_NAME.to_string());

        let schedule: Schedule = get("CADENCE_INTERVAL")
            .as_deref()
            .unwrap_or(DEFAULT_INTERVAL)
            .parse()?;

        let raw_command = get("CADENCE_COMMAND")
            .ok_or_else(|| anyhow!("CADENCE_COMMAND is required (JSON array, e.g. [\"echo\", \"tick\"])"))?;
        let argv: Vec<String> = serde_json::from_str(&raw_command)
            .with_context(|| format!("CADENCE_COMMAND is not a JSON array of strings: {}", raw_command))?;
        let mut command = CommandSpec::from_argv(argv)
            .ok_or_else(|| anyhow!("CADENCE_COMMAND must name a program"))?;

        if let Some(dir) = get("CADENCE_WORKING_DIR") {
            command.working_dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        }
        if let Some(allowlist) = get("CADENCE_ENV_ALLOWLIST") {
            command.env_allowlist = allowlist
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(timeout) = get("CADENCE_COMMAND_TIMEOUT_MS") {
            command.timeout_ms = Some(parse_millis("CADENCE_COMMAND_TIMEOUT_MS", &timeout)?);
        }

        let cancel_grace = match get("CADENCE_CANCEL_GRACE_MS") {
            Some(value) => parse_millis("CADENCE_CANCEL_GRACE_MS", &value)?,
            None => DEFAULT_CANCEL_GRACE_MS,
        };

        let log_format = match get("CADENCE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let log_dir = get("CADENCE_LOG_DIR").map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()));

        Ok(Self {
            name,
            schedule,
            command,
            cancel_grace: Duration::from_millis(cancel_grace),
            log_format,
            log_dir,
        })
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number of milliseconds, got '{}'", key, value))
}
