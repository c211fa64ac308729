//! Runtime settings, with environment overrides.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

/// Env var holding the command line used to launch yt-dlp
pub const TOOL_ENV: &str = "TUBEGRAB_YTDLP";
pub const INFO_TIMEOUT_ENV: &str = "TUBEGRAB_INFO_TIMEOUT_SECS";
pub const POLL_MS_ENV: &str = "TUBEGRAB_POLL_MS";
pub const OUTPUT_DIR_ENV: &str = "TUBEGRAB_OUTPUT_DIR";

const DEFAULT_TOOL: &str = "yt-dlp";
const DEFAULT_INFO_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_OUTPUT_DIR: &str = "~/Downloads";

/// Program plus leading arguments used to start the external tool.
///
/// Usually just `yt-dlp`, but `python3 -m yt_dlp` works too.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Splits a command line on whitespace; `None` if it is blank
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    /// Fresh command with the leading arguments already applied
    pub fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Human-readable command line for the log
    pub fn display_with(&self, args: &[String]) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .chain(args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ToolInvocation {
    fn default() -> Self {
        Self {
            program: DEFAULT_TOOL.to_owned(),
            args: Vec::new(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub tool: ToolInvocation,
    /// Wall-clock bound for `--dump-json` and `--version` runs
    pub info_timeout: Duration,
    /// How often the UI drains the event queue
    pub poll_interval: Duration,
    /// Initial value of the output directory field
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tool: ToolInvocation::default(),
            info_timeout: DEFAULT_INFO_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            output_dir: expand_dir(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(line) = lookup(TOOL_ENV) {
            match ToolInvocation::parse(&line) {
                Some(tool) => config.tool = tool,
                None => warn!("{TOOL_ENV} is blank, using {DEFAULT_TOOL}"),
            }
        }
        if let Some(secs) = parse_number::<u64>(&lookup, INFO_TIMEOUT_ENV) {
            config.info_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_number::<u64>(&lookup, POLL_MS_ENV) {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(dir) = lookup(OUTPUT_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.output_dir = expand_dir(dir.trim());
        }

        config
    }
}

fn parse_number<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a number");
            None
        }
    }
}

fn expand_dir(dir: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(dir).into_owned())
}
