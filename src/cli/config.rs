//! Client configuration file.
//!
//! Every field is optional; flags given on the command line win over the
//! file, the file wins over the built-in defaults.
//!
//! ```toml
//! server = "https://judge.example.org"
//! cookies = "session=...; csrf_token=..."
//! location = "/"
//! session_file = "simkit_session.json"
//!
//! [timeouts]
//! request_ms = 10000
//! abort_delay_ms = 1500
//!
//! [lister]
//! margin = 300
//!
//! [logs]
//! poll_interval_ms = 2000
//! colorize_window = 2000
//! fetch_margin = 300
//!
//! [session]
//! user_id = 3
//! user_type = "admin"
//!
//! [capabilities.jobs]
//! ui_view = false
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use crate::core::{KitConfig, Session};
use crate::protocol::api::Capabilities;

pub const DEFAULT_CONFIG_PATH: &str = "simkit.toml";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// 0 waits forever.
    pub request_ms: u64,
    pub abort_delay_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_ms: 0,
            abort_delay_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListerSection {
    pub margin: usize,
}

impl Default for ListerSection {
    fn default() -> Self {
        Self { margin: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsSection {
    pub poll_interval_ms: u64,
    pub colorize_window: usize,
    pub fetch_margin: usize,
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            colorize_window: 2000,
            fetch_margin: 300,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub user_id: Option<u64>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: String,
    pub cookies: String,
    /// Start location when there is no saved history.
    pub location: String,
    pub no_session_cache: bool,
    /// Where the navigation history is kept between runs.
    pub session_file: Option<PathBuf>,
    pub timeouts: Timeouts,
    pub lister: ListerSection,
    pub logs: LogsSection,
    pub session: SessionSection,
    pub capabilities: Capabilities,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            cookies: String::new(),
            location: "/".to_string(),
            no_session_cache: false,
            session_file: None,
            timeouts: Timeouts::default(),
            lister: ListerSection::default(),
            logs: LogsSection::default(),
            session: SessionSection::default(),
            capabilities: Capabilities::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No configuration at {path:?}, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {path:?}"))?;
        let config =
            Self::from_toml(&text).with_context(|| format!("Failed to load {path:?}"))?;
        log::info!("Loaded configuration from {path:?}");
        Ok(config)
    }

    /// Load the file named by `--config` and apply the other flags on top.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let path = matches
            .get_one::<String>("config")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_PATH);
        let mut config = Self::load(Path::new(path))?;
        config.apply_matches(matches);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_matches(&mut self, matches: &ArgMatches) {
        if let Some(server) = matches.get_one::<String>("server") {
            self.server = server.clone();
        }
        if let Some(cookies) = matches.get_one::<String>("cookie") {
            self.cookies = cookies.clone();
        }
        if let Some(timeout) = matches.get_one::<u64>("timeout-ms") {
            self.timeouts.request_ms = *timeout;
        }
        if let Some(location) = matches.get_one::<String>("location") {
            self.location = location.clone();
        }
        if matches.get_flag("no-session-cache") {
            self.no_session_cache = true;
        }
    }

    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server)
            .with_context(|| format!("Invalid server URL {:?}", self.server))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Server URL must be http or https, got {:?}", self.server);
        }
        if !self.location.starts_with('/') {
            bail!("Location must start with '/', got {:?}", self.location);
        }
        Ok(())
    }

    /// Server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.timeouts.request_ms > 0).then(|| Duration::from_millis(self.timeouts.request_ms))
    }

    pub fn to_kit_config(&self) -> KitConfig {
        KitConfig {
            cookies: self.cookies.clone(),
            request_timeout: self.request_timeout(),
            lister_margin: self.lister.margin,
            log_scroll_margin: self.logs.fetch_margin,
            log_poll_interval: Duration::from_millis(self.logs.poll_interval_ms),
            colorize_window: self.logs.colorize_window,
            abort_delay: Duration::from_millis(self.timeouts.abort_delay_ms),
            ..KitConfig::default()
        }
    }

    pub fn session(&self) -> Session {
        Session {
            user_id: self.session.user_id,
            user_type: self.session.user_type.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_command;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ClientConfig::from_toml("").unwrap();
        assert_eq!(config, ClientConfig::default());
        let kit = config.to_kit_config();
        assert_eq!(kit.lister_margin, 300);
        assert_eq!(kit.log_poll_interval, Duration::from_millis(2000));
        assert_eq!(kit.request_timeout, None);
    }

    #[test]
    fn sections_reach_the_kit() {
        let config = ClientConfig::from_toml(
            r#"
            server = "https://judge.example.org/"
            cookies = "csrf_token=abc"

            [timeouts]
            request_ms = 5000

            [logs]
            poll_interval_ms = 500

            [session]
            user_id = 3
            user_type = "teacher"

            [capabilities.jobs]
            ui_view = false

            [capabilities.problems.list_all]
            query_with_visibility_private = false
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://judge.example.org");

        let kit = config.to_kit_config();
        assert_eq!(kit.cookies, "csrf_token=abc");
        assert_eq!(kit.request_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(kit.log_poll_interval, Duration::from_millis(500));
        assert_eq!(kit.colorize_window, 2000);

        let session = config.session();
        assert!(session.is_staff());
        assert_eq!(session.user_id, Some(3));
        assert!(!session.capabilities.jobs.ui_view);
        assert!(session.capabilities.users.ui_view);
        assert!(!session
            .capabilities
            .problems
            .list_all
            .allows("query_with_visibility_private"));
        assert!(session
            .capabilities
            .problems
            .list_all
            .allows("query_with_visibility_public"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ClientConfig::from_toml(r#"server = "ftp://x""#).is_err());
        assert!(ClientConfig::from_toml(r#"location = "users""#).is_err());
        assert!(ClientConfig::from_toml("[lister]\nmargin = -1").is_err());
    }

    #[test]
    fn flags_override_the_file() {
        let mut config = ClientConfig::from_toml(
            "server = \"http://a.example\"\nlocation = \"/jobs\"\n",
        )
        .unwrap();
        let matches = build_command()
            .try_get_matches_from([
                "simkit",
                "--server",
                "http://b.example",
                "--timeout-ms",
                "100",
                "--no-session-cache",
            ])
            .unwrap();
        config.apply_matches(&matches);
        assert_eq!(config.server, "http://b.example");
        assert_eq!(config.location, "/jobs");
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(100)));
        assert!(config.no_session_cache);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let config = ClientConfig::load(Path::new("/nonexistent/simkit.toml")).unwrap();
        assert_eq!(config.server, DEFAULT_SERVER);
    }
}
