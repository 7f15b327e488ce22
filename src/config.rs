// SPDX-License-Identifier: PMPL-1.0-or-later
//! Configuration management for rosterbot

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Chat platform REST API connection
    #[serde(default)]
    pub chat: ChatConfig,

    /// Roster behavior
    #[serde(default)]
    pub roster: RosterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://rosterbot.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// REST API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bot token used for the Authorization header
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Shared secret for verifying relayed gateway events
    #[serde(default)]
    pub relay_secret: Option<String>,

    /// Timeout for REST calls (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            bot_token: None,
            relay_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RosterConfig {
    /// Description placed at the top of every roster embed
    #[serde(default = "default_description")]
    pub description_template: String,

    /// Entries per page in paginated listings
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Inactivity timeout for interactive listing sessions (seconds)
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,

    /// Allow users other than the requester to drive page navigation
    #[serde(default)]
    pub anyone_can_navigate: bool,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            description_template: default_description(),
            page_size: default_page_size(),
            session_timeout_secs: default_session_timeout(),
            anyone_can_navigate: false,
        }
    }
}

fn default_description() -> String {
    "Subject helpers are members who volunteer their time and expertise to \
     help fellow members with certain subjects. You can contact them by \
     tagging the respective helper role."
        .to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_session_timeout() -> u64 {
    180
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("ROSTERBOT").separator("__"));

        let config = builder.build()?;
        let parsed: Config = config.try_deserialize()?;
        parsed.validate()?;

        Ok(parsed)
    }

    fn validate(&self) -> Result<()> {
        if self.roster.page_size == 0 {
            return Err(crate::error::Error::Config(
                "roster.page_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
