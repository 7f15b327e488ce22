// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for rosterbot

use thiserror::Error;

use crate::gateway::{ChannelId, MessageId};

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rosterbot
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No roster exists for channel {0}")]
    RosterNotFound(ChannelId),

    #[error("A roster already exists for channel {0}")]
    DuplicateRoster(ChannelId),

    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Missing permission to {0}")]
    Forbidden(String),

    #[error("Rate limited by the platform (retry after {0:.1}s)")]
    RateLimited(f64),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Synchronization failed: {0}")]
    Sync(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// One-line reply text for user-visible failures at the command boundary.
    pub fn user_message(&self) -> String {
        match self {
            Error::RosterNotFound(_) => "That roster does not exist.".to_string(),
            Error::DuplicateRoster(channel) => {
                format!("A roster already exists for <#{}>.", channel)
            }
            Error::ChannelNotFound(_) => "That channel no longer exists.".to_string(),
            Error::MessageNotFound(_) => "Invalid message ID provided.".to_string(),
            Error::Forbidden(action) => {
                format!("The bot does not have permission to {}.", action)
            }
            Error::RateLimited(_) => {
                "The platform is rate limiting the bot; try again shortly.".to_string()
            }
            Error::InvalidInput(msg) => msg.clone(),
            _ => "Something went wrong while handling the command.".to_string(),
        }
    }
}
