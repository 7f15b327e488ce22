// SPDX-License-Identifier: PMPL-1.0-or-later
//! rosterbot - Role roster bot for chat platforms
//!
//! This crate keeps pinned "roster" embeds — one per channel, listing the
//! members currently holding each tracked role — synchronized as role
//! membership changes in real time.
//!
//! # Architecture
//!
//! ```text
//! Gateway relay → HTTP events → rosterbot → RosterStore (SQLite)
//!                                    ↘ SyncEngine → platform REST → embed edits
//! ```

pub mod api;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod gateway;
pub mod pagination;
pub mod sanitize;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::ChatGateway;
    pub use crate::store::RosterStore;
    pub use crate::sync::SyncEngine;
}
