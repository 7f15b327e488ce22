// SPDX-License-Identifier: PMPL-1.0-or-later
//! Persistent roster store

pub mod models;
mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::gateway::{ChannelId, RoleId};
use models::Roster;

/// Abstract store trait for different database backends
///
/// All mutating operations persist synchronously before returning.
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Create a roster. Fails with `DuplicateRoster` when the channel
    /// already has one.
    async fn create(&self, roster: &Roster) -> Result<()>;

    /// Fetch the roster for a channel. Fails with `RosterNotFound`.
    async fn get(&self, channel: ChannelId) -> Result<Roster>;

    /// Delete a channel's roster. Fails with `RosterNotFound`.
    async fn delete(&self, channel: ChannelId) -> Result<()>;

    /// All rosters, oldest first.
    async fn list(&self) -> Result<Vec<Roster>>;

    /// Rosters tracking the given role, via the role reverse index.
    ///
    /// A role may be tracked by more than one roster; every match is
    /// returned.
    async fn find_by_role(&self, role: RoleId) -> Result<Vec<Roster>>;

    /// Persist a new description for a channel's roster.
    async fn set_description(&self, channel: ChannelId, description: &str) -> Result<()>;
}
