// SPDX-License-Identifier: PMPL-1.0-or-later
//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embed::role_label;
use crate::gateway::{ChannelId, GuildId, MessageId, RoleId, RoleRef};

/// A role tracked by a roster. The label is the embed field name derived
/// from the role's name at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRole {
    pub id: RoleId,
    pub label: String,
}

impl From<&RoleRef> for TrackedRole {
    fn from(role: &RoleRef) -> Self {
        Self {
            id: role.id,
            label: role_label(&role.name),
        }
    }
}

/// Roster record: one pinned message per channel plus the tracked roles,
/// in display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pub channel_id: ChannelId,
    pub guild_id: GuildId,
    pub message_id: MessageId,
    pub description: String,
    pub roles: Vec<TrackedRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Roster {
    pub fn new(
        channel_id: ChannelId,
        guild_id: GuildId,
        message_id: MessageId,
        description: String,
        roles: Vec<TrackedRole>,
    ) -> Self {
        let now = Utc::now();
        Self {
            channel_id,
            guild_id,
            message_id,
            description,
            roles,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this roster tracks the given role.
    pub fn tracks(&self, role: RoleId) -> bool {
        self.roles.iter().any(|r| r.id == role)
    }
}
