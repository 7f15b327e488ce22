// SPDX-License-Identifier: PMPL-1.0-or-later
//! Chat platform gateway: identifier types, wire types, and the REST trait

pub mod discord;
pub mod memory;

pub use discord::DiscordGateway;
pub use memory::MemoryGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Result;

/// String-encoded 64-bit snowflake, the platform's wire format for ids.
pub mod snowflake {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        // The platform serializes ids as strings; relays occasionally send
        // bare integers, so both are accepted.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
        }
    }
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(#[serde(with = "snowflake")] pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

id_type!(
    /// Channel identifier
    ChannelId
);
id_type!(
    /// Message identifier
    MessageId
);
id_type!(
    /// Guild (server) identifier
    GuildId
);
id_type!(
    /// Role identifier
    RoleId
);
id_type!(
    /// User identifier
    UserId
);
id_type!(
    /// Interaction identifier
    InteractionId
);

impl UserId {
    /// Canonical in-message mention for this user.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl ChannelId {
    /// Canonical in-message mention for this channel.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

/// A role reference as carried by relayed events: id plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

/// One (name, value) pair inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Rendered embed content: description plus ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

/// Message as returned by the REST API. Only the parts the bot reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub pinned: bool,
}

/// Channel as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Guild member: user plus held role ids.
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

/// User as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: Option<String>,
}

/// Chat platform REST surface consumed by the bot.
///
/// Calls may fail with `ChannelNotFound` / `MessageNotFound`, `Forbidden`,
/// or `RateLimited` in addition to transport errors.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn fetch_channel(&self, channel: ChannelId) -> Result<Channel>;

    async fn fetch_message(&self, channel: ChannelId, message: MessageId) -> Result<Message>;

    /// Send a plain text message, returning the created message.
    async fn send_text(&self, channel: ChannelId, content: &str) -> Result<Message>;

    /// Send an embed message, returning the created message.
    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<Message>;

    /// Send an embed with page-navigation controls attached, returning the
    /// created message.
    async fn send_paginated(&self, channel: ChannelId, embed: &Embed) -> Result<Message>;

    /// Replace the embed of an existing message.
    async fn edit_embed(&self, channel: ChannelId, message: MessageId, embed: &Embed)
        -> Result<()>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    async fn pin_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    async fn unpin_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;

    async fn fetch_member(&self, guild: GuildId, user: UserId) -> Result<Member>;

    /// List all members of a guild (paged through internally).
    async fn fetch_guild_members(&self, guild: GuildId) -> Result<Vec<Member>>;

    /// Reply to an interaction, optionally visible only to the invoker.
    async fn respond_interaction(
        &self,
        interaction: InteractionId,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()>;

    /// Acknowledge a component interaction without sending a reply, so the
    /// platform does not mark it failed while the message edit happens
    /// over REST.
    async fn ack_component(&self, interaction: InteractionId, token: &str) -> Result<()>;
}

/// Canonical link to a message, used in listings.
pub fn message_link(guild: GuildId, channel: ChannelId, message: MessageId) -> String {
    format!("https://discord.com/channels/{}/{}/{}", guild, channel, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflakes_roundtrip_as_strings() {
        let id = ChannelId(123456789012345678);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"123456789012345678\"");
        let back: ChannelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn snowflakes_accept_bare_integers() {
        let id: RoleId = serde_json::from_str("42").unwrap();
        assert_eq!(id, RoleId(42));
    }

    #[test]
    fn mentions_use_platform_syntax() {
        assert_eq!(UserId(7).mention(), "<@7>");
        assert_eq!(ChannelId(8).mention(), "<#8>");
    }
}
