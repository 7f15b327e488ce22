// SPDX-License-Identifier: PMPL-1.0-or-later
//! In-memory gateway for tests and offline dry runs
//!
//! Holds messages, pins, and guild members in process-local maps and
//! records interaction responses so callers can assert on them.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::{
    Channel, ChannelId, ChatGateway, Embed, GuildId, InteractionId, Member, Message, MessageId,
    User, UserId,
};
use crate::error::{Error, Result};

/// An interaction reply captured by [`MemoryGateway::respond_interaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub interaction: InteractionId,
    pub content: String,
    pub ephemeral: bool,
}

#[derive(Default)]
struct Inner {
    messages: HashMap<(ChannelId, MessageId), StoredMessage>,
    pinned: HashSet<(ChannelId, MessageId)>,
    members: HashMap<GuildId, Vec<Member>>,
    responses: Vec<RecordedResponse>,
}

struct StoredMessage {
    content: Option<String>,
    embed: Option<Embed>,
}

/// Gateway keeping all state in memory
#[derive(Default)]
pub struct MemoryGateway {
    inner: Mutex<Inner>,
    next_message_id: AtomicU64,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Seed the member list of a guild.
    pub async fn put_members(&self, guild: GuildId, members: Vec<(UserId, Vec<super::RoleId>)>) {
        let members = members
            .into_iter()
            .map(|(id, roles)| Member {
                user: User {
                    id,
                    username: None,
                },
                roles,
            })
            .collect();
        self.inner.lock().await.members.insert(guild, members);
    }

    /// Seed a message directly, bypassing `send_embed`.
    pub async fn put_message(&self, channel: ChannelId, message: MessageId, embed: Embed) {
        self.inner.lock().await.messages.insert(
            (channel, message),
            StoredMessage {
                content: None,
                embed: Some(embed),
            },
        );
    }

    /// Current embed of a message, if any.
    pub async fn embed_of(&self, channel: ChannelId, message: MessageId) -> Option<Embed> {
        self.inner
            .lock()
            .await
            .messages
            .get(&(channel, message))
            .and_then(|m| m.embed.clone())
    }

    /// Text content of a message, if any.
    pub async fn content_of(&self, channel: ChannelId, message: MessageId) -> Option<String> {
        self.inner
            .lock()
            .await
            .messages
            .get(&(channel, message))
            .and_then(|m| m.content.clone())
    }

    pub async fn is_pinned(&self, channel: ChannelId, message: MessageId) -> bool {
        self.inner.lock().await.pinned.contains(&(channel, message))
    }

    /// All interaction replies recorded so far.
    pub async fn responses(&self) -> Vec<RecordedResponse> {
        self.inner.lock().await.responses.clone()
    }

    fn allocate_id(&self) -> MessageId {
        MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl ChatGateway for MemoryGateway {
    async fn fetch_channel(&self, channel: ChannelId) -> Result<Channel> {
        Ok(Channel {
            id: channel,
            guild_id: None,
            name: None,
        })
    }

    async fn fetch_message(&self, channel: ChannelId, message: MessageId) -> Result<Message> {
        let inner = self.inner.lock().await;
        let stored = inner
            .messages
            .get(&(channel, message))
            .ok_or(Error::MessageNotFound(message))?;
        Ok(Message {
            id: message,
            channel_id: channel,
            embeds: stored.embed.clone().into_iter().collect(),
            pinned: inner.pinned.contains(&(channel, message)),
        })
    }

    async fn send_text(&self, channel: ChannelId, content: &str) -> Result<Message> {
        let id = self.allocate_id();
        self.inner.lock().await.messages.insert(
            (channel, id),
            StoredMessage {
                content: Some(content.to_string()),
                embed: None,
            },
        );
        Ok(Message {
            id,
            channel_id: channel,
            embeds: vec![],
            pinned: false,
        })
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<Message> {
        let id = self.allocate_id();
        self.inner.lock().await.messages.insert(
            (channel, id),
            StoredMessage {
                content: None,
                embed: Some(embed.clone()),
            },
        );
        Ok(Message {
            id,
            channel_id: channel,
            embeds: vec![embed.clone()],
            pinned: false,
        })
    }

    async fn send_paginated(&self, channel: ChannelId, embed: &Embed) -> Result<Message> {
        self.send_embed(channel, embed).await
    }

    async fn edit_embed(
        &self,
        channel: ChannelId,
        message: MessageId,
        embed: &Embed,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .messages
            .get_mut(&(channel, message))
            .ok_or(Error::MessageNotFound(message))?;
        stored.embed = Some(embed.clone());
        Ok(())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .messages
            .remove(&(channel, message))
            .ok_or(Error::MessageNotFound(message))?;
        inner.pinned.remove(&(channel, message));
        Ok(())
    }

    async fn pin_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.messages.contains_key(&(channel, message)) {
            return Err(Error::MessageNotFound(message));
        }
        inner.pinned.insert((channel, message));
        Ok(())
    }

    async fn unpin_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.messages.contains_key(&(channel, message)) {
            return Err(Error::MessageNotFound(message));
        }
        inner.pinned.remove(&(channel, message));
        Ok(())
    }

    async fn fetch_member(&self, guild: GuildId, user: UserId) -> Result<Member> {
        self.inner
            .lock()
            .await
            .members
            .get(&guild)
            .and_then(|members| members.iter().find(|m| m.user.id == user))
            .cloned()
            .ok_or_else(|| Error::Gateway(format!("member {} not found in guild {}", user, guild)))
    }

    async fn fetch_guild_members(&self, guild: GuildId) -> Result<Vec<Member>> {
        Ok(self
            .inner
            .lock()
            .await
            .members
            .get(&guild)
            .cloned()
            .unwrap_or_default())
    }

    async fn respond_interaction(
        &self,
        interaction: InteractionId,
        _token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        self.inner.lock().await.responses.push(RecordedResponse {
            interaction,
            content: content.to_string(),
            ephemeral,
        });
        Ok(())
    }

    async fn ack_component(&self, _interaction: InteractionId, _token: &str) -> Result<()> {
        Ok(())
    }
}
