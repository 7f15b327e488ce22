// SPDX-License-Identifier: PMPL-1.0-or-later
//! Unified invocation context for commands
//!
//! Commands can arrive as plain text messages or as interactions. Both
//! caller shapes sit behind one trait so handlers never branch on the
//! surface they were invoked from.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::gateway::{ChannelId, ChatGateway, Embed, GuildId, InteractionId, MessageId, UserId};

/// What a command handler may know and do about its invocation.
#[async_trait]
pub trait CommandContext: Send + Sync {
    fn author(&self) -> UserId;

    fn channel(&self) -> ChannelId;

    fn guild(&self) -> GuildId;

    /// Reply visibly in the invoking channel.
    async fn reply(&self, text: &str) -> Result<()>;

    /// Reply visible only to the invoker, where the surface supports it.
    async fn reply_ephemeral(&self, text: &str) -> Result<()>;

    /// Reply with a paginated embed carrying navigation controls,
    /// returning the reply's message id so callers can attach the viewer
    /// session to it.
    async fn reply_pages(&self, embed: &Embed) -> Result<MessageId>;
}

/// Context for plain text commands. Ephemeral replies degrade to normal
/// channel messages since the surface has no hidden replies.
pub struct TextCommandContext {
    gateway: Arc<dyn ChatGateway>,
    pub author: UserId,
    pub channel: ChannelId,
    pub guild: GuildId,
}

impl TextCommandContext {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        author: UserId,
        channel: ChannelId,
        guild: GuildId,
    ) -> Self {
        Self {
            gateway,
            author,
            channel,
            guild,
        }
    }
}

#[async_trait]
impl CommandContext for TextCommandContext {
    fn author(&self) -> UserId {
        self.author
    }

    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn guild(&self) -> GuildId {
        self.guild
    }

    async fn reply(&self, text: &str) -> Result<()> {
        self.gateway.send_text(self.channel, text).await?;
        Ok(())
    }

    async fn reply_ephemeral(&self, text: &str) -> Result<()> {
        self.reply(text).await
    }

    async fn reply_pages(&self, embed: &Embed) -> Result<MessageId> {
        let message = self.gateway.send_paginated(self.channel, embed).await?;
        Ok(message.id)
    }
}

/// Context for interaction invocations. Replies go through the
/// interaction callback; embeds are posted to the channel so the reply
/// has a message id to hang a pagination session on.
pub struct InteractionContext {
    gateway: Arc<dyn ChatGateway>,
    pub author: UserId,
    pub channel: ChannelId,
    pub guild: GuildId,
    pub interaction: InteractionId,
    pub token: String,
}

impl InteractionContext {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        author: UserId,
        channel: ChannelId,
        guild: GuildId,
        interaction: InteractionId,
        token: String,
    ) -> Self {
        Self {
            gateway,
            author,
            channel,
            guild,
            interaction,
            token,
        }
    }
}

#[async_trait]
impl CommandContext for InteractionContext {
    fn author(&self) -> UserId {
        self.author
    }

    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn guild(&self) -> GuildId {
        self.guild
    }

    async fn reply(&self, text: &str) -> Result<()> {
        self.gateway
            .respond_interaction(self.interaction, &self.token, text, false)
            .await
    }

    async fn reply_ephemeral(&self, text: &str) -> Result<()> {
        self.gateway
            .respond_interaction(self.interaction, &self.token, text, true)
            .await
    }

    async fn reply_pages(&self, embed: &Embed) -> Result<MessageId> {
        let message = self.gateway.send_paginated(self.channel, embed).await?;
        Ok(message.id)
    }
}
