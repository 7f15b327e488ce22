// SPDX-License-Identifier: PMPL-1.0-or-later
//! Roster command handlers
//!
//! Every user-facing failure is caught at the dispatch boundary and turned
//! into a one-line reply; no command error terminates the process.

pub mod context;

pub use context::{CommandContext, InteractionContext, TextCommandContext};

use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::RosterConfig;
use crate::embed::{build_roster_embed, role_label, with_description, MAX_DESCRIPTION_LEN, MAX_EMBED_FIELDS};
use crate::error::{Error, Result};
use crate::gateway::{message_link, ChannelId, ChatGateway, MessageId, RoleRef};
use crate::pagination::{paginate, PaginationSession, SessionMap};
use crate::store::models::{Roster, TrackedRole};
use crate::store::RosterStore;

/// A command as delivered by the relay, already routed and parsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterCommand {
    /// List all active rosters.
    List,
    /// Create a roster message in a channel for the given roles.
    Create {
        channel: ChannelId,
        roles: Vec<RoleRef>,
    },
    /// Delete a channel's roster and its message.
    Delete { channel: ChannelId },
    /// Rewrite the description of every roster message.
    Edit { description: String },
    /// Pin a message (helpers only, roster channels only).
    Pin { message: MessageId },
    /// Unpin a message (helpers only, roster channels only).
    Unpin { message: MessageId },
    /// Context-menu action: pin if unpinned, unpin if pinned.
    TogglePin { message: MessageId },
}

/// Command handler with injected collaborators
pub struct CommandHandler {
    store: Arc<dyn RosterStore>,
    gateway: Arc<dyn ChatGateway>,
    sessions: Arc<SessionMap>,
    config: RosterConfig,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn RosterStore>,
        gateway: Arc<dyn ChatGateway>,
        sessions: Arc<SessionMap>,
        config: RosterConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            sessions,
            config,
        }
    }

    /// Run a command, converting any failure into a one-line reply.
    pub async fn dispatch(&self, ctx: &dyn CommandContext, command: RosterCommand) {
        let result = match command {
            RosterCommand::List => self.list(ctx).await,
            RosterCommand::Create { channel, roles } => self.create(ctx, channel, roles).await,
            RosterCommand::Delete { channel } => self.delete(ctx, channel).await,
            RosterCommand::Edit { description } => self.edit(ctx, &description).await,
            RosterCommand::Pin { message } => self.pin(ctx, message).await,
            RosterCommand::Unpin { message } => self.unpin(ctx, message).await,
            RosterCommand::TogglePin { message } => self.toggle_pin(ctx, message).await,
        };

        if let Err(err) = result {
            tracing::warn!("Command failed: {}", err);
            if let Err(reply_err) = ctx.reply_ephemeral(&err.user_message()).await {
                tracing::error!("Failed to deliver error reply: {}", reply_err);
            }
        }
    }

    /// `roster list`: paginated listing of every active roster with a
    /// link to its pinned message.
    async fn list(&self, ctx: &dyn CommandContext) -> Result<()> {
        let rosters = self.store.list().await?;
        let entries: Vec<(String, String)> = rosters
            .iter()
            .map(|roster| {
                (
                    roster.channel_id.mention(),
                    message_link(roster.guild_id, roster.channel_id, roster.message_id),
                )
            })
            .collect();

        let pages = paginate(&entries, self.config.page_size, "Active rosters");
        let reply = ctx.reply_pages(&pages[0]).await?;

        let session = PaginationSession::new(
            ctx.author(),
            pages,
            Duration::seconds(self.config.session_timeout_secs as i64),
            self.config.anyone_can_navigate,
        );
        self.sessions.insert(reply, session).await;
        Ok(())
    }

    /// `roster create <channel> <roles...>`: build the embed from current
    /// role holders, send it, pin it, persist the record.
    async fn create(
        &self,
        ctx: &dyn CommandContext,
        channel: ChannelId,
        roles: Vec<RoleRef>,
    ) -> Result<()> {
        if roles.is_empty() {
            return Err(Error::InvalidInput(
                "At least one role is required to create a roster.".to_string(),
            ));
        }
        if roles.len() > MAX_EMBED_FIELDS {
            return Err(Error::InvalidInput(format!(
                "A roster can track at most {} roles.",
                MAX_EMBED_FIELDS
            )));
        }
        for role in &roles {
            crate::sanitize::validate_role_name(&role.name)?;
        }

        // Check before sending anything so a duplicate does not leave an
        // orphaned message behind.
        match self.store.get(channel).await {
            Ok(_) => return Err(Error::DuplicateRoster(channel)),
            Err(Error::RosterNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let members = self.gateway.fetch_guild_members(ctx.guild()).await?;
        let pairs: Vec<(String, Vec<crate::gateway::UserId>)> = roles
            .iter()
            .map(|role| {
                let holders = members
                    .iter()
                    .filter(|member| member.roles.contains(&role.id))
                    .map(|member| member.user.id)
                    .collect();
                (role_label(&role.name), holders)
            })
            .collect();

        let description = format!(
            "{}\n\n**Subject helpers for {}:**",
            self.config.description_template,
            channel.mention()
        );
        let embed = build_roster_embed(&description, &pairs);

        let message = self.gateway.send_embed(channel, &embed).await?;
        self.gateway.pin_message(channel, message.id).await?;

        let roster = Roster::new(
            channel,
            ctx.guild(),
            message.id,
            description,
            roles.iter().map(TrackedRole::from).collect(),
        );
        self.store.create(&roster).await?;

        ctx.reply(&format!("Roster created in {}.", channel.mention()))
            .await
    }

    /// `roster delete <channel>`: remove the record and the message.
    async fn delete(&self, ctx: &dyn CommandContext, channel: ChannelId) -> Result<()> {
        let roster = self.store.get(channel).await?;
        self.store.delete(channel).await?;

        match self
            .gateway
            .delete_message(channel, roster.message_id)
            .await
        {
            Ok(()) | Err(Error::MessageNotFound(_)) | Err(Error::ChannelNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        ctx.reply(&format!("Roster for {} deleted.", channel.mention()))
            .await
    }

    /// `roster edit <description>`: rewrite every roster message's
    /// description and persist the new text.
    async fn edit(&self, ctx: &dyn CommandContext, description: &str) -> Result<()> {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(Error::InvalidInput(format!(
                "Descriptions are limited to {} characters.",
                MAX_DESCRIPTION_LEN
            )));
        }

        for roster in self.store.list().await? {
            let message = match self
                .gateway
                .fetch_message(roster.channel_id, roster.message_id)
                .await
            {
                Ok(message) => message,
                Err(Error::MessageNotFound(_)) | Err(Error::ChannelNotFound(_)) => {
                    tracing::warn!(
                        "Roster message for channel {} is gone, skipping edit",
                        roster.channel_id
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            let embed = message.embeds.first().cloned().unwrap_or_default();
            let patched = with_description(&embed, description);
            self.gateway
                .edit_embed(roster.channel_id, roster.message_id, &patched)
                .await?;
            self.store
                .set_description(roster.channel_id, description)
                .await?;
        }

        ctx.reply("Updated messages successfully.").await
    }

    async fn pin(&self, ctx: &dyn CommandContext, message: MessageId) -> Result<()> {
        self.check_pin_permission(ctx).await?;

        let fetched = self.gateway.fetch_message(ctx.channel(), message).await?;
        if fetched.pinned {
            return ctx.reply("The message is already pinned.").await;
        }

        self.gateway.pin_message(ctx.channel(), message).await?;
        ctx.reply("The message was successfully pinned.").await
    }

    async fn unpin(&self, ctx: &dyn CommandContext, message: MessageId) -> Result<()> {
        self.check_pin_permission(ctx).await?;

        let fetched = self.gateway.fetch_message(ctx.channel(), message).await?;
        if !fetched.pinned {
            return ctx.reply("The message is already unpinned.").await;
        }

        self.gateway.unpin_message(ctx.channel(), message).await?;
        ctx.reply("The message was successfully unpinned.").await
    }

    async fn toggle_pin(&self, ctx: &dyn CommandContext, message: MessageId) -> Result<()> {
        self.check_pin_permission(ctx).await?;

        let fetched = self.gateway.fetch_message(ctx.channel(), message).await?;
        if fetched.pinned {
            self.gateway.unpin_message(ctx.channel(), message).await?;
            ctx.reply("The message was successfully unpinned.").await
        } else {
            self.gateway.pin_message(ctx.channel(), message).await?;
            ctx.reply("The message was successfully pinned.").await
        }
    }

    /// Pinning is restricted to members holding a role tracked by the
    /// invoking channel's roster.
    async fn check_pin_permission(&self, ctx: &dyn CommandContext) -> Result<()> {
        let roster = match self.store.get(ctx.channel()).await {
            Ok(roster) => roster,
            Err(Error::RosterNotFound(_)) => {
                return Err(Error::InvalidInput(
                    "You may only pin messages in channels with a roster.".to_string(),
                ));
            }
            Err(err) => return Err(err),
        };

        let member = self.gateway.fetch_member(ctx.guild(), ctx.author()).await?;
        if !member.roles.iter().any(|role| roster.tracks(*role)) {
            return Err(Error::InvalidInput(
                "Only helpers listed on this channel's roster can pin messages.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GuildId, MemoryGateway, RoleId, UserId};
    use crate::store::SqliteStore;

    const GUILD: GuildId = GuildId(10);
    const HOME: ChannelId = ChannelId(1);
    const SUBJECT: ChannelId = ChannelId(2);

    fn maths() -> RoleRef {
        RoleRef {
            id: RoleId(100),
            name: "Maths Helper".to_string(),
        }
    }

    async fn handler() -> (Arc<MemoryGateway>, Arc<SqliteStore>, Arc<SessionMap>, CommandHandler) {
        let gateway = Arc::new(MemoryGateway::new());
        let store = Arc::new(SqliteStore::new("sqlite::memory:", 1).await.unwrap());
        let sessions = Arc::new(SessionMap::new());
        let handler = CommandHandler::new(
            store.clone(),
            gateway.clone(),
            sessions.clone(),
            RosterConfig::default(),
        );
        (gateway, store, sessions, handler)
    }

    fn ctx(gateway: Arc<MemoryGateway>, author: UserId, channel: ChannelId) -> TextCommandContext {
        TextCommandContext::new(gateway, author, channel, GUILD)
    }

    #[tokio::test]
    async fn create_builds_pins_and_persists() {
        let (gateway, store, _sessions, handler) = handler().await;
        gateway
            .put_members(GUILD, vec![(UserId(5), vec![RoleId(100)]), (UserId(6), vec![])])
            .await;

        let ctx = ctx(gateway.clone(), UserId(1), HOME);
        handler
            .dispatch(
                &ctx,
                RosterCommand::Create {
                    channel: SUBJECT,
                    roles: vec![maths()],
                },
            )
            .await;

        let roster = store.get(SUBJECT).await.unwrap();
        assert!(gateway.is_pinned(SUBJECT, roster.message_id).await);

        let embed = gateway.embed_of(SUBJECT, roster.message_id).await.unwrap();
        assert_eq!(embed.fields.len(), 1);
        assert_eq!(embed.fields[0].name, "**Maths Helper**");
        assert_eq!(embed.fields[0].value, "<@5>");
    }

    #[tokio::test]
    async fn duplicate_create_replies_without_persisting_twice() {
        let (gateway, store, _sessions, handler) = handler().await;
        gateway.put_members(GUILD, vec![]).await;

        let ctx = ctx(gateway.clone(), UserId(1), HOME);
        let command = RosterCommand::Create {
            channel: SUBJECT,
            roles: vec![maths()],
        };
        handler.dispatch(&ctx, command.clone()).await;
        let first = store.get(SUBJECT).await.unwrap();

        handler.dispatch(&ctx, command).await;
        let second = store.get(SUBJECT).await.unwrap();
        assert_eq!(first.message_id, second.message_id);
    }

    #[tokio::test]
    async fn create_with_no_roles_is_rejected() {
        let (gateway, store, _sessions, handler) = handler().await;
        let ctx = ctx(gateway.clone(), UserId(1), HOME);
        handler
            .dispatch(
                &ctx,
                RosterCommand::Create {
                    channel: SUBJECT,
                    roles: vec![],
                },
            )
            .await;
        assert!(store.get(SUBJECT).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_record_and_message() {
        let (gateway, store, _sessions, handler) = handler().await;
        gateway.put_members(GUILD, vec![]).await;
        let ctx = ctx(gateway.clone(), UserId(1), HOME);

        handler
            .dispatch(
                &ctx,
                RosterCommand::Create {
                    channel: SUBJECT,
                    roles: vec![maths()],
                },
            )
            .await;
        let roster = store.get(SUBJECT).await.unwrap();

        handler
            .dispatch(&ctx, RosterCommand::Delete { channel: SUBJECT })
            .await;
        assert!(store.get(SUBJECT).await.is_err());
        assert!(gateway.embed_of(SUBJECT, roster.message_id).await.is_none());
    }

    #[tokio::test]
    async fn list_attaches_a_pagination_session() {
        let (gateway, _store, sessions, handler) = handler().await;
        gateway.put_members(GUILD, vec![]).await;
        let ctx = ctx(gateway.clone(), UserId(1), HOME);

        handler.dispatch(&ctx, RosterCommand::List).await;
        assert_eq!(sessions.len().await, 1);
    }

    #[tokio::test]
    async fn edit_rewrites_every_roster_description() {
        let (gateway, store, _sessions, handler) = handler().await;
        gateway.put_members(GUILD, vec![]).await;
        let ctx = ctx(gateway.clone(), UserId(1), HOME);

        for channel in [ChannelId(2), ChannelId(3)] {
            handler
                .dispatch(
                    &ctx,
                    RosterCommand::Create {
                        channel,
                        roles: vec![maths()],
                    },
                )
                .await;
        }

        handler
            .dispatch(
                &ctx,
                RosterCommand::Edit {
                    description: "Fresh template".to_string(),
                },
            )
            .await;

        for channel in [ChannelId(2), ChannelId(3)] {
            let roster = store.get(channel).await.unwrap();
            let embed = gateway.embed_of(channel, roster.message_id).await.unwrap();
            assert_eq!(embed.description, "Fresh template");
            assert_eq!(roster.description, "Fresh template");
        }
    }

    #[tokio::test]
    async fn pinning_requires_a_tracked_role() {
        let (gateway, store, _sessions, handler) = handler().await;
        gateway
            .put_members(GUILD, vec![(UserId(5), vec![RoleId(100)]), (UserId(6), vec![])])
            .await;

        let helper_ctx = ctx(gateway.clone(), UserId(5), SUBJECT);
        handler
            .dispatch(
                &helper_ctx,
                RosterCommand::Create {
                    channel: SUBJECT,
                    roles: vec![maths()],
                },
            )
            .await;
        let target = gateway.send_text(SUBJECT, "pin me").await.unwrap();

        // A member without the tracked role is refused.
        let outsider_ctx = ctx(gateway.clone(), UserId(6), SUBJECT);
        handler
            .dispatch(&outsider_ctx, RosterCommand::Pin { message: target.id })
            .await;
        assert!(!gateway.is_pinned(SUBJECT, target.id).await);

        // A helper is allowed.
        handler
            .dispatch(&helper_ctx, RosterCommand::Pin { message: target.id })
            .await;
        assert!(gateway.is_pinned(SUBJECT, target.id).await);

        assert!(store.get(SUBJECT).await.is_ok());
    }

    #[tokio::test]
    async fn toggle_pin_flips_state() {
        let (gateway, _store, _sessions, handler) = handler().await;
        gateway
            .put_members(GUILD, vec![(UserId(5), vec![RoleId(100)])])
            .await;

        let helper_ctx = ctx(gateway.clone(), UserId(5), SUBJECT);
        handler
            .dispatch(
                &helper_ctx,
                RosterCommand::Create {
                    channel: SUBJECT,
                    roles: vec![maths()],
                },
            )
            .await;
        let target = gateway.send_text(SUBJECT, "pin me").await.unwrap();

        handler
            .dispatch(&helper_ctx, RosterCommand::TogglePin { message: target.id })
            .await;
        assert!(gateway.is_pinned(SUBJECT, target.id).await);

        handler
            .dispatch(&helper_ctx, RosterCommand::TogglePin { message: target.id })
            .await;
        assert!(!gateway.is_pinned(SUBJECT, target.id).await);
    }
}
