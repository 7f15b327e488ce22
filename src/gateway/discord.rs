// SPDX-License-Identifier: PMPL-1.0-or-later
//! Discord REST implementation of the chat gateway
//!
//! # Security considerations
//!
//! - The bot token is read from configuration and passed only into the
//!   Authorization header. It is never logged or included in error messages.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{
    Channel, ChannelId, ChatGateway, Embed, GuildId, InteractionId, Member, Message, MessageId,
    UserId,
};
use crate::config::ChatConfig;
use crate::error::{Error, Result};

/// Page size for member listing requests, the platform maximum.
const MEMBER_PAGE_LIMIT: usize = 1000;

/// Gateway backed by the Discord REST API
pub struct DiscordGateway {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl DiscordGateway {
    /// Create a new gateway client from chat configuration
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("User-Agent", "rosterbot");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bot {}", token)),
            None => request,
        }
    }

    /// Map non-success statuses onto the error taxonomy.
    ///
    /// `not_found` supplies the caller-specific 404 error since the same
    /// status covers missing channels, messages, and members.
    async fn check(resp: Response, action: &str, not_found: Error) -> Result<Response> {
        match resp.status() {
            StatusCode::NOT_FOUND => Err(not_found),
            StatusCode::FORBIDDEN => Err(Error::Forbidden(action.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = resp
                    .json::<RateLimitBody>()
                    .await
                    .map(|b| b.retry_after)
                    .unwrap_or(0.0);
                Err(Error::RateLimited(retry_after))
            }
            status if !status.is_success() => {
                Err(Error::Gateway(format!("{} returned status {}", action, status)))
            }
            _ => Ok(resp),
        }
    }
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: f64,
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn fetch_channel(&self, channel: ChannelId) -> Result<Channel> {
        let resp = self
            .authorize(self.client.get(self.url(&format!("/channels/{}", channel))))
            .send()
            .await?;
        let resp = Self::check(resp, "fetch channel", Error::ChannelNotFound(channel)).await?;
        Ok(resp.json().await?)
    }

    async fn fetch_message(&self, channel: ChannelId, message: MessageId) -> Result<Message> {
        let resp = self
            .authorize(
                self.client
                    .get(self.url(&format!("/channels/{}/messages/{}", channel, message))),
            )
            .send()
            .await?;
        let resp = Self::check(resp, "fetch message", Error::MessageNotFound(message)).await?;
        Ok(resp.json().await?)
    }

    async fn send_text(&self, channel: ChannelId, content: &str) -> Result<Message> {
        let resp = self
            .authorize(
                self.client
                    .post(self.url(&format!("/channels/{}/messages", channel))),
            )
            .json(&json!({ "content": content }))
            .send()
            .await?;
        let resp = Self::check(resp, "send message", Error::ChannelNotFound(channel)).await?;
        Ok(resp.json().await?)
    }

    async fn send_embed(&self, channel: ChannelId, embed: &Embed) -> Result<Message> {
        let resp = self
            .authorize(
                self.client
                    .post(self.url(&format!("/channels/{}/messages", channel))),
            )
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await?;
        let resp = Self::check(resp, "send message", Error::ChannelNotFound(channel)).await?;
        Ok(resp.json().await?)
    }

    async fn send_paginated(&self, channel: ChannelId, embed: &Embed) -> Result<Message> {
        // One action row of buttons whose custom ids match the navigation
        // actions parsed by the component handler.
        let components = json!([{
            "type": 1,
            "components": [
                { "type": 2, "style": 2, "custom_id": "roster-nav:first", "label": "\u{ab}" },
                { "type": 2, "style": 2, "custom_id": "roster-nav:previous", "label": "\u{2039}" },
                { "type": 2, "style": 2, "custom_id": "roster-nav:next", "label": "\u{203a}" },
                { "type": 2, "style": 2, "custom_id": "roster-nav:last", "label": "\u{bb}" }
            ]
        }]);

        let resp = self
            .authorize(
                self.client
                    .post(self.url(&format!("/channels/{}/messages", channel))),
            )
            .json(&json!({ "embeds": [embed], "components": components }))
            .send()
            .await?;
        let resp = Self::check(resp, "send message", Error::ChannelNotFound(channel)).await?;
        Ok(resp.json().await?)
    }

    async fn edit_embed(
        &self,
        channel: ChannelId,
        message: MessageId,
        embed: &Embed,
    ) -> Result<()> {
        let resp = self
            .authorize(
                self.client
                    .patch(self.url(&format!("/channels/{}/messages/{}", channel, message))),
            )
            .json(&json!({ "embeds": [embed] }))
            .send()
            .await?;
        Self::check(resp, "edit message", Error::MessageNotFound(message)).await?;
        Ok(())
    }

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let resp = self
            .authorize(
                self.client
                    .delete(self.url(&format!("/channels/{}/messages/{}", channel, message))),
            )
            .send()
            .await?;
        Self::check(resp, "delete message", Error::MessageNotFound(message)).await?;
        Ok(())
    }

    async fn pin_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let resp = self
            .authorize(
                self.client
                    .put(self.url(&format!("/channels/{}/pins/{}", channel, message))),
            )
            .send()
            .await?;
        Self::check(resp, "pin messages", Error::MessageNotFound(message)).await?;
        Ok(())
    }

    async fn unpin_message(&self, channel: ChannelId, message: MessageId) -> Result<()> {
        let resp = self
            .authorize(
                self.client
                    .delete(self.url(&format!("/channels/{}/pins/{}", channel, message))),
            )
            .send()
            .await?;
        Self::check(resp, "unpin messages", Error::MessageNotFound(message)).await?;
        Ok(())
    }

    async fn fetch_member(&self, guild: GuildId, user: UserId) -> Result<Member> {
        let resp = self
            .authorize(
                self.client
                    .get(self.url(&format!("/guilds/{}/members/{}", guild, user))),
            )
            .send()
            .await?;
        let resp = Self::check(
            resp,
            "fetch member",
            Error::Gateway(format!("member {} not found in guild {}", user, guild)),
        )
        .await?;
        Ok(resp.json().await?)
    }

    async fn fetch_guild_members(&self, guild: GuildId) -> Result<Vec<Member>> {
        let mut members: Vec<Member> = Vec::new();
        let mut after: Option<UserId> = None;

        loop {
            let mut request = self
                .client
                .get(self.url(&format!("/guilds/{}/members", guild)))
                .query(&[("limit", MEMBER_PAGE_LIMIT.to_string())]);
            if let Some(after) = after {
                request = request.query(&[("after", after.to_string())]);
            }

            let resp = self.authorize(request).send().await?;
            let resp = Self::check(
                resp,
                "list members",
                Error::Gateway(format!("guild {} not found", guild)),
            )
            .await?;

            let page: Vec<Member> = resp.json().await?;
            let full_page = page.len() == MEMBER_PAGE_LIMIT;
            after = page.last().map(|m| m.user.id);
            members.extend(page);

            if !full_page {
                return Ok(members);
            }
        }
    }

    async fn respond_interaction(
        &self,
        interaction: InteractionId,
        token: &str,
        content: &str,
        ephemeral: bool,
    ) -> Result<()> {
        // Type 4: respond with a message. Flag 64 marks it ephemeral.
        let mut data = json!({ "content": content });
        if ephemeral {
            data["flags"] = json!(64);
        }

        let resp = self
            .authorize(
                self.client
                    .post(self.url(&format!("/interactions/{}/{}/callback", interaction, token))),
            )
            .json(&json!({ "type": 4, "data": data }))
            .send()
            .await?;
        Self::check(
            resp,
            "respond to interaction",
            Error::Gateway(format!("interaction {} expired", interaction)),
        )
        .await?;
        Ok(())
    }

    async fn ack_component(&self, interaction: InteractionId, token: &str) -> Result<()> {
        // Type 6: deferred update, acknowledges the component press.
        let resp = self
            .authorize(
                self.client
                    .post(self.url(&format!("/interactions/{}/{}/callback", interaction, token))),
            )
            .json(&json!({ "type": 6 }))
            .send()
            .await?;
        Self::check(
            resp,
            "acknowledge interaction",
            Error::Gateway(format!("interaction {} expired", interaction)),
        )
        .await?;
        Ok(())
    }
}
