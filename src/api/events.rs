// SPDX-License-Identifier: PMPL-1.0-or-later
//! Handlers for relayed gateway events
//!
//! The relay process holds the platform websocket and forwards the events
//! this bot cares about: member role updates, routed commands, and
//! component presses. Payloads are verified with HMAC-SHA256 when a relay
//! secret is configured.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use crate::commands::{CommandHandler, InteractionContext, RosterCommand, TextCommandContext};
use crate::config::Config;
use crate::gateway::{
    ChannelId, ChatGateway, GuildId, InteractionId, MessageId, RoleRef, UserId,
};
use crate::pagination::{NavAction, NavOutcome, SessionMap};
use crate::store::RosterStore;
use crate::sync::{MembershipChange, SyncEngine};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn RosterStore>,
    pub gateway: Arc<dyn ChatGateway>,
    pub sync: Arc<SyncEngine>,
    pub sessions: Arc<SessionMap>,
    pub commands: Arc<CommandHandler>,
}

/// Create the event router
pub fn event_router() -> Router<AppState> {
    Router::new()
        .route("/events/member-update", post(handle_member_update))
        .route("/events/command", post(handle_command))
        .route("/events/component", post(handle_component))
}

/// Member role-set change forwarded by the relay
async fn handle_member_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(e) = verify_relay_signature(&state.config, &headers, &body) {
        tracing::warn!("Member-update signature verification failed: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let payload: MemberUpdatePayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed member-update payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Malformed payload");
        }
    };

    let change = MembershipChange::diff(
        payload.guild_id,
        payload.user_id,
        &payload.roles_before,
        &payload.roles_after,
    );

    // Sync failures are logged inside the engine, never surfaced here;
    // there is no interactive caller to receive them.
    state.sync.apply(&change).await;

    (StatusCode::OK, "OK")
}

/// Routed command forwarded by the relay
async fn handle_command(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(e) = verify_relay_signature(&state.config, &headers, &body) {
        tracing::warn!("Command signature verification failed: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let payload: CommandPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed command payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Malformed payload");
        }
    };

    let origin = payload.context;
    match origin.interaction {
        Some(interaction) => {
            let ctx = InteractionContext::new(
                state.gateway.clone(),
                origin.author,
                origin.channel_id,
                origin.guild_id,
                interaction.id,
                interaction.token,
            );
            state.commands.dispatch(&ctx, payload.command).await;
        }
        None => {
            let ctx = TextCommandContext::new(
                state.gateway.clone(),
                origin.author,
                origin.channel_id,
                origin.guild_id,
            );
            state.commands.dispatch(&ctx, payload.command).await;
        }
    }

    (StatusCode::OK, "OK")
}

/// Component press on a paginated listing
async fn handle_component(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(e) = verify_relay_signature(&state.config, &headers, &body) {
        tracing::warn!("Component signature verification failed: {}", e);
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let payload: ComponentPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Malformed component payload: {}", e);
            return (StatusCode::BAD_REQUEST, "Malformed payload");
        }
    };

    let Some(action) = NavAction::from_custom_id(&payload.custom_id) else {
        tracing::debug!("Ignoring component custom id: {}", payload.custom_id);
        return (StatusCode::OK, "ignored");
    };

    let outcome = state
        .sessions
        .navigate(payload.message_id, payload.user_id, action)
        .await;

    let result = match outcome {
        Some(NavOutcome::Page(embed)) => {
            match state
                .gateway
                .edit_embed(payload.channel_id, payload.message_id, &embed)
                .await
            {
                Ok(()) => {
                    state
                        .gateway
                        .ack_component(payload.interaction.id, &payload.interaction.token)
                        .await
                }
                Err(err) => Err(err),
            }
        }
        Some(NavOutcome::Denied(notice)) => {
            state
                .gateway
                .respond_interaction(
                    payload.interaction.id,
                    &payload.interaction.token,
                    &notice,
                    true,
                )
                .await
        }
        Some(NavOutcome::Expired) => {
            state
                .gateway
                .respond_interaction(
                    payload.interaction.id,
                    &payload.interaction.token,
                    "These controls have expired. Run the command again.",
                    true,
                )
                .await
        }
        None => {
            state
                .gateway
                .respond_interaction(
                    payload.interaction.id,
                    &payload.interaction.token,
                    "These controls are no longer active.",
                    true,
                )
                .await
        }
    };

    if let Err(err) = result {
        tracing::warn!("Failed to answer component press: {}", err);
    }

    (StatusCode::OK, "OK")
}

#[derive(Debug, Deserialize)]
struct MemberUpdatePayload {
    guild_id: GuildId,
    user_id: UserId,
    #[serde(default)]
    roles_before: Vec<RoleRef>,
    #[serde(default)]
    roles_after: Vec<RoleRef>,
}

#[derive(Debug, Deserialize)]
struct CommandPayload {
    context: CommandOrigin,
    command: RosterCommand,
}

#[derive(Debug, Deserialize)]
struct CommandOrigin {
    guild_id: GuildId,
    channel_id: ChannelId,
    author: UserId,
    #[serde(default)]
    interaction: Option<InteractionRef>,
}

#[derive(Debug, Deserialize)]
struct InteractionRef {
    id: InteractionId,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ComponentPayload {
    channel_id: ChannelId,
    message_id: MessageId,
    user_id: UserId,
    custom_id: String,
    interaction: InteractionRef,
}

/// Verify the relay signature (HMAC-SHA256) when a secret is configured.
fn verify_relay_signature(
    config: &Config,
    headers: &HeaderMap,
    body: &Bytes,
) -> std::result::Result<(), String> {
    let Some(ref secret) = config.chat.relay_secret else {
        return Ok(());
    };

    let signature = headers
        .get("X-Relay-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "Missing X-Relay-Signature header".to_string())?;

    // Signature format: "sha256=<hex>"
    let signature = signature
        .strip_prefix("sha256=")
        .ok_or_else(|| "Invalid signature format".to_string())?;

    let signature_bytes =
        hex::decode(signature).map_err(|_| "Invalid hex in signature".to_string())?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| "Invalid secret key".to_string())?;
    mac.update(body);

    mac.verify_slice(&signature_bytes)
        .map_err(|_| "Signature mismatch".to_string())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;

    fn config_with_secret(secret: &str) -> Config {
        Config {
            chat: ChatConfig {
                relay_secret: Some(secret.to_string()),
                ..ChatConfig::default()
            },
            ..Config::default()
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_is_accepted() {
        let config = config_with_secret("test-secret");
        let body = Bytes::from(r#"{"test": "payload"}"#);

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Relay-Signature",
            sign("test-secret", &body).parse().unwrap(),
        );

        assert!(verify_relay_signature(&config, &headers, &body).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = config_with_secret("test-secret");
        let body = Bytes::from(r#"{"test": "payload"}"#);

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Relay-Signature",
            sign("other-secret", &body).parse().unwrap(),
        );

        assert!(verify_relay_signature(&config, &headers, &body).is_err());
    }

    #[test]
    fn missing_header_is_rejected_when_secret_configured() {
        let config = config_with_secret("test-secret");
        let body = Bytes::from("{}");
        assert!(verify_relay_signature(&config, &HeaderMap::new(), &body).is_err());
    }

    #[test]
    fn unsigned_events_pass_without_configured_secret() {
        let config = Config::default();
        let body = Bytes::from("{}");
        assert!(verify_relay_signature(&config, &HeaderMap::new(), &body).is_ok());
    }

    #[test]
    fn member_update_payload_deserializes() {
        let json = r#"{
            "guild_id": "10",
            "user_id": "5",
            "roles_before": [],
            "roles_after": [{"id": "100", "name": "Maths Helper"}]
        }"#;
        let payload: MemberUpdatePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.user_id, UserId(5));
        assert_eq!(payload.roles_after[0].name, "Maths Helper");
    }

    #[test]
    fn command_payload_deserializes_with_and_without_interaction() {
        let text = r#"{
            "context": {"guild_id": "10", "channel_id": "1", "author": "5"},
            "command": {"kind": "list"}
        }"#;
        let payload: CommandPayload = serde_json::from_str(text).unwrap();
        assert!(payload.context.interaction.is_none());
        assert!(matches!(payload.command, RosterCommand::List));

        let interaction = r#"{
            "context": {
                "guild_id": "10",
                "channel_id": "1",
                "author": "5",
                "interaction": {"id": "77", "token": "tok"}
            },
            "command": {"kind": "delete", "channel": "2"}
        }"#;
        let payload: CommandPayload = serde_json::from_str(interaction).unwrap();
        assert!(payload.context.interaction.is_some());
        assert!(matches!(
            payload.command,
            RosterCommand::Delete {
                channel: ChannelId(2)
            }
        ));
    }
}
