// SPDX-License-Identifier: PMPL-1.0-or-later
//! rosterbot CLI and server entry point

use clap::{Parser, Subcommand};
use rosterbot::api::{event_router, AppState};
use rosterbot::commands::CommandHandler;
use rosterbot::embed::{build_roster_embed, role_label};
use rosterbot::gateway::{
    ChannelId, ChatGateway, DiscordGateway, GuildId, RoleId, RoleRef,
};
use rosterbot::pagination::SessionMap;
use rosterbot::store::models::{Roster, TrackedRole};
use rosterbot::store::{RosterStore, SqliteStore};
use rosterbot::sync::SyncEngine;
use rosterbot::{Config, Error, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rosterbot")]
#[command(about = "Role roster bot keeping pinned member-list embeds in sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "rosterbot.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the event server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "0.0.0.0")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Create a roster message in a channel
    Create {
        /// Guild id
        #[arg(short, long)]
        guild: u64,

        /// Channel id
        #[arg(long)]
        channel: u64,

        /// Roles to track, comma-separated as id=name pairs
        #[arg(short, long)]
        roles: String,
    },

    /// Delete a channel's roster
    Delete {
        /// Channel id
        #[arg(long)]
        channel: u64,
    },

    /// List all active rosters
    List,

    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A malformed config is the one startup failure that aborts.
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { host, port } => {
            tracing::info!("Starting rosterbot server on {}:{}", host, port);
            serve(&config, &host, port).await
        }
        Commands::Create {
            guild,
            channel,
            roles,
        } => {
            tracing::info!("Creating roster in channel {}", channel);
            create(&config, GuildId(guild), ChannelId(channel), &roles).await
        }
        Commands::Delete { channel } => {
            tracing::info!("Deleting roster for channel {}", channel);
            delete(&config, ChannelId(channel)).await
        }
        Commands::List => list(&config).await,
        Commands::InitDb => {
            tracing::info!("Initializing database");
            init_db(&config).await
        }
    }
}

async fn serve(config: &Config, host: &str, port: u16) -> Result<()> {
    use axum::{routing::get, Router};

    let store: Arc<dyn RosterStore> = Arc::new(
        SqliteStore::new(&config.database.url, config.database.max_connections).await?,
    );
    let gateway: Arc<dyn ChatGateway> = Arc::new(DiscordGateway::new(&config.chat)?);
    let sync = Arc::new(SyncEngine::new(store.clone(), gateway.clone()));
    let sessions = Arc::new(SessionMap::new());
    let commands = Arc::new(CommandHandler::new(
        store.clone(),
        gateway.clone(),
        sessions.clone(),
        config.roster.clone(),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        gateway,
        sync,
        sessions: sessions.clone(),
        commands,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/", get(root))
        .merge(event_router())
        .with_state(state);

    tokio::spawn(run_session_sweeper(sessions));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::info!("Listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn root() -> &'static str {
    "rosterbot - Role roster bot\n\nEndpoints:\n  GET  /health\n  POST /events/member-update\n  POST /events/command\n  POST /events/component"
}

/// Reap expired pagination sessions so the map does not grow unbounded.
async fn run_session_sweeper(sessions: Arc<SessionMap>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
    loop {
        interval.tick().await;
        let removed = sessions.sweep_expired().await;
        if removed > 0 {
            tracing::debug!("Swept {} expired pagination sessions", removed);
        }
    }
}

async fn create(
    config: &Config,
    guild: GuildId,
    channel: ChannelId,
    roles: &str,
) -> Result<()> {
    let store =
        SqliteStore::new(&config.database.url, config.database.max_connections).await?;
    let gateway = DiscordGateway::new(&config.chat)?;
    let roles = parse_role_list(roles)?;

    match store.get(channel).await {
        Ok(_) => return Err(Error::DuplicateRoster(channel)),
        Err(Error::RosterNotFound(_)) => {}
        Err(err) => return Err(err),
    }

    let members = gateway.fetch_guild_members(guild).await?;
    let pairs: Vec<(String, Vec<rosterbot::gateway::UserId>)> = roles
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
        config.roster.description_template,
        channel.mention()
    );
    let embed = build_roster_embed(&description, &pairs);

    let message = gateway.send_embed(channel, &embed).await?;
    gateway.pin_message(channel, message.id).await?;

    let roster = Roster::new(
        channel,
        guild,
        message.id,
        description,
        roles.iter().map(TrackedRole::from).collect(),
    );
    store.create(&roster).await?;

    tracing::info!(
        "Created roster in channel {} tracking {} role(s)",
        channel,
        roster.roles.len()
    );
    Ok(())
}

async fn delete(config: &Config, channel: ChannelId) -> Result<()> {
    let store =
        SqliteStore::new(&config.database.url, config.database.max_connections).await?;
    let gateway = DiscordGateway::new(&config.chat)?;

    let roster = store.get(channel).await?;
    store.delete(channel).await?;

    match gateway.delete_message(channel, roster.message_id).await {
        Ok(()) | Err(Error::MessageNotFound(_)) | Err(Error::ChannelNotFound(_)) => {}
        Err(err) => return Err(err),
    }

    tracing::info!("Deleted roster for channel {}", channel);
    Ok(())
}

async fn list(config: &Config) -> Result<()> {
    let store =
        SqliteStore::new(&config.database.url, config.database.max_connections).await?;

    let rosters = store.list().await?;
    if rosters.is_empty() {
        tracing::info!("No rosters");
        return Ok(());
    }

    for roster in rosters {
        tracing::info!(
            "Channel {} message {} roles [{}]",
            roster.channel_id,
            roster.message_id,
            roster
                .roles
                .iter()
                .map(|r| r.id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}

async fn init_db(config: &Config) -> Result<()> {
    let _store =
        SqliteStore::new(&config.database.url, config.database.max_connections).await?;
    tracing::info!("Database initialized");
    Ok(())
}

/// Parse a comma-separated list of `id=name` role pairs.
fn parse_role_list(roles: &str) -> Result<Vec<RoleRef>> {
    let mut results = Vec::new();
    for part in roles.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (id, name) = part.split_once('=').ok_or_else(|| {
            Error::InvalidInput(format!("Role '{}' must be in id=name format", part))
        })?;
        let id: RoleId = id
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Bad role id '{}'", id)))?;
        let name = name.trim().to_string();
        rosterbot::sanitize::validate_role_name(&name)?;
        results.push(RoleRef { id, name });
    }

    if results.is_empty() {
        return Err(Error::InvalidInput(
            "At least one role is required".to_string(),
        ));
    }
    Ok(results)
}
