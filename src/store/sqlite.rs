// SPDX-License-Identifier: PMPL-1.0-or-later
//! SQLite store implementation

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use super::{models::Roster, RosterStore};
use crate::error::{Error, Result};
use crate::gateway::{ChannelId, RoleId};
use crate::store::models::TrackedRole;

/// SQLite-backed store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rosters (
                channel_id TEXT PRIMARY KEY,
                guild_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roster_roles (
                channel_id TEXT NOT NULL REFERENCES rosters(channel_id) ON DELETE CASCADE,
                role_id TEXT NOT NULL,
                label TEXT NOT NULL,
                position INTEGER NOT NULL,
                UNIQUE(channel_id, role_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Reverse index so membership events resolve affected rosters
        // without a full scan.
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_roster_roles_role_id ON roster_roles(role_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_roles(&self, channel: ChannelId) -> Result<Vec<TrackedRole>> {
        let rows: Vec<RoleRow> = sqlx::query_as(
            "SELECT * FROM roster_roles WHERE channel_id = ? ORDER BY position ASC",
        )
        .bind(channel.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(TrackedRole {
                    id: parse_id(&row.role_id)?,
                    label: row.label,
                })
            })
            .collect()
    }

    async fn assemble(&self, row: RosterRow) -> Result<Roster> {
        let channel: ChannelId = parse_id(&row.channel_id)?;
        let roles = self.load_roles(channel).await?;

        Ok(Roster {
            channel_id: channel,
            guild_id: parse_id(&row.guild_id)?,
            message_id: parse_id(&row.message_id)?,
            description: row.description,
            roles,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[async_trait]
impl RosterStore for SqliteStore {
    async fn create(&self, roster: &Roster) -> Result<()> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT channel_id FROM rosters WHERE channel_id = ?")
                .bind(roster.channel_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_some() {
            return Err(Error::DuplicateRoster(roster.channel_id));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rosters (
                channel_id, guild_id, message_id, description, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(roster.channel_id.to_string())
        .bind(roster.guild_id.to_string())
        .bind(roster.message_id.to_string())
        .bind(&roster.description)
        .bind(roster.created_at.to_rfc3339())
        .bind(roster.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, role) in roster.roles.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO roster_roles (channel_id, role_id, label, position)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(roster.channel_id.to_string())
            .bind(role.id.to_string())
            .bind(&role.label)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, channel: ChannelId) -> Result<Roster> {
        let row: Option<RosterRow> = sqlx::query_as("SELECT * FROM rosters WHERE channel_id = ?")
            .bind(channel.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => self.assemble(row).await,
            None => Err(Error::RosterNotFound(channel)),
        }
    }

    async fn delete(&self, channel: ChannelId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM roster_roles WHERE channel_id = ?")
            .bind(channel.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM rosters WHERE channel_id = ?")
            .bind(channel.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RosterNotFound(channel));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Roster>> {
        let rows: Vec<RosterRow> = sqlx::query_as("SELECT * FROM rosters ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut rosters = Vec::with_capacity(rows.len());
        for row in rows {
            rosters.push(self.assemble(row).await?);
        }
        Ok(rosters)
    }

    async fn find_by_role(&self, role: RoleId) -> Result<Vec<Roster>> {
        let rows: Vec<RosterRow> = sqlx::query_as(
            r#"
            SELECT r.* FROM rosters r
            JOIN roster_roles rr ON rr.channel_id = r.channel_id
            WHERE rr.role_id = ?
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(role.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut rosters = Vec::with_capacity(rows.len());
        for row in rows {
            rosters.push(self.assemble(row).await?);
        }
        Ok(rosters)
    }

    async fn set_description(&self, channel: ChannelId, description: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE rosters SET description = ?, updated_at = ? WHERE channel_id = ?",
        )
        .bind(description)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(channel.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RosterNotFound(channel));
        }
        Ok(())
    }
}

// =============================================================================
// Row types for sqlx
// =============================================================================

#[derive(sqlx::FromRow)]
struct RosterRow {
    channel_id: String,
    guild_id: String,
    message_id: String,
    description: String,
    created_at: String,
    updated_at: String,
}

#[derive(sqlx::FromRow)]
struct RoleRow {
    #[allow(dead_code)]
    channel_id: String,
    role_id: String,
    label: String,
    #[allow(dead_code)]
    position: i64,
}

fn parse_id<T>(s: &str) -> Result<T>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    s.parse()
        .map_err(|e| Error::Internal(format!("Bad id '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| Error::Internal(e.to_string()))
}
