// SPDX-License-Identifier: PMPL-1.0-or-later
//! Roster synchronization engine
//!
//! Consumes membership-change events, resolves the rosters tracking each
//! changed role through the store's reverse index, and patches the pinned
//! roster messages through the gateway.
//!
//! Updates to the same roster are serialized through a per-channel mutex
//! held across the fetch/edit pair, so two events touching one roster
//! cannot overwrite each other's patch. Updates to different rosters run
//! concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::embed::{add_member, remove_member, role_label};
use crate::error::{Error, Result};
use crate::gateway::{ChannelId, ChatGateway, GuildId, RoleRef, UserId};
use crate::store::models::Roster;
use crate::store::RosterStore;

/// A member's role-set change, derived by diffing the relayed before and
/// after role lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipChange {
    pub guild_id: GuildId,
    pub member: UserId,
    pub added: Vec<RoleRef>,
    pub removed: Vec<RoleRef>,
}

impl MembershipChange {
    /// Diff two role lists into added and removed sets (compared by id).
    pub fn diff(guild_id: GuildId, member: UserId, before: &[RoleRef], after: &[RoleRef]) -> Self {
        let added = after
            .iter()
            .filter(|role| !before.iter().any(|b| b.id == role.id))
            .cloned()
            .collect();
        let removed = before
            .iter()
            .filter(|role| !after.iter().any(|a| a.id == role.id))
            .cloned()
            .collect();

        Self {
            guild_id,
            member,
            added,
            removed,
        }
    }

    /// True when the notification carried no role change.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

enum FieldOp {
    Add,
    Remove,
}

/// Synchronization engine patching roster messages on membership changes
pub struct SyncEngine {
    store: Arc<dyn RosterStore>,
    gateway: Arc<dyn ChatGateway>,
    /// Per-channel update locks; the serialization unit for roster edits.
    locks: Mutex<HashMap<ChannelId, Arc<Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn RosterStore>, gateway: Arc<dyn ChatGateway>) -> Self {
        Self {
            store,
            gateway,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one membership-change event.
    ///
    /// Failures are logged and isolated per roster; this never returns an
    /// error because there is no interactive caller to surface one to.
    pub async fn apply(&self, change: &MembershipChange) {
        if change.is_noop() {
            return;
        }

        tracing::debug!(
            "Membership change for {}: +{} roles, -{} roles",
            change.member,
            change.added.len(),
            change.removed.len()
        );

        for role in &change.added {
            self.sync_role(change.member, role, FieldOp::Add).await;
        }
        for role in &change.removed {
            self.sync_role(change.member, role, FieldOp::Remove).await;
        }
    }

    /// Patch every roster tracking `role`. One roster's failure must not
    /// prevent processing the remaining matches.
    async fn sync_role(&self, member: UserId, role: &RoleRef, op: FieldOp) {
        let rosters = match self.store.find_by_role(role.id).await {
            Ok(rosters) => rosters,
            Err(err) => {
                tracing::error!("Roster lookup for role {} failed: {}", role.id, err);
                return;
            }
        };

        for roster in rosters {
            match self.patch_roster(&roster, member, role, &op).await {
                Ok(()) => {}
                Err(
                    err @ (Error::ChannelNotFound(_)
                    | Error::MessageNotFound(_)
                    | Error::RosterNotFound(_)),
                ) => {
                    // The message or channel is gone; skip this roster for
                    // this event rather than failing the rest.
                    tracing::warn!(
                        "Skipping roster for channel {}: {}",
                        roster.channel_id,
                        err
                    );
                }
                Err(err) => {
                    let failure = Error::Sync(format!(
                        "patching roster for channel {}: {}",
                        roster.channel_id, err
                    ));
                    tracing::error!("{}", failure);
                }
            }
        }
    }

    async fn patch_roster(
        &self,
        roster: &Roster,
        member: UserId,
        role: &RoleRef,
        op: &FieldOp,
    ) -> Result<()> {
        let lock = self.roster_lock(roster.channel_id).await;
        let _guard = lock.lock().await;

        let message = self
            .gateway
            .fetch_message(roster.channel_id, roster.message_id)
            .await?;
        let embed = message.embeds.first().cloned().unwrap_or_default();

        // Labels are derived from the role's current name; a renamed role
        // no longer matches its stored field and the patch is a no-op.
        let label = role_label(&role.name);
        let patched = match op {
            FieldOp::Add => add_member(&embed, &label, member),
            FieldOp::Remove => remove_member(&embed, &label, member),
        };

        if patched == embed {
            tracing::debug!(
                "No field {} on roster message {}; nothing to edit",
                label,
                roster.message_id
            );
            return Ok(());
        }

        self.gateway
            .edit_embed(roster.channel_id, roster.message_id, &patched)
            .await
    }

    async fn roster_lock(&self, channel: ChannelId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(channel)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::build_roster_embed;
    use crate::gateway::{MemoryGateway, MessageId, RoleId};
    use crate::store::models::TrackedRole;
    use crate::store::SqliteStore;

    const GUILD: GuildId = GuildId(10);
    const CHANNEL: ChannelId = ChannelId(1);
    const MESSAGE: MessageId = MessageId(1001);

    fn maths() -> RoleRef {
        RoleRef {
            id: RoleId(100),
            name: "Maths Helper".to_string(),
        }
    }

    async fn engine_with_roster() -> (Arc<MemoryGateway>, Arc<SqliteStore>, SyncEngine) {
        let gateway = Arc::new(MemoryGateway::new());
        let store = Arc::new(SqliteStore::new("sqlite::memory:", 1).await.unwrap());

        let roster = Roster::new(
            CHANNEL,
            GUILD,
            MESSAGE,
            "Helpers:".to_string(),
            vec![TrackedRole::from(&maths())],
        );
        store.create(&roster).await.unwrap();
        gateway
            .put_message(
                CHANNEL,
                MESSAGE,
                build_roster_embed("Helpers:", &[("**Maths Helper**".to_string(), vec![])]),
            )
            .await;

        let engine = SyncEngine::new(store.clone(), gateway.clone());
        (gateway, store, engine)
    }

    fn gained(member: UserId, role: RoleRef) -> MembershipChange {
        MembershipChange::diff(GUILD, member, &[], &[role])
    }

    fn lost(member: UserId, role: RoleRef) -> MembershipChange {
        MembershipChange::diff(GUILD, member, &[role], &[])
    }

    #[test]
    fn diff_detects_added_and_removed() {
        let before = vec![maths()];
        let after = vec![RoleRef {
            id: RoleId(200),
            name: "Physics Helper".to_string(),
        }];
        let change = MembershipChange::diff(GUILD, UserId(5), &before, &after);
        assert_eq!(change.added.len(), 1);
        assert_eq!(change.added[0].id, RoleId(200));
        assert_eq!(change.removed.len(), 1);
        assert_eq!(change.removed[0].id, RoleId(100));
    }

    #[test]
    fn diff_of_identical_role_sets_is_noop() {
        let roles = vec![maths()];
        let change = MembershipChange::diff(GUILD, UserId(5), &roles, &roles);
        assert!(change.is_noop());
    }

    #[tokio::test]
    async fn gaining_a_role_appends_the_mention() {
        let (gateway, _store, engine) = engine_with_roster().await;

        engine.apply(&gained(UserId(5), maths())).await;

        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        assert_eq!(embed.fields[0].value, "<@5>");
    }

    #[tokio::test]
    async fn losing_a_role_removes_the_mention() {
        let (gateway, _store, engine) = engine_with_roster().await;

        engine.apply(&gained(UserId(5), maths())).await;
        engine.apply(&gained(UserId(6), maths())).await;
        engine.apply(&lost(UserId(5), maths())).await;

        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        assert_eq!(embed.fields[0].value, "<@6>");
    }

    #[tokio::test]
    async fn duplicate_notification_appends_twice() {
        let (gateway, _store, engine) = engine_with_roster().await;

        engine.apply(&gained(UserId(5), maths())).await;
        engine.apply(&gained(UserId(5), maths())).await;

        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        assert_eq!(embed.fields[0].value, "<@5>\n<@5>");
    }

    #[tokio::test]
    async fn untracked_role_changes_are_ignored() {
        let (gateway, _store, engine) = engine_with_roster().await;
        let untracked = RoleRef {
            id: RoleId(999),
            name: "Moderator".to_string(),
        };

        engine.apply(&gained(UserId(5), untracked)).await;

        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        assert_eq!(embed.fields[0].value, "");
    }

    #[tokio::test]
    async fn deleted_message_is_skipped_not_fatal() {
        let (gateway, store, engine) = engine_with_roster().await;

        // Second roster cross-listing the same role, whose message is gone.
        let dead = Roster::new(
            ChannelId(2),
            GUILD,
            MessageId(2002),
            "Helpers:".to_string(),
            vec![TrackedRole::from(&maths())],
        );
        store.create(&dead).await.unwrap();

        engine.apply(&gained(UserId(5), maths())).await;

        // The surviving roster is still patched.
        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        assert_eq!(embed.fields[0].value, "<@5>");
    }

    #[tokio::test]
    async fn concurrent_events_on_one_roster_do_not_lose_updates() {
        let (gateway, _store, engine) = engine_with_roster().await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for user in 1..=8u64 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.apply(&gained(UserId(user), maths())).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let embed = gateway.embed_of(CHANNEL, MESSAGE).await.unwrap();
        let mut mentions: Vec<_> = embed.fields[0].value.lines().collect();
        mentions.sort();
        assert_eq!(mentions.len(), 8, "every concurrent patch must survive");
    }
}
