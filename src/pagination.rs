// SPDX-License-Identifier: PMPL-1.0-or-later
//! Paginated listing controller
//!
//! `paginate` turns an ordered list of (name, value) pairs into page
//! embeds bounded by the platform field limit. `PaginationSession` is the
//! interactive viewer: owner-scoped, expiring, with clamped navigation.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::embed::MAX_EMBED_FIELDS;
use crate::gateway::{Embed, EmbedField, MessageId, UserId};

/// Body used for the single page produced from an empty listing.
pub const NO_ENTRIES: &str = "There are no entries to show.";

/// Split `entries` into page embeds of at most `page_size` fields each.
///
/// `page_size` is clamped to the platform's per-embed field limit. An
/// empty input yields exactly one page carrying the no-entries marker;
/// zero pages are never produced.
pub fn paginate(entries: &[(String, String)], page_size: usize, header: &str) -> Vec<Embed> {
    let page_size = page_size.clamp(1, MAX_EMBED_FIELDS);

    if entries.is_empty() {
        return vec![Embed {
            description: format!("{}\n\n{}", header, NO_ENTRIES),
            fields: vec![],
        }];
    }

    let chunks: Vec<&[(String, String)]> = entries.chunks(page_size).collect();
    let total = chunks.len();

    chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| Embed {
            description: format!("{}\n\nPage {} of {}", header, index + 1, total),
            fields: chunk
                .iter()
                .map(|(name, value)| EmbedField {
                    name: name.clone(),
                    value: value.clone(),
                    inline: false,
                })
                .collect(),
        })
        .collect()
}

/// Navigation transitions of the interactive viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    First,
    Previous,
    Next,
    Last,
}

impl NavAction {
    /// Parse a component custom id of the form `roster-nav:<action>`.
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id.strip_prefix("roster-nav:")? {
            "first" => Some(Self::First),
            "previous" => Some(Self::Previous),
            "next" => Some(Self::Next),
            "last" => Some(Self::Last),
            _ => None,
        }
    }
}

/// Outcome of a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The session moved (or stayed, on a boundary no-op); show this page.
    Page(Embed),
    /// The attempt was rejected; show the notice to the attempting user
    /// only.
    Denied(String),
    /// The session expired; controls are inert.
    Expired,
}

/// One interactive paginated view: pages, cursor, owner, and deadline.
#[derive(Debug, Clone)]
pub struct PaginationSession {
    pages: Vec<Embed>,
    index: usize,
    owner: UserId,
    expires_at: DateTime<Utc>,
    anyone_can_navigate: bool,
}

impl PaginationSession {
    pub fn new(
        owner: UserId,
        pages: Vec<Embed>,
        ttl: Duration,
        anyone_can_navigate: bool,
    ) -> Self {
        debug_assert!(!pages.is_empty(), "paginate never yields zero pages");
        Self {
            pages,
            index: 0,
            owner,
            expires_at: Utc::now() + ttl,
            anyone_can_navigate,
        }
    }

    pub fn current(&self) -> &Embed {
        &self.pages[self.index]
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Apply a navigation attempt by `user`.
    ///
    /// Transitions clamp to the valid page range; moving previous from the
    /// first page or next from the last is a no-op, not an error.
    pub fn navigate(&mut self, user: UserId, action: NavAction) -> NavOutcome {
        if self.is_expired() {
            return NavOutcome::Expired;
        }

        if user != self.owner && !self.anyone_can_navigate {
            return NavOutcome::Denied(
                "Only the user who ran the command can turn these pages.".to_string(),
            );
        }

        let last = self.pages.len() - 1;
        self.index = match action {
            NavAction::First => 0,
            NavAction::Previous => self.index.saturating_sub(1),
            NavAction::Next => (self.index + 1).min(last),
            NavAction::Last => last,
        };

        NavOutcome::Page(self.current().clone())
    }
}

/// Live pagination sessions, keyed by the listing reply's message id.
///
/// Expiry is enforced lazily on navigation and reaped by `sweep_expired`
/// from the serve loop.
#[derive(Default)]
pub struct SessionMap {
    inner: Mutex<HashMap<MessageId, PaginationSession>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, message: MessageId, session: PaginationSession) {
        self.inner.lock().await.insert(message, session);
    }

    /// Drive a navigation attempt against the session attached to
    /// `message`. Returns None when no session exists (stale controls on
    /// an old listing).
    pub async fn navigate(
        &self,
        message: MessageId,
        user: UserId,
        action: NavAction,
    ) -> Option<NavOutcome> {
        let mut sessions = self.inner.lock().await;
        let session = sessions.get_mut(&message)?;
        Some(session.navigate(user, action))
    }

    /// Drop expired sessions, returning how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut sessions = self.inner.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired());
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(n: usize) -> Vec<(String, String)> {
        (0..n)
            .map(|i| (format!("name {}", i), format!("value {}", i)))
            .collect()
    }

    #[test]
    fn empty_input_yields_exactly_one_page() {
        let pages = paginate(&[], 5, "Rosters");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].description.contains(NO_ENTRIES));
        assert!(pages[0].fields.is_empty());
    }

    #[test]
    fn twelve_entries_at_page_size_five_split_five_five_two() {
        let pages = paginate(&entries(12), 5, "Rosters");
        let sizes: Vec<usize> = pages.iter().map(|p| p.fields.len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
    }

    #[test]
    fn pages_carry_header_and_indicator() {
        let pages = paginate(&entries(12), 5, "Rosters");
        assert!(pages[0].description.starts_with("Rosters"));
        assert!(pages[0].description.contains("Page 1 of 3"));
        assert!(pages[2].description.contains("Page 3 of 3"));
    }

    #[test]
    fn page_size_is_clamped_to_field_limit() {
        let pages = paginate(&entries(30), 100, "Rosters");
        assert_eq!(pages[0].fields.len(), MAX_EMBED_FIELDS);
    }

    fn session(pages: usize) -> PaginationSession {
        PaginationSession::new(
            UserId(1),
            paginate(&entries(pages * 5), 5, "Rosters"),
            Duration::seconds(60),
            false,
        )
    }

    #[test]
    fn previous_from_first_page_stays_put() {
        let mut s = session(3);
        match s.navigate(UserId(1), NavAction::Previous) {
            NavOutcome::Page(page) => assert!(page.description.contains("Page 1 of 3")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn next_from_last_page_stays_put() {
        let mut s = session(3);
        s.navigate(UserId(1), NavAction::Last);
        match s.navigate(UserId(1), NavAction::Next) {
            NavOutcome::Page(page) => assert!(page.description.contains("Page 3 of 3")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn first_and_last_are_idempotent() {
        let mut s = session(3);
        s.navigate(UserId(1), NavAction::Last);
        s.navigate(UserId(1), NavAction::Last);
        match s.navigate(UserId(1), NavAction::First) {
            NavOutcome::Page(page) => assert!(page.description.contains("Page 1 of 3")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        match s.navigate(UserId(1), NavAction::First) {
            NavOutcome::Page(page) => assert!(page.description.contains("Page 1 of 3")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn non_owner_navigation_is_denied_with_a_notice() {
        let mut s = session(2);
        match s.navigate(UserId(2), NavAction::Next) {
            NavOutcome::Denied(notice) => assert!(!notice.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn anyone_can_navigate_when_configured() {
        let mut s = PaginationSession::new(
            UserId(1),
            paginate(&entries(10), 5, "Rosters"),
            Duration::seconds(60),
            true,
        );
        match s.navigate(UserId(2), NavAction::Next) {
            NavOutcome::Page(page) => assert!(page.description.contains("Page 2 of 2")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn expired_session_rejects_navigation() {
        let mut s = PaginationSession::new(
            UserId(1),
            paginate(&entries(10), 5, "Rosters"),
            Duration::seconds(-1),
            false,
        );
        assert_eq!(s.navigate(UserId(1), NavAction::Next), NavOutcome::Expired);
    }

    #[test]
    fn custom_ids_parse_to_actions() {
        assert_eq!(
            NavAction::from_custom_id("roster-nav:next"),
            Some(NavAction::Next)
        );
        assert_eq!(NavAction::from_custom_id("roster-nav:sideways"), None);
        assert_eq!(NavAction::from_custom_id("other:next"), None);
    }

    #[tokio::test]
    async fn sweep_drops_only_expired_sessions() {
        let map = SessionMap::new();
        map.insert(
            MessageId(1),
            PaginationSession::new(
                UserId(1),
                paginate(&[], 5, "Rosters"),
                Duration::seconds(-1),
                false,
            ),
        )
        .await;
        map.insert(MessageId(2), session(2)).await;

        assert_eq!(map.sweep_expired().await, 1);
        assert_eq!(map.len().await, 1);
    }

    #[tokio::test]
    async fn navigation_against_unknown_message_returns_none() {
        let map = SessionMap::new();
        assert!(map
            .navigate(MessageId(9), UserId(1), NavAction::Next)
            .await
            .is_none());
    }
}
