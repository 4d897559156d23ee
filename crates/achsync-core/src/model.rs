//! Data model shared by the sync core
//!
//! Identifiers from the two namespaces are distinct newtypes so a local ID
//! can never be sent to the remote service without going through the
//! [`MappingTable`](crate::mapping::MappingTable).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Achievement identifier scoped to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalAchievementId(pub u32);

/// Achievement identifier scoped to the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteAchievementId(pub u32);

impl fmt::Display for LocalAchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RemoteAchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LocalAchievementId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<u32> for RemoteAchievementId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Achievements the player currently holds, as read from the host
///
/// Keeps the host's iteration order and drops repeated IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockedSet {
    ids: Vec<LocalAchievementId>,
}

impl UnlockedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ID, keeping first-seen order. Returns `false` if already present.
    pub fn insert(&mut self, id: LocalAchievementId) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: LocalAchievementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = LocalAchievementId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<LocalAchievementId> for UnlockedSet {
    fn from_iter<I: IntoIterator<Item = LocalAchievementId>>(iter: I) -> Self {
        let mut set = UnlockedSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl FromIterator<u32> for UnlockedSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        iter.into_iter().map(LocalAchievementId).collect()
    }
}

/// Snapshot of local IDs already accounted for at the last sync point
///
/// Captured at save-load and only grown by the engine. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    ids: HashSet<LocalAchievementId>,
}

impl Baseline {
    /// Create an empty baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the given unlocked set
    pub fn capture(current: &UnlockedSet) -> Self {
        Self {
            ids: current.iter().collect(),
        }
    }

    /// Mark an ID as seen. Returns `true` if it was not already present.
    pub fn commit(&mut self, id: LocalAchievementId) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: LocalAchievementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sorted copy of the IDs, for logs and assertions
    pub fn to_sorted_vec(&self) -> Vec<LocalAchievementId> {
        let mut ids: Vec<_> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl FromIterator<LocalAchievementId> for Baseline {
    fn from_iter<I: IntoIterator<Item = LocalAchievementId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Newly unlocked IDs for one poll, in host iteration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaBatch(pub Vec<LocalAchievementId>);

impl DeltaBatch {
    pub fn iter(&self) -> impl Iterator<Item = LocalAchievementId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for DeltaBatch {
    type Item = LocalAchievementId;
    type IntoIter = std::vec::IntoIter<LocalAchievementId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Username and password supplied by the config collaborator
///
/// # Security
///
/// The Debug implementation does NOT expose the password.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub username: String,
    pub password: String,
}

impl SessionCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Remote session bound to one save-load
///
/// `token` is the only authenticated/unauthenticated discriminator.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub host: String,
    pub game_id: u32,
    pub username: String,
    pub token: Option<String>,
    pub hardcore_mode: bool,
}

impl SessionState {
    /// Create an unauthenticated session
    pub fn new(
        host: impl Into<String>,
        game_id: u32,
        username: impl Into<String>,
        hardcore_mode: bool,
    ) -> Self {
        Self {
            host: host.into(),
            game_id,
            username: username.into(),
            token: None,
            hardcore_mode,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Build the request header the remote client expects
    pub fn header(&self, user_agent: &str) -> crate::client::RequestHeader {
        crate::client::RequestHeader {
            host: self.host.clone(),
            game_id: self.game_id,
            username: self.username.clone(),
            token: self.token.clone(),
            hardcore: self.hardcore_mode,
            user_agent: user_agent.to_string(),
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("host", &self.host)
            .field("game_id", &self.game_id)
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("hardcore_mode", &self.hardcore_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlocked_set_keeps_host_order_and_drops_repeats() {
        let set: UnlockedSet = [9u32, 3, 9, 1, 3].into_iter().collect();
        let ids: Vec<u32> = set.iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![9, 3, 1]);
    }

    #[test]
    fn baseline_commit_reports_new_ids() {
        let mut baseline = Baseline::new();
        assert!(baseline.commit(LocalAchievementId(5)));
        assert!(!baseline.commit(LocalAchievementId(5)));
        assert_eq!(baseline.len(), 1);
    }

    #[test]
    fn secrets_not_exposed_in_debug() {
        let creds = SessionCredentials::new("player", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));

        let mut state = SessionState::new("https://retroachievements.org", 1, "player", false);
        state.token = Some("secret-token".to_string());
        let debug_str = format!("{:?}", state);
        assert!(!debug_str.contains("secret-token"));
        assert!(debug_str.contains("player"));
    }
}
