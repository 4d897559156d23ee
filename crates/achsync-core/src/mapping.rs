//! Local → remote achievement ID translation
//!
//! The table is plain data: it can be built in code, deserialized from a
//! JSON object keyed by local ID, or loaded from a file.
//!
//! ```json
//! { "5": 483647, "12": 483650 }
//! ```

use crate::error::{Error, Result};
use crate::model::{LocalAchievementId, RemoteAchievementId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Fixed mapping from local to remote achievement IDs
///
/// An unmapped local ID is an expected condition: the remote game does
/// not track every local achievement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: HashMap<LocalAchievementId, RemoteAchievementId>,
}

impl MappingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(local, remote)` pairs. Later pairs win on duplicate keys.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        pairs
            .into_iter()
            .map(|(local, remote)| (LocalAchievementId(local), RemoteAchievementId(remote)))
            .collect()
    }

    /// Parse a JSON object keyed by local ID
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON mapping file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Failed to read mapping file {}: {}", path.display(), e))
        })?;

        let table = Self::from_json_str(&content).map_err(|e| {
            Error::config(format!("Failed to parse mapping file {}: {}", path.display(), e))
        })?;

        tracing::debug!("Loaded {} achievement mappings from {}", table.len(), path.display());
        Ok(table)
    }

    /// Remote ID for a local achievement, or `None` when unmapped
    pub fn resolve(&self, id: LocalAchievementId) -> Option<RemoteAchievementId> {
        self.entries.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(LocalAchievementId, RemoteAchievementId)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (LocalAchievementId, RemoteAchievementId)>>(
        iter: I,
    ) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolve_is_stable() {
        let table = MappingTable::from_pairs([(5, 483647), (3, 300)]);

        for _ in 0..3 {
            assert_eq!(
                table.resolve(LocalAchievementId(5)),
                Some(RemoteAchievementId(483647))
            );
        }
        assert_eq!(table.resolve(LocalAchievementId(42)), None);
    }

    #[test]
    fn later_pairs_override_earlier() {
        let table = MappingTable::from_pairs([(1, 10), (1, 11)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(LocalAchievementId(1)), Some(RemoteAchievementId(11)));
    }

    #[test]
    fn parses_json_object_keyed_by_local_id() {
        let table = MappingTable::from_json_str(r#"{ "5": 483647, "12": 483650 }"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.resolve(LocalAchievementId(12)),
            Some(RemoteAchievementId(483650))
        );
    }

    #[test]
    fn rejects_non_numeric_keys() {
        assert!(MappingTable::from_json_str(r#"{ "five": 1 }"#).is_err());
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "3": 300 }}"#).unwrap();

        let table = MappingTable::load(file.path()).await.unwrap();
        assert_eq!(table.resolve(LocalAchievementId(3)), Some(RemoteAchievementId(300)));
    }

    #[tokio::test]
    async fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MappingTable::load(dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
