use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the audience list inside the data directory.
pub const AUDIENCE_FILE: &str = "users_groups.json";

/// Everyone who has talked to the bot: users and the servers they did it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audience {
    #[serde(default)]
    pub users: Vec<u64>,
    #[serde(default)]
    pub groups: Vec<u64>,
}

/// JSON-file backed audience list. Loading and saving are explicit; nothing
/// touches the disk behind the caller's back.
pub struct AudienceStore {
    path: PathBuf,
    audience: Audience,
}

impl AudienceStore {
    /// Reads the file at `path`, starting empty when it does not exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let audience = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("📁 No audience file at {}, starting empty", path.display());
                Audience::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "📂 Audience loaded: {} users, {} groups",
            audience.users.len(),
            audience.groups.len()
        );
        Ok(Self { path, audience })
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.audience)?;
        fs::write(&self.path, content).await?;
        debug!("💾 Audience saved to {}", self.path.display());
        Ok(())
    }

    /// Returns true if the user was not known before.
    pub fn record_user(&mut self, user_id: u64) -> bool {
        insert_unique(&mut self.audience.users, user_id)
    }

    /// Returns true if the group was not known before.
    pub fn record_group(&mut self, group_id: u64) -> bool {
        insert_unique(&mut self.audience.groups, group_id)
    }

    pub fn audience(&self) -> &Audience {
        &self.audience
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn insert_unique(list: &mut Vec<u64>, id: u64) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudienceStore::load(dir.path().join(AUDIENCE_FILE)).await.unwrap();
        assert_eq!(store.audience(), &Audience::default());
    }

    #[tokio::test]
    async fn test_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(AUDIENCE_FILE);

        let mut store = AudienceStore::load(&path).await.unwrap();
        assert!(store.record_user(10));
        assert!(!store.record_user(10));
        assert!(store.record_group(99));
        store.save().await.unwrap();

        let reloaded = AudienceStore::load(&path).await.unwrap();
        assert_eq!(
            reloaded.audience(),
            &Audience {
                users: vec![10],
                groups: vec![99],
            }
        );
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AUDIENCE_FILE);
        tokio::fs::write(&path, r#"{"users":[1,2]}"#).await.unwrap();

        let store = AudienceStore::load(&path).await.unwrap();
        assert_eq!(store.audience().users, vec![1, 2]);
        assert!(store.audience().groups.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(AUDIENCE_FILE);
        tokio::fs::write(&path, "{not json").await.unwrap();

        assert!(AudienceStore::load(&path).await.is_err());
    }
}
