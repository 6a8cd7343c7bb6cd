//! Flat JSON-array file store.

use crate::error::{StoreError, StoreResult};
use crate::store::{NewUser, User, UserStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Stores all users as one pretty-printed JSON array.
///
/// Mutations are serialized through a single writer lock and land via
/// write-to-temp + rename, so a reader never sees a half-written file and
/// two creates never compute the same id.
pub struct JsonFileStore {
    path: PathBuf,
    writer: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    async fn load(&self) -> StoreResult<Vec<User>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Record file {} missing, treating as empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: self.path.display().to_string(),
            source,
        })
    }

    async fn save(&self, users: &[User]) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(users).map_err(|source| StoreError::Malformed {
            path: self.path.display().to_string(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

/// Next id: one past the largest existing id.
fn next_id(users: &[User]) -> u64 {
    users.iter().map(|u| u.id).max().unwrap_or(0) + 1
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn all(&self) -> StoreResult<Vec<User>> {
        self.load().await
    }

    async fn find(&self, id: u64) -> StoreResult<User> {
        self.load()
            .await?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or(StoreError::UserNotFound)
    }

    #[instrument(skip(self, user), fields(path = %self.path.display()))]
    async fn create(&self, user: NewUser) -> StoreResult<u64> {
        let _guard = self.writer.lock().await;

        let mut users = self.load().await?;
        let id = next_id(&users);
        users.push(user.with_id(id));
        self.save(&users).await?;

        info!("Created user {}", id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            name: name.into(),
            email: format!("{}@x.com", name.to_lowercase()),
            address: "addr".into(),
            phone: "555".into(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("users.json"));
        assert!(store.all().await.unwrap().is_empty());
        assert!(matches!(store.find(1).await, Err(StoreError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let store = JsonFileStore::new(&path);

        assert_eq!(store.create(new_user("A")).await.unwrap(), 1);
        assert_eq!(store.create(new_user("B")).await.unwrap(), 2);

        let on_disk: Vec<User> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert_eq!(on_disk[1].name, "B");
        assert_eq!(store.find(2).await.unwrap().email, "b@x.com");
    }

    #[tokio::test]
    async fn test_id_skips_past_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let existing = vec![new_user("A").with_id(1), new_user("C").with_id(3)];
        std::fs::write(&path, serde_json::to_vec(&existing).unwrap()).unwrap();

        let store = JsonFileStore::new(&path);
        assert_eq!(store.create(new_user("D")).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_creates_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("users.json")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create(new_user(&format!("U{i}"))).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(store.all().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.all().await,
            Err(StoreError::Malformed { .. })
        ));
        assert!(store.create(new_user("A")).await.is_err());
    }
}
