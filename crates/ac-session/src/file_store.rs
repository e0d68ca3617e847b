//! File-backed `SessionStore`: one JSON file per session under
//! `<root>/sessions/<id>.json`, mirroring the directory-per-session layout
//! the original file-backed store uses, minus its git-versioning and
//! per-tool metadata concerns which don't apply to this core.

use crate::store::{SessionStore, StoreResult};
use ac_core::{CoreError, Session, SessionId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

pub struct FileSessionStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), lock: RwLock::new(()) }
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.root.join(format!("{}.json", id.as_str()))
    }

    async fn read(&self, id: &SessionId) -> StoreResult<Session> {
        let path = self.path_for(id);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| CoreError::NotFound(format!("session {}", id.as_str())))?;
        serde_json::from_str(&contents)
            .map_err(|err| CoreError::DatabaseError(format!("corrupt session file {}: {err}", path.display())))
    }

    async fn write(&self, session: &Session) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| CoreError::DatabaseError(err.to_string()))?;
        let path = self.path_for(&session.id);
        let contents = serde_json::to_string_pretty(session)
            .map_err(|err| CoreError::DatabaseError(err.to_string()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|err| CoreError::DatabaseError(err.to_string()))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        let _guard = self.lock.write().await;
        self.write(&session).await?;
        Ok(session)
    }

    async fn create_task_session(
        &self,
        tool_call_id: &str,
        parent_id: &SessionId,
        title: &str,
    ) -> StoreResult<Session> {
        let _guard = self.lock.write().await;
        let session_id = SessionId::deterministic(&format!("task:{tool_call_id}"));
        if let Ok(existing) = self.read(&session_id).await {
            debug!(%session_id, tool_call_id, "resuming existing task session");
            return Ok(existing);
        }

        let parent = self.read(parent_id).await?;
        let mut child = Session::new_child(&parent, title.to_string());
        child.id = session_id;
        self.write(&child).await?;
        debug!(%session_id, %parent_id, tool_call_id, "created task session");
        Ok(child)
    }

    async fn create_title_session(&self, parent_id: &SessionId) -> StoreResult<Session> {
        let _guard = self.lock.write().await;
        let session_id = SessionId::deterministic(&format!("title:{}", parent_id.as_str()));
        if let Ok(existing) = self.read(&session_id).await {
            return Ok(existing);
        }
        let parent = self.read(parent_id).await?;
        let mut title_session = Session::new_child(&parent, "title".to_string());
        title_session.id = session_id;
        self.write(&title_session).await?;
        Ok(title_session)
    }

    async fn get(&self, id: &SessionId) -> StoreResult<Session> {
        let _guard = self.lock.read().await;
        self.read(id).await
    }

    async fn save(&self, session: &Session) -> StoreResult<()> {
        let _guard = self.lock.write().await;
        self.write(session).await
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        let _guard = self.lock.write().await;
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(session_id = %id, "deleted session");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CoreError::DatabaseError(err.to_string())),
        }
    }

    async fn list_children(&self, parent_id: &SessionId) -> StoreResult<Vec<Session>> {
        let _guard = self.lock.read().await;
        let mut children = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(children),
            Err(err) => return Err(CoreError::DatabaseError(err.to_string())),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| CoreError::DatabaseError(e.to_string()))? {
            let path: &Path = &entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| CoreError::DatabaseError(e.to_string()))?;
            if let Ok(session) = serde_json::from_str::<Session>(&contents) {
                if session.parent_session_id.as_ref() == Some(parent_id) {
                    children.push(session);
                }
            }
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn project_id() -> String {
        "proj".to_string()
    }

    #[tokio::test]
    async fn create_and_get_roundtrips() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let session = Session::new_root(project_id(), dir.path().to_path_buf());
        let created = store.create(session.clone()).await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[tokio::test]
    async fn get_missing_session_returns_not_found() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let err = store.get(&SessionId::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_task_session_is_idempotent_per_tool_call_id() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let parent = store.create(Session::new_root(project_id(), dir.path().to_path_buf())).await.unwrap();

        let first = store.create_task_session("call-1", &parent.id, "t").await.unwrap();
        let second = store.create_task_session("call-1", &parent.id, "t").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn list_children_returns_only_direct_children() {
        let dir = tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let parent = store.create(Session::new_root(project_id(), dir.path().to_path_buf())).await.unwrap();
        let child = store.create_task_session("call-1", &parent.id, "t").await.unwrap();
        let grandchild = store.create_task_session("call-2", &child.id, "t").await.unwrap();

        let children = store.list_children(&parent.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        let grandchildren = store.list_children(&child.id).await.unwrap();
        assert_eq!(grandchildren.len(), 1);
        assert_eq!(grandchildren[0].id, grandchild.id);
    }
}
