//! File-backed `MessageStore`: one JSON file per message under
//! `<root>/<session-id>/<message-id>.json`, mirroring the directory-per-session
//! layout [`crate::file_store::FileSessionStore`] uses for session metadata.

use crate::store::{MessageStore, StoreResult};
use ac_core::{CoreError, Message, SessionId};
use async_trait::async_trait;
use tokio::sync::RwLock;
use std::path::PathBuf;
use tracing::debug;

pub struct FileMessageStore {
    root: PathBuf,
    lock: RwLock<()>,
}

impl FileMessageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), lock: RwLock::new(()) }
    }

    fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    fn path_for(&self, message: &Message) -> PathBuf {
        self.session_dir(&message.session_id).join(format!("{}.json", message.id.as_str()))
    }

    async fn write(&self, message: &Message) -> StoreResult<()> {
        let dir = self.session_dir(&message.session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| CoreError::DatabaseError(err.to_string()))?;
        let contents = serde_json::to_string_pretty(message)
            .map_err(|err| CoreError::DatabaseError(err.to_string()))?;
        tokio::fs::write(self.path_for(message), contents)
            .await
            .map_err(|err| CoreError::DatabaseError(err.to_string()))
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn append(&self, message: &Message) -> StoreResult<()> {
        let _guard = self.lock.write().await;
        self.write(message).await
    }

    async fn update(&self, message: &Message) -> StoreResult<()> {
        let _guard = self.lock.write().await;
        debug!(session_id = %message.session_id, message_id = %message.id.as_str(), "updating persisted message");
        self.write(message).await
    }

    async fn list(&self, session_id: &SessionId) -> StoreResult<Vec<Message>> {
        let _guard = self.lock.read().await;
        let dir = self.session_dir(session_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CoreError::DatabaseError(err.to_string())),
        };

        let mut messages = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CoreError::DatabaseError(e.to_string()))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CoreError::DatabaseError(e.to_string()))?;
            let message: Message = serde_json::from_str(&contents)
                .map_err(|err| CoreError::DatabaseError(format!("corrupt message file {}: {err}", path.display())))?;
            messages.push(message);
        }
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_core::{ContentPart, Role};
    use tempfile::tempdir;

    fn text_message(session_id: SessionId, role: Role, text: &str) -> Message {
        let mut message = Message::new(session_id, role);
        message.parts.push(ContentPart::Text { text: text.into() });
        message
    }

    #[tokio::test]
    async fn append_and_list_roundtrips_in_creation_order() {
        let dir = tempdir().unwrap();
        let store = FileMessageStore::new(dir.path());
        let session_id = SessionId::new();

        let first = text_message(session_id, Role::User, "hi");
        let second = text_message(session_id, Role::Assistant, "hello");
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let listed = store.list(&session_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn list_for_unknown_session_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileMessageStore::new(dir.path());
        let listed = store.list(&SessionId::new()).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn update_overwrites_the_persisted_message() {
        let dir = tempdir().unwrap();
        let store = FileMessageStore::new(dir.path());
        let session_id = SessionId::new();

        let mut message = text_message(session_id, Role::Assistant, "partial");
        store.append(&message).await.unwrap();

        message.parts = vec![ContentPart::Text { text: "partial and done".into() }];
        store.update(&message).await.unwrap();

        let listed = store.list(&session_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        match &listed[0].parts[0] {
            ContentPart::Text { text } => assert_eq!(text, "partial and done"),
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[tokio::test]
    async fn messages_from_different_sessions_do_not_collide() {
        let dir = tempdir().unwrap();
        let store = FileMessageStore::new(dir.path());
        let session_a = SessionId::new();
        let session_b = SessionId::new();

        store.append(&text_message(session_a, Role::User, "a")).await.unwrap();
        store.append(&text_message(session_b, Role::User, "b")).await.unwrap();

        assert_eq!(store.list(&session_a).await.unwrap().len(), 1);
        assert_eq!(store.list(&session_b).await.unwrap().len(), 1);
    }
}
