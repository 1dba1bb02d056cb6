//! Client-side state kept on behalf of each browser: the form draft, the
//! last-used draft copy, and "already submitted" markers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;

pub const DRAFT_KEY: &str = "internship_form_draft";
pub const LAST_TITLE_KEY: &str = "internship_form_last_title";
pub const LAST_DESCRIPTION_KEY: &str = "internship_form_last_description";

/// Scope of requests that carry no client id. Shared by everyone, so it never
/// holds per-applicant state.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

pub fn submission_marker_key(form_id: Uuid) -> String {
    format!("internship_submission_{form_id}")
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct RedisKvStore {
    conn: MultiplexedConnection,
}

impl RedisKvStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, AppError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// A `KvStore` view restricted to one client's keys.
#[derive(Clone)]
pub struct ClientStore {
    kv: Arc<dyn KvStore>,
    client_id: String,
}

impl ClientStore {
    pub fn new(kv: Arc<dyn KvStore>, client_id: impl Into<String>) -> Self {
        Self {
            kv,
            client_id: client_id.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.client_id == ANONYMOUS_CLIENT
    }

    fn scoped(&self, key: &str) -> String {
        format!("intake:{}:{key}", self.client_id)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.kv.get(&self.scoped(key)).await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.kv.set(&self.scoped(key), value).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.kv.delete(&self.scoped(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clients_do_not_see_each_others_keys() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::default());
        let alice = ClientStore::new(kv.clone(), "alice");
        let bob = ClientStore::new(kv, "bob");

        alice.set(DRAFT_KEY, "{}").await.unwrap();

        assert_eq!(alice.get(DRAFT_KEY).await.unwrap().as_deref(), Some("{}"));
        assert_eq!(bob.get(DRAFT_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_removes_key() {
        let store = ClientStore::new(Arc::new(MemoryKvStore::default()), "c");
        let key = submission_marker_key(Uuid::nil());
        store.set(&key, "x").await.unwrap();
        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
