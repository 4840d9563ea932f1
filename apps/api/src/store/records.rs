//! Durable record storage: a key/value surface over Postgres keyed by
//! `(kind, id)`, with the owning caller stored alongside the JSON body.

#[cfg(test)]
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
#[cfg(test)]
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Analysis,
    Interview,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Analysis => "analysis",
            RecordKind::Interview => "interview",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub owner: String,
    pub body: Value,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts or replaces the body of a record. The owner of an existing
    /// record is never changed.
    async fn put(
        &self,
        kind: RecordKind,
        id: Uuid,
        owner: &str,
        body: &Value,
    ) -> Result<(), StoreError>;

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<StoredRecord>, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn put(
        &self,
        kind: RecordKind,
        id: Uuid,
        owner: &str,
        body: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO records (kind, id, owner, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (kind, id)
            DO UPDATE SET body = EXCLUDED.body, updated_at = now()
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(owner)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<StoredRecord>, StoreError> {
        let row: Option<(String, Value)> =
            sqlx::query_as("SELECT owner, body FROM records WHERE kind = $1 AND id = $2")
                .bind(kind.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(owner, body)| StoredRecord { owner, body }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-process
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<(RecordKind, Uuid), StoredRecord>>,
}

#[cfg(test)]
impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(
        &self,
        kind: RecordKind,
        id: Uuid,
        owner: &str,
        body: &Value,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records
            .entry((kind, id))
            .and_modify(|existing| existing.body = body.clone())
            .or_insert_with(|| StoredRecord {
                owner: owner.to_string(),
                body: body.clone(),
            });
        Ok(())
    }

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.read().await.get(&(kind, id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_put_then_get_returns_owner_and_body() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        store
            .put(RecordKind::Analysis, id, "user-1", &json!({"a": 1}))
            .await
            .unwrap();

        let record = store.get(RecordKind::Analysis, id).await.unwrap().unwrap();
        assert_eq!(record.owner, "user-1");
        assert_eq!(record.body, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_update_keeps_original_owner() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        store
            .put(RecordKind::Interview, id, "owner", &json!({"v": 1}))
            .await
            .unwrap();
        store
            .put(RecordKind::Interview, id, "intruder", &json!({"v": 2}))
            .await
            .unwrap();

        let record = store.get(RecordKind::Interview, id).await.unwrap().unwrap();
        assert_eq!(record.owner, "owner");
        assert_eq!(record.body, json!({"v": 2}));
    }

    #[tokio::test]
    async fn test_kinds_are_separate_namespaces() {
        let store = MemoryRecordStore::new();
        let id = Uuid::new_v4();
        store
            .put(RecordKind::Analysis, id, "u", &json!({}))
            .await
            .unwrap();
        assert!(store.get(RecordKind::Interview, id).await.unwrap().is_none());
    }
}
