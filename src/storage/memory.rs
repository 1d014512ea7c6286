//! In-process storage backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Address, Bag, Result, StateStorage};

/// Conversation record kept in memory.
///
/// `None` means the field was never written; `state: Some(None)` is an
/// explicitly cleared state.
#[derive(Debug, Clone, Default)]
struct MemoryRecord {
    state: Option<Option<String>>,
    data: Option<Bag>,
    bucket: Option<Bag>,
}

/// Storage backed by a concurrent map. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: DashMap<Address, MemoryRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of addresses with a record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StateStorage for MemoryStorage {
    async fn get_state(&self, address: Address, default: Option<&str>) -> Result<Option<String>> {
        let state = self.records.get(&address).and_then(|r| r.state.clone());
        Ok(state.unwrap_or_else(|| default.map(str::to_string)))
    }

    async fn set_state(&self, address: Address, state: Option<&str>) -> Result<()> {
        self.records.entry(address).or_default().state = Some(state.map(str::to_string));
        Ok(())
    }

    async fn get_data(&self, address: Address, default: Bag) -> Result<Bag> {
        let data = self.records.get(&address).and_then(|r| r.data.clone());
        Ok(data.unwrap_or(default))
    }

    async fn set_data(&self, address: Address, data: Bag) -> Result<()> {
        self.records.entry(address).or_default().data = Some(data);
        Ok(())
    }

    async fn get_bucket(&self, address: Address, default: Bag) -> Result<Bag> {
        let bucket = self.records.get(&address).and_then(|r| r.bucket.clone());
        Ok(bucket.unwrap_or(default))
    }

    async fn set_bucket(&self, address: Address, bucket: Option<Bag>) -> Result<()> {
        self.records.entry(address).or_default().bucket = Some(bucket.unwrap_or_default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn bag(value: serde_json::Value) -> Bag {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    const ADDR: Address = Address::new(1, 1);

    #[tokio::test]
    async fn test_unseen_address_returns_default() {
        let storage = MemoryStorage::new();

        assert_eq!(storage.get_state(ADDR, Some("X")).await.unwrap().as_deref(), Some("X"));
        assert_eq!(storage.get_data(ADDR, bag(json!({"d": 1}))).await.unwrap(), bag(json!({"d": 1})));
        assert!(storage.get_bucket(ADDR, Bag::new()).await.unwrap().is_empty());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_null_state_is_not_default() {
        let storage = MemoryStorage::new();

        storage.set_state(ADDR, None).await.unwrap();
        assert_eq!(storage.get_state(ADDR, Some("X")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_without_state_returns_default() {
        let storage = MemoryStorage::new();

        storage.set_data(ADDR, bag(json!({"a": 1}))).await.unwrap();
        assert_eq!(storage.get_state(ADDR, Some("X")).await.unwrap().as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_set_data_replaces() {
        let storage = MemoryStorage::new();

        storage.set_data(ADDR, bag(json!({"a": 1}))).await.unwrap();
        assert_eq!(storage.get_data(ADDR, Bag::new()).await.unwrap(), bag(json!({"a": 1})));

        storage.set_data(ADDR, bag(json!({"b": 2}))).await.unwrap();
        assert_eq!(storage.get_data(ADDR, Bag::new()).await.unwrap(), bag(json!({"b": 2})));
    }

    #[tokio::test]
    async fn test_update_bucket_discards_stored_keys() {
        let storage = MemoryStorage::new();

        storage.set_bucket(ADDR, Some(bag(json!({"old": true})))).await.unwrap();
        storage
            .update_bucket(ADDR, Some(bag(json!({"x": 1}))), bag(json!({"y": 2})))
            .await
            .unwrap();

        assert_eq!(
            storage.get_bucket(ADDR, Bag::new()).await.unwrap(),
            bag(json!({"x": 1, "y": 2}))
        );
    }

    #[tokio::test]
    async fn test_update_bucket_overrides_win() {
        let storage = MemoryStorage::new();

        storage
            .update_bucket(ADDR, Some(bag(json!({"x": 1}))), bag(json!({"x": 5})))
            .await
            .unwrap();

        assert_eq!(storage.get_bucket(ADDR, Bag::new()).await.unwrap(), bag(json!({"x": 5})));
    }

    #[tokio::test]
    async fn test_null_bucket_stored_as_empty() {
        let storage = MemoryStorage::new();

        storage.set_bucket(ADDR, None).await.unwrap();
        let bucket = storage.get_bucket(ADDR, bag(json!({"default": 1}))).await.unwrap();
        assert!(bucket.is_empty());
    }

    #[tokio::test]
    async fn test_finish_clears_state_and_data_only() {
        let storage = MemoryStorage::new();

        storage.set_state(ADDR, Some("awaiting_age")).await.unwrap();
        storage.set_data(ADDR, bag(json!({"name": "Ann"}))).await.unwrap();
        storage.set_bucket(ADDR, Some(bag(json!({"hits": 3})))).await.unwrap();

        storage.finish(ADDR).await.unwrap();

        assert_eq!(storage.get_state(ADDR, Some("X")).await.unwrap(), None);
        assert!(storage.get_data(ADDR, bag(json!({"d": 1}))).await.unwrap().is_empty());
        assert_eq!(storage.get_bucket(ADDR, Bag::new()).await.unwrap(), bag(json!({"hits": 3})));
    }

    #[tokio::test]
    async fn test_addresses_are_isolated() {
        let storage = MemoryStorage::new();
        let other = Address::new(1, 2);

        storage.set_state(ADDR, Some("a")).await.unwrap();
        storage.set_state(other, Some("b")).await.unwrap();

        assert_eq!(storage.get_state(ADDR, None).await.unwrap().as_deref(), Some("a"));
        assert_eq!(storage.get_state(other, None).await.unwrap().as_deref(), Some("b"));
        assert_eq!(storage.len(), 2);
    }
}
