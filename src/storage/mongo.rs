//! MongoDB storage backend.
//!
//! One document per address in the conversation collection:
//!
//! ```text
//! { chat_id, user_id, state, state_data, bucket }
//! ```
//!
//! Each operation touches a single field with `$set`, so writes to
//! different fields of the same address never clobber each other.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::{FindOneOptions, IndexOptions, UpdateOptions};
use mongodb::{Collection, IndexModel};
use tracing::{debug, info};

use super::{Address, Bag, Result, StateStorage, StorageError};
use crate::database::Database;

/// Default name of the conversation collection.
pub const DEFAULT_COLLECTION: &str = "users";

const STATE: &str = "state";
const DATA: &str = "state_data";
const BUCKET: &str = "bucket";

/// Storage persisting conversation records in MongoDB.
#[derive(Debug, Clone)]
pub struct MongoStorage {
    collection: Collection<Document>,
}

fn filter(address: Address) -> Document {
    doc! { "chat_id": address.chat_id, "user_id": address.user_id }
}

impl MongoStorage {
    /// Create a storage over `collection` of the given database.
    pub fn new(db: &Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }

    /// Create a storage over the default `users` collection.
    pub fn with_default_collection(db: &Database) -> Self {
        Self::new(db, DEFAULT_COLLECTION)
    }

    /// Create the unique (chat_id, user_id) index.
    ///
    /// The storage works without it; concurrent first writes to a new
    /// address may then upsert duplicate documents.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "chat_id": 1, "user_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        info!("Ensured unique address index on {}", self.collection.name());
        Ok(())
    }

    /// Read one field of the record. `None` when the record or the field
    /// does not exist.
    async fn get_field(&self, address: Address, field: &str) -> Result<Option<Bson>> {
        let options = FindOneOptions::builder()
            .projection(doc! { "_id": false, field: true })
            .build();

        let result = self
            .collection
            .find_one(filter(address))
            .with_options(options)
            .await?;

        debug!("DB get {} for {}: {:?}", field, address, result.is_some());
        Ok(result.and_then(|mut document| document.remove(field)))
    }

    /// Upsert one field of the record.
    async fn set_field(&self, address: Address, field: &str, value: Bson) -> Result<()> {
        let options = UpdateOptions::builder().upsert(true).build();

        self.collection
            .update_one(filter(address), doc! { "$set": { field: value } })
            .with_options(options)
            .await?;

        debug!("Updated {} for {}", field, address);
        Ok(())
    }

    async fn get_bag(&self, address: Address, field: &'static str, default: Bag) -> Result<Bag> {
        match self.get_field(address, field).await? {
            None | Some(Bson::Null) => Ok(default),
            Some(value) => bson::from_bson(value)
                .map_err(|source| StorageError::Decode { field, source }),
        }
    }

    async fn set_bag(&self, address: Address, field: &str, bag: Bag) -> Result<()> {
        let value = bson::to_bson(&bag)?;
        self.set_field(address, field, value).await
    }
}

#[async_trait]
impl StateStorage for MongoStorage {
    async fn get_state(&self, address: Address, default: Option<&str>) -> Result<Option<String>> {
        match self.get_field(address, STATE).await? {
            None => Ok(default.map(str::to_string)),
            Some(Bson::Null) => Ok(None),
            Some(value) => bson::from_bson(value)
                .map_err(|source| StorageError::Decode { field: STATE, source }),
        }
    }

    async fn set_state(&self, address: Address, state: Option<&str>) -> Result<()> {
        let value = state.map_or(Bson::Null, |s| Bson::String(s.to_string()));
        self.set_field(address, STATE, value).await
    }

    async fn get_data(&self, address: Address, default: Bag) -> Result<Bag> {
        self.get_bag(address, DATA, default).await
    }

    async fn set_data(&self, address: Address, data: Bag) -> Result<()> {
        self.set_bag(address, DATA, data).await
    }

    async fn get_bucket(&self, address: Address, default: Bag) -> Result<Bag> {
        self.get_bag(address, BUCKET, default).await
    }

    async fn set_bucket(&self, address: Address, bucket: Option<Bag>) -> Result<()> {
        self.set_bag(address, BUCKET, bucket.unwrap_or_default()).await
    }
}
