//! Conversation state storage.
//!
//! A conversation record belongs to one [`Address`] and holds three
//! independently written fields:
//!
//! - `state` - label of the handler active for the next turn, or null
//! - `state_data` - free-form bag handlers use between turns
//! - `bucket` - free-form bag for throttling bookkeeping
//!
//! Every mutation is an upsert of a single field. There is no versioning:
//! two writers racing on the same address leave whichever write landed
//! last.

mod address;
mod error;
mod memory;
mod mongo;

use async_trait::async_trait;

pub use address::{Address, Addressed, RawId};
pub use error::{Result, StorageError, ValidationError};
pub use memory::MemoryStorage;
pub use mongo::MongoStorage;

/// String-keyed JSON object stored as conversation data or bucket.
pub type Bag = serde_json::Map<String, serde_json::Value>;

/// Backend persisting conversation records.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Current state label.
    ///
    /// Returns `default` when the address has no record or the record has
    /// never had its state written. A state explicitly set to null reads
    /// back as `None`, not as `default`.
    async fn get_state(&self, address: Address, default: Option<&str>) -> Result<Option<String>>;

    /// Set the state label; `None` stores null.
    async fn set_state(&self, address: Address, state: Option<&str>) -> Result<()>;

    /// Clear the state back to the default.
    async fn reset_state(&self, address: Address) -> Result<()> {
        self.set_state(address, None).await
    }

    async fn get_data(&self, address: Address, default: Bag) -> Result<Bag>;

    /// Replace the whole data bag.
    async fn set_data(&self, address: Address, data: Bag) -> Result<()>;

    async fn reset_data(&self, address: Address) -> Result<()> {
        self.set_data(address, Bag::new()).await
    }

    async fn get_bucket(&self, address: Address, default: Bag) -> Result<Bag>;

    /// Replace the whole bucket; `None` stores an empty bucket.
    async fn set_bucket(&self, address: Address, bucket: Option<Bag>) -> Result<()>;

    /// Merge `overrides` onto `bucket` and store the result.
    ///
    /// The stored bucket is replaced, not merged into: keys present only in
    /// the previously stored bucket are dropped. Pass the previous bucket
    /// back in to accumulate across calls.
    async fn update_bucket(&self, address: Address, bucket: Option<Bag>, overrides: Bag) -> Result<()> {
        let mut merged = bucket.unwrap_or_default();
        merged.extend(overrides);
        self.set_bucket(address, Some(merged)).await
    }

    async fn reset_bucket(&self, address: Address) -> Result<()> {
        self.set_bucket(address, None).await
    }

    /// End the conversation: clear the state and the data bag.
    ///
    /// The bucket is left untouched.
    async fn finish(&self, address: Address) -> Result<()> {
        self.reset_state(address).await?;
        self.reset_data(address).await
    }

    /// Release backend resources.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
