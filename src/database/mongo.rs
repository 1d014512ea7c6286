//! MongoDB database wrapper.

use mongodb::bson::doc;
use mongodb::{options::ClientOptions, Client, Collection};
use tracing::info;

/// Shared handle to the configured MongoDB database.
///
/// Cloning is cheap; the driver pools connections internally.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB with the given URI and database name.
    ///
    /// # Errors
    /// Returns error if the URI is invalid or the server does not answer
    /// a ping.
    pub async fn connect(uri: &str, db_name: &str) -> mongodb::error::Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self { client, db }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Name of the selected database.
    pub fn name(&self) -> &str {
        self.db.name()
    }

    /// Get a typed collection from the database.
    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }
}
