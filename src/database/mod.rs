//! database (db) union structure.
mod paginate;

pub use paginate::*;

use bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};

use crate::config::MongoDb;
use crate::user::User;

/// Custom db structure to pass to Axum.
#[derive(Clone)]
pub struct Database {
    pub client: Client,
    pub mongodb: mongodb::Database,
    pub users: Collection<User>,
}

impl Database {
    /// Init database connections.
    ///
    /// The driver connects lazily; the unique index creation is the first
    /// round trip and fails fast when the server is unreachable.
    pub async fn new(config: &MongoDb) -> Result<Self, mongodb::error::Error> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_owned());
        if let Some(size) = config.pool_size {
            options.max_pool_size = Some(size);
        }

        let client = Client::with_options(options)?;
        let mongodb = client.database(&config.database);
        let users = mongodb.collection::<User>(&config.collection);

        let db = Self {
            client,
            mongodb,
            users,
        };
        db.ensure_indexes().await?;

        tracing::info!(database = %config.database, collection = %config.collection, "mongodb connected");

        Ok(db)
    }

    /// Create the unique `email` index if missing.
    pub async fn ensure_indexes(&self) -> Result<(), mongodb::error::Error> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users.create_index(index).await?;
        Ok(())
    }
}
