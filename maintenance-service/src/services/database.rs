use crate::models::{DeletionRecord, MaintenanceBill, SocietyConfigDocument};
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for maintenance-service");

        let bill_indexes = [
            ("society_recent", doc! { "society_id": 1, "created_at": -1 }),
            ("society_user", doc! { "society_id": 1, "user_id": 1 }),
            (
                "society_flat_period",
                doc! { "society_id": 1, "flat_number": 1, "period": 1 },
            ),
        ];
        for (name, keys) in bill_indexes {
            create_index(&self.bills(), name, keys).await?;
        }

        create_index(&self.society_configs(), "society_lookup", doc! { "society_id": 1 }).await?;
        create_index(
            &self.bill_deletions(),
            "deleted_bill_lookup",
            doc! { "society_id": 1, "bill_id": 1 },
        )
        .await?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn bills(&self) -> Collection<MaintenanceBill> {
        self.db.collection("maintenance_bills")
    }

    pub fn society_configs(&self) -> Collection<SocietyConfigDocument> {
        self.db.collection("society_configs")
    }

    pub fn bill_deletions(&self) -> Collection<DeletionRecord> {
        self.db.collection("bill_deletions")
    }
}

async fn create_index<T: Send + Sync>(collection: &Collection<T>, name: &str, keys: Document) -> Result<(), AppError> {
    let index = IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build();
    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!(index = name, collection = collection.name(), "Failed to create index: {}", e);
        AppError::from(e)
    })?;
    tracing::info!(index = name, collection = collection.name(), "Created index");
    Ok(())
}
