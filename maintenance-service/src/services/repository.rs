//! Persistence seams for bills and billing configs.

use super::database::MongoDb;
use crate::models::{BillingConfig, DeletionRecord, ListBillsFilter, MaintenanceBill};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::FindOptions, options::UpdateOptions};
use service_core::error::AppError;
use uuid::Uuid;

/// Result of a version-checked replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    VersionMismatch,
    Missing,
}

#[async_trait]
pub trait BillRepository: Send + Sync {
    async fn insert_bill(&self, bill: &MaintenanceBill) -> Result<(), AppError>;

    async fn get_bill(&self, society_id: &str, bill_id: &str) -> Result<Option<MaintenanceBill>, AppError>;

    /// Bills of a society matching `filter`, newest first.
    async fn list_bills(
        &self,
        society_id: &str,
        filter: &ListBillsFilter,
    ) -> Result<Vec<MaintenanceBill>, AppError>;

    /// Replace the stored bill only if its version is still `expected_version`.
    async fn replace_bill(
        &self,
        bill: &MaintenanceBill,
        expected_version: u64,
    ) -> Result<ReplaceOutcome, AppError>;

    async fn delete_bill(&self, society_id: &str, bill_id: &str) -> Result<bool, AppError>;

    async fn record_deletion(&self, record: &DeletionRecord) -> Result<(), AppError>;
}

#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Billing config versions of a society in the order they were added.
    async fn billing_configs(&self, society_id: &str) -> Result<Vec<BillingConfig>, AppError>;

    async fn append_billing_config(&self, society_id: &str, config: &BillingConfig) -> Result<(), AppError>;
}

/// MongoDB-backed store. Every query is scoped by `society_id`.
#[derive(Clone)]
pub struct MongoStore {
    db: MongoDb,
}

impl MongoStore {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }
}

fn encode_error(e: mongodb::bson::ser::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Failed to encode document: {}", e))
}

#[async_trait]
impl BillRepository for MongoStore {
    async fn insert_bill(&self, bill: &MaintenanceBill) -> Result<(), AppError> {
        self.db.bills().insert_one(bill, None).await?;
        Ok(())
    }

    async fn get_bill(&self, society_id: &str, bill_id: &str) -> Result<Option<MaintenanceBill>, AppError> {
        let bill = self
            .db
            .bills()
            .find_one(doc! { "_id": bill_id, "society_id": society_id }, None)
            .await?;
        Ok(bill)
    }

    async fn list_bills(
        &self,
        society_id: &str,
        filter: &ListBillsFilter,
    ) -> Result<Vec<MaintenanceBill>, AppError> {
        let mut query = doc! { "society_id": society_id };
        if let Some(user_id) = &filter.user_id {
            query.insert("user_id", user_id.as_str());
        }
        if let Some(flat_number) = &filter.flat_number {
            query.insert("flat_number", flat_number.as_str());
        }
        if let Some(period) = &filter.period {
            query.insert("period", period.to_string());
        }

        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.db.bills().find(query, options).await?;

        let mut bills = Vec::new();
        while let Some(bill) = cursor.try_next().await? {
            bills.push(bill);
        }
        Ok(bills)
    }

    async fn replace_bill(
        &self,
        bill: &MaintenanceBill,
        expected_version: u64,
    ) -> Result<ReplaceOutcome, AppError> {
        let result = self
            .db
            .bills()
            .replace_one(
                doc! {
                    "_id": bill.id.as_str(),
                    "society_id": bill.society_id.as_str(),
                    "version": expected_version as i64,
                },
                bill,
                None,
            )
            .await?;

        if result.matched_count == 1 {
            return Ok(ReplaceOutcome::Replaced);
        }
        match self.get_bill(&bill.society_id, &bill.id).await? {
            Some(_) => Ok(ReplaceOutcome::VersionMismatch),
            None => Ok(ReplaceOutcome::Missing),
        }
    }

    async fn delete_bill(&self, society_id: &str, bill_id: &str) -> Result<bool, AppError> {
        let result = self
            .db
            .bills()
            .delete_one(doc! { "_id": bill_id, "society_id": society_id }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }

    async fn record_deletion(&self, record: &DeletionRecord) -> Result<(), AppError> {
        self.db.bill_deletions().insert_one(record, None).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for MongoStore {
    async fn billing_configs(&self, society_id: &str) -> Result<Vec<BillingConfig>, AppError> {
        let document = self
            .db
            .society_configs()
            .find_one(
                doc! { "society_id": society_id, "billing_configs": { "$exists": true } },
                None,
            )
            .await?;
        Ok(document.map(|d| d.billing_configs).unwrap_or_default())
    }

    async fn append_billing_config(&self, society_id: &str, config: &BillingConfig) -> Result<(), AppError> {
        let encoded = mongodb::bson::to_bson(config).map_err(encode_error)?;
        let options = UpdateOptions::builder().upsert(true).build();
        self.db
            .society_configs()
            .update_one(
                doc! { "society_id": society_id },
                doc! {
                    "$push": { "billing_configs": encoded },
                    "$setOnInsert": { "_id": Uuid::new_v4().to_string() },
                },
                options,
            )
            .await?;
        Ok(())
    }
}

/// Process-local store used by tests and `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct InMemoryStore {
    bills: DashMap<String, MaintenanceBill>,
    configs: DashMap<String, Vec<BillingConfig>>,
    deletions: DashMap<String, DeletionRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deletions(&self, society_id: &str) -> Vec<DeletionRecord> {
        self.deletions
            .iter()
            .filter(|r| r.society_id == society_id)
            .map(|r| r.value().clone())
            .collect()
    }
}

#[async_trait]
impl BillRepository for InMemoryStore {
    async fn insert_bill(&self, bill: &MaintenanceBill) -> Result<(), AppError> {
        if self.bills.contains_key(&bill.id) {
            return Err(AppError::conflict(format!("bill {} already exists", bill.id)));
        }
        self.bills.insert(bill.id.clone(), bill.clone());
        Ok(())
    }

    async fn get_bill(&self, society_id: &str, bill_id: &str) -> Result<Option<MaintenanceBill>, AppError> {
        Ok(self
            .bills
            .get(bill_id)
            .filter(|b| b.society_id == society_id)
            .map(|b| b.value().clone()))
    }

    async fn list_bills(
        &self,
        society_id: &str,
        filter: &ListBillsFilter,
    ) -> Result<Vec<MaintenanceBill>, AppError> {
        let mut bills: Vec<MaintenanceBill> = self
            .bills
            .iter()
            .filter(|b| b.society_id == society_id && filter.matches(b.value()))
            .map(|b| b.value().clone())
            .collect();
        bills.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bills)
    }

    async fn replace_bill(
        &self,
        bill: &MaintenanceBill,
        expected_version: u64,
    ) -> Result<ReplaceOutcome, AppError> {
        match self.bills.get_mut(&bill.id) {
            Some(mut stored) if stored.society_id == bill.society_id => {
                if stored.version != expected_version {
                    return Ok(ReplaceOutcome::VersionMismatch);
                }
                *stored = bill.clone();
                Ok(ReplaceOutcome::Replaced)
            }
            _ => Ok(ReplaceOutcome::Missing),
        }
    }

    async fn delete_bill(&self, society_id: &str, bill_id: &str) -> Result<bool, AppError> {
        Ok(self
            .bills
            .remove_if(bill_id, |_, b| b.society_id == society_id)
            .is_some())
    }

    async fn record_deletion(&self, record: &DeletionRecord) -> Result<(), AppError> {
        self.deletions.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for InMemoryStore {
    async fn billing_configs(&self, society_id: &str) -> Result<Vec<BillingConfig>, AppError> {
        Ok(self
            .configs
            .get(society_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn append_billing_config(&self, society_id: &str, config: &BillingConfig) -> Result<(), AppError> {
        self.configs
            .entry(society_id.to_string())
            .or_default()
            .push(config.clone());
        Ok(())
    }
}
