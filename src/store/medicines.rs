use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::MedicineError;
use crate::models::{MedicineRecord, NewMedicine};

use super::KeyValueStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Fixed key the whole medicine list is stored under.
pub const MEDICINES_KEY: &str = "medicines";

/// Canonical list of medicines. Every mutation writes the full list back
/// through the key-value store; a failed write is logged and the in-memory
/// change stands.
pub struct MedicineStore {
    records: RwLock<Vec<MedicineRecord>>,
    backend: Arc<dyn KeyValueStore>,
}

impl MedicineStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            backend,
        }
    }

    /// Loads the persisted list, replacing whatever is in memory. An absent
    /// key is an empty list; an undecodable blob is an error and leaves the
    /// current list untouched.
    pub async fn restore(&self) -> Result<usize> {
        let backend = Arc::clone(&self.backend);
        let bytes = tokio::task::spawn_blocking(move || backend.load(MEDICINES_KEY))
            .await
            .context("store load worker join failed")??;

        let loaded: Vec<MedicineRecord> = match bytes {
            Some(bytes) => {
                serde_json::from_slice(&bytes).context("persisted medicine list is corrupt")?
            }
            None => Vec::new(),
        };

        let count = loaded.len();
        *self.records.write().await = loaded;
        log_info!("Restored {count} medicines");
        Ok(count)
    }

    pub async fn list(&self) -> Vec<MedicineRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<MedicineRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub async fn add(
        &self,
        input: NewMedicine,
        now: DateTime<Utc>,
    ) -> Result<MedicineRecord, MedicineError> {
        let mut records = self.records.write().await;
        let record = input.into_record(&records, now)?;
        records.push(record.clone());
        self.persist(&records).await;
        log_info!("Added medicine {} ({})", record.name, record.id);
        Ok(record)
    }

    pub async fn toggle_active(&self, id: &str) -> Result<MedicineRecord, MedicineError> {
        self.update(id, |record| record.is_active = !record.is_active)
            .await
    }

    pub async fn record_dose(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<MedicineRecord, MedicineError> {
        self.update(id, |record| record.record_dose(at)).await
    }

    pub async fn remove(&self, id: &str) -> Result<MedicineRecord, MedicineError> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|record| record.id == id)
            .ok_or_else(|| MedicineError::NotFound(id.to_string()))?;
        let removed = records.remove(index);
        self.persist(&records).await;
        log_info!("Removed medicine {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    async fn update<F>(&self, id: &str, mutate: F) -> Result<MedicineRecord, MedicineError>
    where
        F: FnOnce(&mut MedicineRecord),
    {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| MedicineError::NotFound(id.to_string()))?;
        mutate(record);
        let updated = record.clone();
        self.persist(&records).await;
        Ok(updated)
    }

    // Called with the write lock held so writes land in mutation order.
    async fn persist(&self, records: &[MedicineRecord]) {
        let bytes = match serde_json::to_vec(records) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Failed to serialize medicine list: {err}");
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        let result = tokio::task::spawn_blocking(move || backend.save(MEDICINES_KEY, &bytes)).await;
        match result {
            Ok(Ok(())) => log_debug!("Persisted {} medicines", records.len()),
            Ok(Err(err)) => log::error!("Failed to persist medicine list: {err:#}"),
            Err(err) => log::error!("Medicine persist worker failed: {err}"),
        }
    }
}
