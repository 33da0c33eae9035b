mod medicines;
mod memory;
mod migrations;
mod sqlite;

use anyhow::Result;

pub use medicines::{MedicineStore, MEDICINES_KEY};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Blob storage the medicine list is persisted through.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;
}
