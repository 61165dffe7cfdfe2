use crate::domain::ports::PurchaseStore;
use crate::domain::purchase::Purchase;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Column Family holding purchases keyed by token.
pub const CF_PURCHASES: &str = "purchases";

/// A persistent purchase ledger backed by RocksDB.
///
/// Keeps finalized tokens across restarts so a token can never be finalized
/// twice. `Clone` shares the underlying `Arc<DB>`.
///
/// RocksDB has no compare-and-set, so every write goes through `writes` and
/// read-modify-write updates cannot interleave.
#[derive(Clone)]
pub struct RocksDBPurchaseStore {
    db: Arc<DB>,
    writes: Arc<Mutex<()>>,
}

impl RocksDBPurchaseStore {
    /// Opens or creates a RocksDB instance at `path`, creating the purchases
    /// column family when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_purchases = ColumnFamilyDescriptor::new(CF_PURCHASES, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_purchases])?;

        Ok(Self {
            db: Arc::new(db),
            writes: Arc::new(Mutex::new(())),
        })
    }

    fn column_family(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_PURCHASES).ok_or_else(|| {
            BridgeError::InternalError(Box::new(std::io::Error::other(
                "Purchases column family not found",
            )))
        })
    }

    fn read(&self, token: &str) -> Result<Option<Purchase>> {
        let cf = self.column_family()?;
        match self.db.get_pinned_cf(cf, token.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, purchase: &Purchase) -> Result<()> {
        let cf = self.column_family()?;
        let value = serde_json::to_vec(purchase).map_err(|e| {
            BridgeError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })?;

        self.db.put_cf(cf, purchase.token.as_bytes(), value)?;
        Ok(())
    }

    fn put(&self, purchase: &Purchase) -> Result<()> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(purchase)
    }

    fn update(
        &self,
        token: &str,
        apply: impl FnOnce(Option<Purchase>) -> Purchase,
    ) -> Result<Purchase> {
        let _guard = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = apply(self.read(token)?);
        self.write(&entry)?;
        Ok(entry)
    }
}

fn decode(bytes: &[u8]) -> Result<Purchase> {
    serde_json::from_slice(bytes).map_err(|e| {
        BridgeError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl PurchaseStore for RocksDBPurchaseStore {
    async fn store(&self, purchase: Purchase) -> Result<()> {
        self.put(&purchase)
    }

    async fn record(&self, purchase: Purchase) -> Result<Purchase> {
        let token = purchase.token.clone();
        self.update(&token, |existing| Purchase::reconcile(existing, purchase))
    }

    async fn mark_finalized(&self, token: &str) -> Result<Purchase> {
        self.update(token, |existing| Purchase::into_finalized(existing, token))
    }

    async fn get(&self, token: &str) -> Result<Option<Purchase>> {
        self.read(token)
    }

    async fn all(&self) -> Result<Vec<Purchase>> {
        let cf = self.column_family()?;
        let mut purchases = Vec::new();

        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            purchases.push(decode(&value)?);
        }

        Ok(purchases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::purchase::PurchaseState;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBPurchaseStore::open(dir.path()).expect("Failed to open RocksDB");
        assert!(store.db.cf_handle(CF_PURCHASES).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_purchase_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBPurchaseStore::open(dir.path()).unwrap();
            store.store(Purchase::finalized_token("tok-1")).await.unwrap();
        }

        let store = RocksDBPurchaseStore::open(dir.path()).unwrap();
        let retrieved = store.get("tok-1").await.unwrap().unwrap();
        assert_eq!(retrieved.state, PurchaseState::Finalized);
        assert!(store.get("tok-2").await.unwrap().is_none());
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_record_keeps_finalized() {
        let dir = tempdir().unwrap();
        let store = RocksDBPurchaseStore::open(dir.path()).unwrap();
        store.mark_finalized("tok-1").await.unwrap();

        let mut late = Purchase::finalized_token("tok-1");
        late.state = PurchaseState::Purchased;
        let entry = store.record(late).await.unwrap();

        assert_eq!(entry.state, PurchaseState::Finalized);
        assert!(store.get("tok-1").await.unwrap().unwrap().is_finalized());
    }
}
