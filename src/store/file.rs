// JSON snapshot store backing the CLI. The whole state is one
// versioned document; writes go through a temp file followed by a
// rename, so a crash mid-write leaves the previous snapshot intact and
// commit_invoice is a single snapshot swap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{Contract, ContractId, Invoice, InvoiceId};
use crate::error::StoreError;

use super::ContractStore;

const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: String,
    contracts: HashMap<ContractId, Contract>,
    invoices: HashMap<InvoiceId, Invoice>,
    saved_at: DateTime<Utc>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            contracts: HashMap::new(),
            invoices: HashMap::new(),
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes the load-mutate-persist cycle across callers.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_snapshot(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let contents = fs::read_to_string(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Corrupt {
                reason: format!(
                    "snapshot version {} does not match expected {SNAPSHOT_VERSION}",
                    snapshot.version
                ),
            });
        }
        Ok(snapshot)
    }

    async fn persist(&self, mut snapshot: Snapshot) -> Result<(), StoreError> {
        snapshot.saved_at = Utc::now();
        let serialized = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Atomic write: temp file then rename.
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, serialized).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(file = ?self.path, "store snapshot persisted");
        Ok(())
    }
}

#[async_trait]
impl ContractStore for JsonFileStore {
    async fn load_contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        Ok(self.load_snapshot().await?.contracts.remove(&id))
    }

    async fn save_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load_snapshot().await?;
        snapshot.contracts.insert(contract.id, contract.clone());
        self.persist(snapshot).await
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        let snapshot = self.load_snapshot().await?;
        let mut contracts: Vec<_> = snapshot.contracts.into_values().collect();
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.load_snapshot().await?.invoices.remove(&id))
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load_snapshot().await?;
        snapshot.invoices.insert(invoice.id, invoice.clone());
        self.persist(snapshot).await
    }

    async fn invoices_for_contract(
        &self,
        id: ContractId,
    ) -> Result<Vec<Invoice>, StoreError> {
        let snapshot = self.load_snapshot().await?;
        let mut invoices: Vec<_> = snapshot
            .invoices
            .into_values()
            .filter(|i| i.contract_id == id)
            .collect();
        invoices.sort_by_key(|i| i.issue_date);
        Ok(invoices)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let snapshot = self.load_snapshot().await?;
        let mut invoices: Vec<_> = snapshot.invoices.into_values().collect();
        invoices.sort_by_key(|i| i.issue_date);
        Ok(invoices)
    }

    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        contract: &Contract,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load_snapshot().await?;
        snapshot.invoices.insert(invoice.id, invoice.clone());
        snapshot.contracts.insert(contract.id, contract.clone());
        // Single rename makes invoice + milestone advancement atomic.
        self.persist(snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_contract() -> Contract {
        Contract {
            id: ContractId::new(),
            job_id: JobId::new(),
            company_id: CompanyId::new(),
            engineer_id: EngineerId::new(),
            currency: Currency::new("EUR"),
            status: ContractStatus::Draft,
            engagement: Engagement::DayRate {
                day_rate: dec!(650),
                timesheets: vec![],
            },
            engineer_signature: None,
            company_signature: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn round_trips_contracts_through_the_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let contract = sample_contract();

        store.save_contract(&contract).await.unwrap();
        let loaded = store.load_contract(contract.id).await.unwrap().unwrap();
        assert_eq!(loaded, contract);

        assert!(store
            .load_contract(ContractId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.list_contracts().await.unwrap().is_empty());
        assert!(store.list_invoices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn version_mismatch_is_reported_as_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"version":"9.9","contracts":{},"invoices":{},"saved_at":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        let store = JsonFileStore::new(path);
        let err = store.list_contracts().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
