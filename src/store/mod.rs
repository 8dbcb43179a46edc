// Storage seam for the lifecycle engine. The state machines only ever
// talk to this trait, so storage technology is swappable: in-memory for
// tests, a JSON snapshot file for the CLI, SQLite behind the `database`
// feature.

use async_trait::async_trait;

use crate::domain::{Contract, ContractId, Invoice, InvoiceId};
use crate::error::StoreError;

pub mod file;
pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

/// Durable storage for contract aggregates and invoices.
#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn load_contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError>;

    async fn save_contract(&self, contract: &Contract) -> Result<(), StoreError>;

    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError>;

    async fn load_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;

    async fn invoices_for_contract(&self, id: ContractId)
        -> Result<Vec<Invoice>, StoreError>;

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError>;

    /// Persist a freshly generated invoice together with the contract
    /// whose milestones it consumed, as one atomic unit. Either both
    /// land or neither does; a crash must not leave consumed milestones
    /// without their invoice.
    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        contract: &Contract,
    ) -> Result<(), StoreError>;
}
