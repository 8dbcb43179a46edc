// In-memory store. The default for tests and a reference for what the
// other implementations must guarantee: every method takes the single
// write lock, so commit_invoice is trivially atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Contract, ContractId, Invoice, InvoiceId};
use crate::error::StoreError;

use super::ContractStore;

#[derive(Debug, Default)]
struct Inner {
    contracts: HashMap<ContractId, Contract>,
    invoices: HashMap<InvoiceId, Invoice>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn load_contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        Ok(self.inner.read().await.contracts.get(&id).cloned())
    }

    async fn save_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .contracts
            .insert(contract.id, contract.clone());
        Ok(())
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        let inner = self.inner.read().await;
        let mut contracts: Vec<_> = inner.contracts.values().cloned().collect();
        contracts.sort_by_key(|c| c.created_at);
        Ok(contracts)
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        Ok(self.inner.read().await.invoices.get(&id).cloned())
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .invoices
            .insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn invoices_for_contract(
        &self,
        id: ContractId,
    ) -> Result<Vec<Invoice>, StoreError> {
        let inner = self.inner.read().await;
        let mut invoices: Vec<_> = inner
            .invoices
            .values()
            .filter(|i| i.contract_id == id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.issue_date);
        Ok(invoices)
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let inner = self.inner.read().await;
        let mut invoices: Vec<_> = inner.invoices.values().cloned().collect();
        invoices.sort_by_key(|i| i.issue_date);
        Ok(invoices)
    }

    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        contract: &Contract,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.invoices.insert(invoice.id, invoice.clone());
        inner.contracts.insert(contract.id, contract.clone());
        Ok(())
    }
}
