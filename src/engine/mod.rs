// The lifecycle engine: one synchronous call surface over the stores,
// the authorization policy, and the notification hook. Calls against
// the same contract are serialized through a per-contract lock; calls
// against different contracts proceed in parallel.

mod contracts;
mod invoicing;
mod milestones;
mod signing;
mod timesheets;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;

use crate::auth::Operation;
use crate::directory::Directory;
use crate::domain::{Actor, Contract, ContractId, Invoice, InvoiceId};
use crate::error::{EngineError, EntityKind};
use crate::notify::{emit_best_effort, LifecycleEvent, NotificationEmitter};
use crate::store::ContractStore;
use crate::telemetry::{create_lifecycle_span, generate_correlation_id};

pub struct ContractEngine<S: ContractStore> {
    store: S,
    directory: Arc<dyn Directory>,
    emitter: Arc<dyn NotificationEmitter>,
    // Weak entries keep the map bounded by in-flight operations; idle
    // entries are pruned whenever a fresh lock is created.
    locks: Mutex<HashMap<ContractId, Weak<Mutex<()>>>>,
}

impl<S: ContractStore> ContractEngine<S> {
    pub fn new(
        store: S,
        directory: Arc<dyn Directory>,
        emitter: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self {
            store,
            directory,
            emitter,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Per-contract lock: single writer per aggregate, independent
    /// aggregates untouched. Callers holding a clone of the same
    /// contract's lock serialize; once the last holder drops it, the
    /// entry becomes dead weight and is pruned on a later miss.
    pub(crate) async fn contract_lock(&self, id: ContractId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if let Some(existing) = locks.get(&id).and_then(Weak::upgrade) {
            return existing;
        }
        locks.retain(|_, entry| entry.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(id, Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub(crate) async fn load_required(&self, id: ContractId) -> Result<Contract, EngineError> {
        self.store
            .load_contract(id)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Contract, id))
    }

    pub(crate) async fn notify(&self, event: LifecycleEvent) {
        emit_best_effort(self.emitter.as_ref(), event).await;
    }

    // Read accessors.

    pub async fn contract(&self, id: ContractId) -> Result<Contract, EngineError> {
        self.load_required(id).await
    }

    pub async fn list_contracts(&self) -> Result<Vec<Contract>, EngineError> {
        Ok(self.store.list_contracts().await?)
    }

    pub async fn invoice(&self, id: InvoiceId) -> Result<Invoice, EngineError> {
        self.store
            .load_invoice(id)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Invoice, id))
    }

    pub async fn invoices_for_contract(
        &self,
        id: ContractId,
    ) -> Result<Vec<Invoice>, EngineError> {
        Ok(self.store.invoices_for_contract(id).await?)
    }
}

/// Span every lifecycle operation runs under, carrying a fresh
/// correlation id alongside the operation, contract, and actor fields.
pub(crate) fn lifecycle_span(
    operation: Operation,
    contract_id: Option<ContractId>,
    actor: Option<&Actor>,
) -> tracing::Span {
    let correlation = generate_correlation_id();
    let contract = contract_id.map(|id| id.to_string());
    let role = actor.map(|a| a.role.to_string());
    create_lifecycle_span(
        &operation.to_string(),
        contract.as_deref(),
        role.as_deref(),
        Some(&correlation),
    )
}
