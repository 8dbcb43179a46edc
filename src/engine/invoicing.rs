// Invoice generation over approved-but-uninvoiced milestones, plus the
// settlement and overdue sweeps. Generation is idempotent with respect
// to milestone consumption: every milestone it bills is advanced to
// COMPLETED_PAID in the same atomic commit as the invoice, so a second
// call finds nothing to bill. Settlement and the sweep both mutate
// invoices under the owning contract's lock, re-reading the invoice
// once the lock is held, so neither can write back a stale status.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, Instrument};

use crate::auth::{authorize, Operation};
use crate::domain::{
    Actor, ContractId, Invoice, InvoiceId, InvoiceItem, InvoiceStatus, MilestoneStatus,
    PaymentTerms,
};
use crate::error::{EngineError, EntityKind};
use crate::notify::LifecycleEvent;
use crate::store::ContractStore;

use super::{lifecycle_span, ContractEngine};

impl<S: ContractStore> ContractEngine<S> {
    /// Aggregate every APPROVED_PENDING_INVOICE milestone of the
    /// contract into one SENT invoice and advance those milestones to
    /// COMPLETED_PAID, atomically. Nothing billable means
    /// `NoPendingMilestones`, not a zero-value invoice.
    pub async fn generate_invoice(
        &self,
        contract_id: ContractId,
        payment_terms: PaymentTerms,
        actor: &Actor,
    ) -> Result<Invoice, EngineError> {
        let span = lifecycle_span(Operation::GenerateInvoice, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;
            authorize(Operation::GenerateInvoice, actor, &contract)?;

            let milestones = contract.milestones().ok_or_else(|| {
                EngineError::invalid_transition(
                    EntityKind::Contract,
                    format!("a {} engagement", contract.engagement.kind()),
                    Operation::GenerateInvoice,
                )
            })?;

            let items: Vec<InvoiceItem> = milestones
                .iter()
                .filter(|m| m.is_billable())
                .map(|m| InvoiceItem {
                    milestone_id: m.id,
                    description: m.description.clone(),
                    amount: m.amount,
                })
                .collect();

            if items.is_empty() {
                return Err(EngineError::NoPendingMilestones { contract_id });
            }

            let total: Decimal = items.iter().map(|i| i.amount).sum();
            let consumed: Vec<_> = items.iter().map(|i| i.milestone_id).collect();
            let issue_date = Utc::now().date_naive();

            let invoice = Invoice {
                id: InvoiceId::new(),
                contract_id,
                company_id: contract.company_id,
                engineer_id: contract.engineer_id,
                items,
                total,
                issue_date,
                due_date: payment_terms.due_date(issue_date),
                status: InvoiceStatus::Sent,
                consumed_milestones: consumed.clone(),
            };

            if let Some(milestones) = contract.milestones_mut() {
                for milestone in milestones
                    .iter_mut()
                    .filter(|m| consumed.contains(&m.id))
                {
                    milestone.status = MilestoneStatus::CompletedPaid;
                }
            }
            contract.touch();

            // Invoice creation and milestone advancement land together
            // or not at all.
            self.store().commit_invoice(&invoice, &contract).await?;

            info!(
                contract.id = %contract_id,
                invoice.id = %invoice.id,
                total = %invoice.total,
                items = invoice.items.len(),
                terms = %payment_terms,
                "invoice generated"
            );
            self.notify(LifecycleEvent::InvoiceIssued {
                contract_id,
                invoice_id: invoice.id,
                total: invoice.total,
            })
            .await;
            Ok(invoice)
        }
        .instrument(span)
        .await
    }

    /// Record settlement of a SENT or OVERDUE invoice.
    pub async fn mark_invoice_paid(
        &self,
        invoice_id: InvoiceId,
        actor: &Actor,
    ) -> Result<Invoice, EngineError> {
        let span = lifecycle_span(Operation::MarkInvoicePaid, None, Some(actor));
        async {
            // This first load only resolves the owning contract; the
            // invoice is read again once the lock is held.
            let contract_id = self
                .store()
                .load_invoice(invoice_id)
                .await?
                .ok_or_else(|| EngineError::not_found(EntityKind::Invoice, invoice_id))?
                .contract_id;

            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut invoice = self
                .store()
                .load_invoice(invoice_id)
                .await?
                .ok_or_else(|| EngineError::not_found(EntityKind::Invoice, invoice_id))?;
            let contract = self.load_required(contract_id).await?;
            authorize(Operation::MarkInvoicePaid, actor, &contract)?;

            match invoice.status {
                InvoiceStatus::Sent | InvoiceStatus::Overdue => {
                    invoice.status = InvoiceStatus::Paid;
                }
                InvoiceStatus::Paid => {
                    return Err(EngineError::invalid_transition(
                        EntityKind::Invoice,
                        invoice.status,
                        Operation::MarkInvoicePaid,
                    ));
                }
            }

            self.store().save_invoice(&invoice).await?;
            info!(invoice.id = %invoice_id, "invoice marked paid");
            self.notify(LifecycleEvent::InvoicePaid { invoice_id }).await;
            Ok(invoice)
        }
        .instrument(span)
        .await
    }

    /// Sweep SENT invoices past their due date to OVERDUE. Idempotent;
    /// invoked explicitly, never by a background scheduler. The listing
    /// is only a candidate scan: each invoice is re-read under its
    /// contract's lock before the status is written, so a settlement
    /// that lands mid-sweep is never overwritten.
    pub async fn mark_overdue_invoices(
        &self,
        today: chrono::NaiveDate,
    ) -> Result<Vec<InvoiceId>, EngineError> {
        let mut swept = Vec::new();
        for candidate in self.store().list_invoices().await? {
            if !candidate.is_past_due(today) {
                continue;
            }

            let lock = self.contract_lock(candidate.contract_id).await;
            let _guard = lock.lock().await;

            let Some(mut invoice) = self.store().load_invoice(candidate.id).await? else {
                continue;
            };
            if !invoice.is_past_due(today) {
                continue;
            }

            invoice.status = InvoiceStatus::Overdue;
            self.store().save_invoice(&invoice).await?;
            info!(invoice.id = %invoice.id, due = %invoice.due_date, "invoice overdue");
            swept.push(invoice.id);
        }
        Ok(swept)
    }
}
