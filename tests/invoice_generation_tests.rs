//! Invoice generation tests
//!
//! Generation aggregates exactly the APPROVED_PENDING_INVOICE
//! milestones, advances them to COMPLETED_PAID in the same commit, and
//! is idempotent: a second call with no new approvals finds nothing to
//! bill.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::TestWorld;
use milemark::{
    Actor, CompanyId, Contract, ContractDraft, ContractEngine, ContractId, ContractStore,
    Currency, EngagementDraft, EngineError, EngineerId, Invoice, InvoiceId, InvoiceStatus,
    JobId, LifecycleEvent, MemoryStore, MilestoneDraft, MilestoneId, MilestoneStatus,
    PaymentTerms, StaticDirectory, StoreError, TracingEmitter,
};
use rust_decimal_macros::dec;
use tokio::sync::Notify;

async fn approve_milestone(world: &TestWorld, contract: &Contract, id: MilestoneId) {
    world
        .engine
        .fund_milestone(contract.id, id, &world.company_actor())
        .await
        .unwrap();
    world
        .engine
        .submit_milestone_for_approval(contract.id, id, &world.engineer_actor())
        .await
        .unwrap();
    world
        .engine
        .approve_milestone(contract.id, id, &world.company_actor())
        .await
        .unwrap();
}

#[tokio::test]
async fn invoices_cover_exactly_the_approved_milestones() {
    // Contract C (GBP): M1=1000, M2=1500, M3=2000. M1 and M2 are taken
    // through fund/submit/approve; M3 stays PENDING.
    let world = TestWorld::new();
    let contract = world
        .active_milestone_contract("GBP", &[dec!(1000), dec!(1500), dec!(2000)])
        .await;
    let ids: Vec<_> = contract.milestones().unwrap().iter().map(|m| m.id).collect();
    approve_milestone(&world, &contract, ids[0]).await;
    approve_milestone(&world, &contract, ids[1]).await;

    let invoice = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap();

    assert_eq!(invoice.total, dec!(2500));
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.items_total(), invoice.total);
    assert_eq!(invoice.due_date, invoice.issue_date + Duration::days(14));
    assert_eq!(invoice.status, InvoiceStatus::Sent);
    assert_eq!(invoice.consumed_milestones, vec![ids[0], ids[1]]);

    let contract = world.engine.contract(contract.id).await.unwrap();
    let statuses: Vec<_> = contract
        .milestones()
        .unwrap()
        .iter()
        .map(|m| m.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            MilestoneStatus::CompletedPaid,
            MilestoneStatus::CompletedPaid,
            MilestoneStatus::Pending,
        ]
    );
}

#[tokio::test]
async fn regeneration_without_new_approvals_finds_nothing_to_bill() {
    let world = TestWorld::new();
    let contract = world
        .active_milestone_contract("GBP", &[dec!(1000), dec!(1500)])
        .await;
    let ids: Vec<_> = contract.milestones().unwrap().iter().map(|m| m.id).collect();
    approve_milestone(&world, &contract, ids[0]).await;

    world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net30, &world.company_actor())
        .await
        .unwrap();

    let err = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net30, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingMilestones { .. }));

    // Exactly one invoice exists and no milestone appears twice.
    let invoices = world.engine.invoices_for_contract(contract.id).await.unwrap();
    assert_eq!(invoices.len(), 1);

    // A later approval opens a second, disjoint invoice.
    approve_milestone(&world, &contract, ids[1]).await;
    let second = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net30, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(second.total, dec!(1500));
    assert!(second
        .consumed_milestones
        .iter()
        .all(|id| !invoices[0].consumed_milestones.contains(id)));
}

#[tokio::test]
async fn nothing_approved_means_no_invoice_is_created() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;

    let err = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingMilestones { .. }));
    assert!(world
        .engine
        .invoices_for_contract(contract.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn engineer_cannot_generate_invoices() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;

    let err = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.engineer_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn day_rate_contracts_have_nothing_to_invoice() {
    let world = TestWorld::new();
    let contract = world.active_day_rate_contract("EUR", dec!(600)).await;

    let err = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn invoices_settle_and_sweep_to_overdue() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;
    approve_milestone(&world, &contract, m1).await;

    let invoice = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net7, &world.company_actor())
        .await
        .unwrap();

    // Not yet due: sweep is a no-op.
    let swept = world
        .engine
        .mark_overdue_invoices(Utc::now().date_naive())
        .await
        .unwrap();
    assert!(swept.is_empty());

    // Past the due date the invoice sweeps to OVERDUE, and the sweep
    // is idempotent.
    let later = invoice.due_date + Duration::days(1);
    let swept = world.engine.mark_overdue_invoices(later).await.unwrap();
    assert_eq!(swept, vec![invoice.id]);
    assert!(world.engine.mark_overdue_invoices(later).await.unwrap().is_empty());

    // An overdue invoice can still be settled; settling twice cannot.
    let paid = world
        .engine
        .mark_invoice_paid(invoice.id, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    let err = world
        .engine
        .mark_invoice_paid(invoice.id, &world.company_actor())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

/// Store that parks `list_invoices` until the test releases it, so a
/// settlement can land between the sweep's read and its writes.
struct PausingStore {
    inner: MemoryStore,
    listed: Notify,
    resume: Notify,
}

impl PausingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            listed: Notify::new(),
            resume: Notify::new(),
        }
    }
}

#[async_trait]
impl ContractStore for PausingStore {
    async fn load_contract(&self, id: ContractId) -> Result<Option<Contract>, StoreError> {
        self.inner.load_contract(id).await
    }

    async fn save_contract(&self, contract: &Contract) -> Result<(), StoreError> {
        self.inner.save_contract(contract).await
    }

    async fn list_contracts(&self) -> Result<Vec<Contract>, StoreError> {
        self.inner.list_contracts().await
    }

    async fn load_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        self.inner.load_invoice(id).await
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.inner.save_invoice(invoice).await
    }

    async fn invoices_for_contract(&self, id: ContractId) -> Result<Vec<Invoice>, StoreError> {
        self.inner.invoices_for_contract(id).await
    }

    async fn list_invoices(&self) -> Result<Vec<Invoice>, StoreError> {
        let invoices = self.inner.list_invoices().await?;
        self.listed.notify_one();
        self.resume.notified().await;
        Ok(invoices)
    }

    async fn commit_invoice(
        &self,
        invoice: &Invoice,
        contract: &Contract,
    ) -> Result<(), StoreError> {
        self.inner.commit_invoice(invoice, contract).await
    }
}

#[tokio::test]
async fn settlement_during_a_sweep_is_never_regressed_to_overdue() {
    let job = JobId::new();
    let company = CompanyId::new();
    let engineer = EngineerId::new();
    let directory = StaticDirectory::new()
        .with_job(job)
        .with_company(company)
        .with_engineer(engineer);
    let engine = Arc::new(ContractEngine::new(
        PausingStore::new(),
        Arc::new(directory),
        Arc::new(TracingEmitter),
    ));
    let company_actor = Actor::company(company.0);
    let engineer_actor = Actor::engineer(engineer.0);

    let draft = ContractDraft {
        job_id: job,
        company_id: company,
        engineer_id: engineer,
        currency: Currency::new("GBP"),
        engagement: EngagementDraft::MilestoneBased {
            agreed_total: dec!(1000),
            milestones: vec![MilestoneDraft {
                description: "Delivery".to_string(),
                amount: dec!(1000),
            }],
        },
    };
    let contract = engine.create_contract(draft, &company_actor).await.unwrap();
    engine
        .sign_contract(contract.id, &engineer_actor, "Sam Engineer")
        .await
        .unwrap();
    engine
        .sign_contract(contract.id, &company_actor, "Acme Ltd")
        .await
        .unwrap();
    let m1 = contract.milestones().unwrap()[0].id;
    engine
        .fund_milestone(contract.id, m1, &company_actor)
        .await
        .unwrap();
    engine
        .submit_milestone_for_approval(contract.id, m1, &engineer_actor)
        .await
        .unwrap();
    engine
        .approve_milestone(contract.id, m1, &company_actor)
        .await
        .unwrap();
    let invoice = engine
        .generate_invoice(contract.id, PaymentTerms::Net7, &company_actor)
        .await
        .unwrap();

    let later = invoice.due_date + Duration::days(1);
    let sweeper = engine.clone();
    let sweep = tokio::spawn(async move { sweeper.mark_overdue_invoices(later).await });

    // The sweep has listed its candidates and is parked; settle now.
    engine.store().listed.notified().await;
    let paid = engine
        .mark_invoice_paid(invoice.id, &company_actor)
        .await
        .unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    engine.store().resume.notify_one();

    let swept = sweep.await.unwrap().unwrap();
    assert!(swept.is_empty(), "the settled invoice must not be swept");
    assert_eq!(
        engine.invoice(invoice.id).await.unwrap().status,
        InvoiceStatus::Paid
    );
}

#[tokio::test]
async fn notification_failure_never_rolls_back_a_transition() {
    let world = TestWorld::with_failing_emitter();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;
    approve_milestone(&world, &contract, m1).await;

    let invoice = world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap();
    assert_eq!(invoice.total, dec!(1000));

    let contract = world.engine.contract(contract.id).await.unwrap();
    assert_eq!(
        contract.milestones().unwrap()[0].status,
        MilestoneStatus::CompletedPaid
    );
}

#[tokio::test]
async fn successful_transitions_emit_notifications() {
    let world = TestWorld::new();
    let contract = world.active_milestone_contract("GBP", &[dec!(1000)]).await;
    let m1 = contract.milestones().unwrap()[0].id;
    approve_milestone(&world, &contract, m1).await;
    world
        .engine
        .generate_invoice(contract.id, PaymentTerms::Net14, &world.company_actor())
        .await
        .unwrap();

    let events = world.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::ContractCreated { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::MilestoneApproved { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::InvoiceIssued { .. })));
}
