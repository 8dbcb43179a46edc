// Shared fixtures for the engine integration tests: an engine over the
// in-memory store, a static directory seeded with one job, company, and
// engineer, and an emitter that records every notification.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use milemark::{
    Actor, CompanyId, Contract, ContractDraft, ContractEngine, Currency, EngagementDraft,
    EngineerId, JobId, LifecycleEvent, MemoryStore, MilestoneDraft, NotificationEmitter,
    StaticDirectory,
};

/// Emitter that records events so tests can assert on notifications.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    pub events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

#[async_trait]
impl NotificationEmitter for RecordingEmitter {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Emitter that always fails; transitions must still land.
#[derive(Debug, Default)]
pub struct FailingEmitter;

#[async_trait]
impl NotificationEmitter for FailingEmitter {
    async fn emit(&self, _event: &LifecycleEvent) -> anyhow::Result<()> {
        anyhow::bail!("notification channel down")
    }
}

pub struct TestWorld {
    pub engine: ContractEngine<MemoryStore>,
    pub events: Arc<Mutex<Vec<LifecycleEvent>>>,
    pub job: JobId,
    pub company: CompanyId,
    pub engineer: EngineerId,
}

impl TestWorld {
    pub fn new() -> Self {
        let job = JobId::new();
        let company = CompanyId::new();
        let engineer = EngineerId::new();
        let directory = StaticDirectory::new()
            .with_job(job)
            .with_company(company)
            .with_engineer(engineer);
        let emitter = RecordingEmitter::default();
        let events = emitter.events.clone();
        let engine = ContractEngine::new(
            MemoryStore::new(),
            Arc::new(directory),
            Arc::new(emitter),
        );
        Self {
            engine,
            events,
            job,
            company,
            engineer,
        }
    }

    pub fn with_failing_emitter() -> Self {
        let mut world = Self::new();
        let job = world.job;
        let company = world.company;
        let engineer = world.engineer;
        let directory = StaticDirectory::new()
            .with_job(job)
            .with_company(company)
            .with_engineer(engineer);
        world.engine = ContractEngine::new(
            MemoryStore::new(),
            Arc::new(directory),
            Arc::new(FailingEmitter),
        );
        world
    }

    pub fn company_actor(&self) -> Actor {
        Actor::company(self.company.0)
    }

    pub fn engineer_actor(&self) -> Actor {
        Actor::engineer(self.engineer.0)
    }

    pub fn admin_actor(&self) -> Actor {
        Actor::admin(uuid::Uuid::new_v4())
    }

    pub fn milestone_draft(&self, currency: &str, amounts: &[Decimal]) -> ContractDraft {
        ContractDraft {
            job_id: self.job,
            company_id: self.company,
            engineer_id: self.engineer,
            currency: Currency::new(currency),
            engagement: EngagementDraft::MilestoneBased {
                agreed_total: amounts.iter().copied().sum(),
                milestones: amounts
                    .iter()
                    .enumerate()
                    .map(|(i, amount)| MilestoneDraft {
                        description: format!("Milestone {}", i + 1),
                        amount: *amount,
                    })
                    .collect(),
            },
        }
    }

    pub fn day_rate_draft(&self, currency: &str, day_rate: Decimal) -> ContractDraft {
        ContractDraft {
            job_id: self.job,
            company_id: self.company,
            engineer_id: self.engineer,
            currency: Currency::new(currency),
            engagement: EngagementDraft::DayRate { day_rate },
        }
    }

    /// Create a milestone contract and take it through both signatures
    /// to ACTIVE.
    pub async fn active_milestone_contract(
        &self,
        currency: &str,
        amounts: &[Decimal],
    ) -> Contract {
        let contract = self
            .engine
            .create_contract(self.milestone_draft(currency, amounts), &self.company_actor())
            .await
            .expect("create contract");
        self.activate(contract).await
    }

    pub async fn active_day_rate_contract(&self, currency: &str, day_rate: Decimal) -> Contract {
        let contract = self
            .engine
            .create_contract(self.day_rate_draft(currency, day_rate), &self.company_actor())
            .await
            .expect("create contract");
        self.activate(contract).await
    }

    async fn activate(&self, contract: Contract) -> Contract {
        self.engine
            .sign_contract(contract.id, &self.engineer_actor(), "Sam Engineer")
            .await
            .expect("engineer signs");
        self.engine
            .sign_contract(contract.id, &self.company_actor(), "Acme Ltd")
            .await
            .expect("company signs")
    }
}
