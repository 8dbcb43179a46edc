// Contract creation and completion.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, Instrument};

use crate::auth::{authorize, Operation};
use crate::domain::{
    Actor, ActorRole, Contract, ContractDraft, ContractId, ContractStatus, Engagement,
    EngagementDraft, Milestone, MilestoneId, MilestoneStatus,
};
use crate::error::{EngineError, EntityKind};
use crate::notify::LifecycleEvent;
use crate::store::ContractStore;

use super::{lifecycle_span, ContractEngine};

impl<S: ContractStore> ContractEngine<S> {
    /// Create a contract in DRAFT. The referenced job, company, and
    /// engineer must exist in the directory; milestone amounts must be
    /// positive and sum to the agreed total.
    pub async fn create_contract(
        &self,
        draft: ContractDraft,
        actor: &Actor,
    ) -> Result<Contract, EngineError> {
        let span = lifecycle_span(Operation::CreateContract, None, Some(actor));
        async {
            // No contract exists yet, so the company-side check is
            // against the draft's company id.
            let allowed = match actor.role {
                ActorRole::Admin => true,
                ActorRole::Company => actor.id == draft.company_id.0,
                ActorRole::Engineer => false,
            };
            if !allowed {
                return Err(EngineError::Unauthorized {
                    operation: Operation::CreateContract,
                    role: actor.role,
                });
            }

            self.validate_directory_refs(&draft).await?;

            let contract_id = ContractId::new();
            let engagement = match draft.engagement {
                EngagementDraft::MilestoneBased {
                    agreed_total,
                    milestones,
                } => {
                    if milestones.is_empty() {
                        return Err(EngineError::invariant(
                            "milestone-based contract requires at least one milestone",
                        ));
                    }
                    for m in &milestones {
                        if m.amount <= Decimal::ZERO {
                            return Err(EngineError::invariant(format!(
                                "milestone \"{}\" has non-positive amount {}",
                                m.description, m.amount
                            )));
                        }
                    }
                    let sum: Decimal = milestones.iter().map(|m| m.amount).sum();
                    if sum != agreed_total {
                        return Err(EngineError::invariant(format!(
                            "milestone amounts sum to {sum} but agreed total is {agreed_total}"
                        )));
                    }
                    Engagement::MilestoneBased {
                        agreed_total,
                        milestones: milestones
                            .into_iter()
                            .map(|m| Milestone {
                                id: MilestoneId::new(),
                                contract_id,
                                description: m.description,
                                amount: m.amount,
                                status: MilestoneStatus::Pending,
                            })
                            .collect(),
                    }
                }
                EngagementDraft::DayRate { day_rate } => {
                    if day_rate <= Decimal::ZERO {
                        return Err(EngineError::invariant(format!(
                            "day rate must be positive, got {day_rate}"
                        )));
                    }
                    Engagement::DayRate {
                        day_rate,
                        timesheets: vec![],
                    }
                }
            };

            let now = Utc::now();
            let contract = Contract {
                id: contract_id,
                job_id: draft.job_id,
                company_id: draft.company_id,
                engineer_id: draft.engineer_id,
                currency: draft.currency,
                status: ContractStatus::Draft,
                engagement,
                engineer_signature: None,
                company_signature: None,
                created_at: now,
                updated_at: now,
            };

            self.store().save_contract(&contract).await?;
            info!(
                contract.id = %contract.id,
                engagement = contract.engagement.kind(),
                "contract created in DRAFT"
            );
            self.notify(LifecycleEvent::ContractCreated {
                contract_id: contract.id,
            })
            .await;
            Ok(contract)
        }
        .instrument(span)
        .await
    }

    /// Move an ACTIVE contract to COMPLETED once every milestone is
    /// paid out (or every timesheet, for day-rate work).
    pub async fn complete_contract(
        &self,
        contract_id: ContractId,
        actor: &Actor,
    ) -> Result<Contract, EngineError> {
        let span = lifecycle_span(Operation::CompleteContract, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;
            authorize(Operation::CompleteContract, actor, &contract)?;

            if contract.status != ContractStatus::Active {
                return Err(EngineError::invalid_transition(
                    EntityKind::Contract,
                    contract.status,
                    Operation::CompleteContract,
                ));
            }
            if !contract.is_settled() {
                return Err(EngineError::invalid_transition(
                    EntityKind::Contract,
                    "ACTIVE with unsettled deliverables",
                    Operation::CompleteContract,
                ));
            }

            contract.status = ContractStatus::Completed;
            contract.touch();
            self.store().save_contract(&contract).await?;
            info!(contract.id = %contract.id, "contract completed");
            self.notify(LifecycleEvent::ContractCompleted { contract_id })
                .await;
            Ok(contract)
        }
        .instrument(span)
        .await
    }

    async fn validate_directory_refs(&self, draft: &ContractDraft) -> Result<(), EngineError> {
        if !self
            .directory
            .job_exists(draft.job_id)
            .await
            .map_err(EngineError::Directory)?
        {
            return Err(EngineError::not_found(EntityKind::Job, draft.job_id));
        }
        if !self
            .directory
            .company_exists(draft.company_id)
            .await
            .map_err(EngineError::Directory)?
        {
            return Err(EngineError::not_found(EntityKind::Company, draft.company_id));
        }
        if !self
            .directory
            .engineer_exists(draft.engineer_id)
            .await
            .map_err(EngineError::Directory)?
        {
            return Err(EngineError::not_found(
                EntityKind::Engineer,
                draft.engineer_id,
            ));
        }
        Ok(())
    }
}
