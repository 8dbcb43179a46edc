// The milestone path: fund -> submit -> approve. Each operation gates
// on the milestone's source status. Re-applying an operation whose
// target status already holds returns the current state unchanged, so
// callers can retry after transient persistence failures.

use tracing::{info, Instrument};

use crate::auth::{authorize, Operation};
use crate::domain::{
    Actor, Contract, ContractId, ContractStatus, Milestone, MilestoneId, MilestoneStatus,
};
use crate::error::{EngineError, EntityKind};
use crate::notify::LifecycleEvent;
use crate::store::ContractStore;

use super::{lifecycle_span, ContractEngine};

impl<S: ContractStore> ContractEngine<S> {
    /// Commit escrow for a PENDING milestone. Requires an ACTIVE
    /// contract; no external payment rail is invoked.
    pub async fn fund_milestone(
        &self,
        contract_id: ContractId,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        self.advance_milestone(
            contract_id,
            milestone_id,
            actor,
            Operation::FundMilestone,
            MilestoneStatus::Pending,
            MilestoneStatus::FundedInProgress,
        )
        .await
    }

    /// Engineer hands in the deliverable for a funded milestone.
    pub async fn submit_milestone_for_approval(
        &self,
        contract_id: ContractId,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        self.advance_milestone(
            contract_id,
            milestone_id,
            actor,
            Operation::SubmitMilestone,
            MilestoneStatus::FundedInProgress,
            MilestoneStatus::SubmittedForApproval,
        )
        .await
    }

    /// Company accepts the deliverable; the milestone becomes billable.
    pub async fn approve_milestone(
        &self,
        contract_id: ContractId,
        milestone_id: MilestoneId,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        self.advance_milestone(
            contract_id,
            milestone_id,
            actor,
            Operation::ApproveMilestone,
            MilestoneStatus::SubmittedForApproval,
            MilestoneStatus::ApprovedPendingInvoice,
        )
        .await
    }

    async fn advance_milestone(
        &self,
        contract_id: ContractId,
        milestone_id: MilestoneId,
        actor: &Actor,
        op: Operation,
        source: MilestoneStatus,
        target: MilestoneStatus,
    ) -> Result<Milestone, EngineError> {
        let span = lifecycle_span(op, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;
            authorize(op, actor, &contract)?;
            require_milestone_engagement(&contract, op)?;

            if contract.status != ContractStatus::Active {
                return Err(EngineError::invalid_transition(
                    EntityKind::Contract,
                    contract.status,
                    op,
                ));
            }

            let milestone = contract
                .milestone_mut(milestone_id)
                .ok_or_else(|| EngineError::not_found(EntityKind::Milestone, milestone_id))?;

            if milestone.status == target {
                // Already satisfied; idempotent no-op.
                return Ok(milestone.clone());
            }
            if milestone.status != source {
                return Err(EngineError::invalid_transition(
                    EntityKind::Milestone,
                    milestone.status,
                    op,
                ));
            }

            milestone.status = target;
            let updated = milestone.clone();
            contract.touch();
            self.store().save_contract(&contract).await?;

            info!(
                contract.id = %contract_id,
                milestone.id = %milestone_id,
                from = %source,
                to = %target,
                "milestone advanced"
            );
            self.notify(match target {
                MilestoneStatus::FundedInProgress => LifecycleEvent::MilestoneFunded {
                    contract_id,
                    milestone_id,
                },
                MilestoneStatus::SubmittedForApproval => LifecycleEvent::MilestoneSubmitted {
                    contract_id,
                    milestone_id,
                },
                _ => LifecycleEvent::MilestoneApproved {
                    contract_id,
                    milestone_id,
                },
            })
            .await;
            Ok(updated)
        }
        .instrument(span)
        .await
    }
}

fn require_milestone_engagement(contract: &Contract, op: Operation) -> Result<(), EngineError> {
    if contract.milestones().is_none() {
        return Err(EngineError::invalid_transition(
            EntityKind::Contract,
            format!("a {} engagement", contract.engagement.kind()),
            op,
        ));
    }
    Ok(())
}
