// The day-rate path. Simpler than milestones on purpose: there is no
// funded escrow step, approval settles the timesheet directly.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, Instrument};

use crate::auth::{authorize, Operation};
use crate::domain::{
    Actor, Contract, ContractId, ContractStatus, Period, Timesheet, TimesheetId,
    TimesheetStatus,
};
use crate::error::{EngineError, EntityKind};
use crate::notify::LifecycleEvent;
use crate::store::ContractStore;

use super::{lifecycle_span, ContractEngine};

impl<S: ContractStore> ContractEngine<S> {
    /// Engineer reports a worked period on an ACTIVE day-rate contract.
    pub async fn submit_timesheet(
        &self,
        contract_id: ContractId,
        period: Period,
        units_worked: Decimal,
        actor: &Actor,
    ) -> Result<Timesheet, EngineError> {
        let span = lifecycle_span(Operation::SubmitTimesheet, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;
            authorize(Operation::SubmitTimesheet, actor, &contract)?;
            require_day_rate_engagement(&contract, Operation::SubmitTimesheet)?;

            if contract.status != ContractStatus::Active {
                return Err(EngineError::invalid_transition(
                    EntityKind::Contract,
                    contract.status,
                    Operation::SubmitTimesheet,
                ));
            }
            if !period.is_valid() {
                return Err(EngineError::invariant(format!(
                    "timesheet period {period} ends before it starts"
                )));
            }
            if units_worked <= Decimal::ZERO {
                return Err(EngineError::invariant(format!(
                    "units worked must be positive, got {units_worked}"
                )));
            }

            let timesheet = Timesheet {
                id: TimesheetId::new(),
                contract_id,
                engineer_id: contract.engineer_id,
                period,
                units_worked,
                status: TimesheetStatus::Submitted,
                submitted_at: Utc::now(),
            };

            // Engagement verified above; the push cannot miss.
            if let Some(timesheets) = contract.timesheets_mut() {
                timesheets.push(timesheet.clone());
            }
            contract.touch();
            self.store().save_contract(&contract).await?;

            info!(
                contract.id = %contract_id,
                timesheet.id = %timesheet.id,
                period = %timesheet.period,
                "timesheet submitted"
            );
            self.notify(LifecycleEvent::TimesheetSubmitted {
                contract_id,
                timesheet_id: timesheet.id,
            })
            .await;
            Ok(timesheet)
        }
        .instrument(span)
        .await
    }

    /// Counter-party settles a submitted timesheet.
    pub async fn approve_timesheet(
        &self,
        contract_id: ContractId,
        timesheet_id: TimesheetId,
        actor: &Actor,
    ) -> Result<Timesheet, EngineError> {
        let span = lifecycle_span(Operation::ApproveTimesheet, Some(contract_id), Some(actor));
        async {
            let lock = self.contract_lock(contract_id).await;
            let _guard = lock.lock().await;

            let mut contract = self.load_required(contract_id).await?;
            authorize(Operation::ApproveTimesheet, actor, &contract)?;
            require_day_rate_engagement(&contract, Operation::ApproveTimesheet)?;

            let timesheet = contract
                .timesheet_mut(timesheet_id)
                .ok_or_else(|| EngineError::not_found(EntityKind::Timesheet, timesheet_id))?;

            if timesheet.status != TimesheetStatus::Submitted {
                return Err(EngineError::invalid_transition(
                    EntityKind::Timesheet,
                    timesheet.status,
                    Operation::ApproveTimesheet,
                ));
            }

            timesheet.status = TimesheetStatus::Paid;
            let updated = timesheet.clone();
            contract.touch();
            self.store().save_contract(&contract).await?;

            info!(
                contract.id = %contract_id,
                timesheet.id = %timesheet_id,
                "timesheet approved and settled"
            );
            self.notify(LifecycleEvent::TimesheetApproved {
                contract_id,
                timesheet_id,
            })
            .await;
            Ok(updated)
        }
        .instrument(span)
        .await
    }
}

fn require_day_rate_engagement(contract: &Contract, op: Operation) -> Result<(), EngineError> {
    if contract.timesheets().is_none() {
        return Err(EngineError::invalid_transition(
            EntityKind::Contract,
            format!("a {} engagement", contract.engagement.kind()),
            op,
        ));
    }
    Ok(())
}
