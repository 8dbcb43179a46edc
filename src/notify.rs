// Fire-and-forget notification hook. Invoked after each successful
// transition; emitter failure is logged and never rolls back the
// transition that triggered it.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    ActorRole, ContractId, ContractStatus, InvoiceId, MilestoneId, TimesheetId,
};

/// Events the engine emits after a transition lands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LifecycleEvent {
    ContractCreated {
        contract_id: ContractId,
    },
    ContractSigned {
        contract_id: ContractId,
        signer: ActorRole,
        status: ContractStatus,
    },
    MilestoneFunded {
        contract_id: ContractId,
        milestone_id: MilestoneId,
    },
    MilestoneSubmitted {
        contract_id: ContractId,
        milestone_id: MilestoneId,
    },
    MilestoneApproved {
        contract_id: ContractId,
        milestone_id: MilestoneId,
    },
    TimesheetSubmitted {
        contract_id: ContractId,
        timesheet_id: TimesheetId,
    },
    TimesheetApproved {
        contract_id: ContractId,
        timesheet_id: TimesheetId,
    },
    InvoiceIssued {
        contract_id: ContractId,
        invoice_id: InvoiceId,
        total: Decimal,
    },
    InvoicePaid {
        invoice_id: InvoiceId,
    },
    ContractCompleted {
        contract_id: ContractId,
    },
}

#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}

/// Default emitter: structured log line per event.
#[derive(Debug, Default)]
pub struct TracingEmitter;

#[async_trait]
impl NotificationEmitter for TracingEmitter {
    async fn emit(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        info!(event = ?event, "lifecycle notification");
        Ok(())
    }
}

/// Emit an event, swallowing emitter failures with a warning.
pub async fn emit_best_effort(emitter: &dyn NotificationEmitter, event: LifecycleEvent) {
    if let Err(e) = emitter.emit(&event).await {
        warn!(error = %e, event = ?event, "notification emitter failed; transition unaffected");
    }
}
