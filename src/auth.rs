// Role-based authorization, consolidated into one policy table so the
// signature, milestone, timesheet, and invoice paths cannot drift.

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, ActorRole, Contract};
use crate::error::EngineError;

/// Every lifecycle operation the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    CreateContract,
    SignContract,
    FundMilestone,
    SubmitMilestone,
    ApproveMilestone,
    SubmitTimesheet,
    ApproveTimesheet,
    GenerateInvoice,
    MarkInvoicePaid,
    CompleteContract,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::CreateContract => "create contract",
            Operation::SignContract => "sign contract",
            Operation::FundMilestone => "fund milestone",
            Operation::SubmitMilestone => "submit milestone for approval",
            Operation::ApproveMilestone => "approve milestone",
            Operation::SubmitTimesheet => "submit timesheet",
            Operation::ApproveTimesheet => "approve timesheet",
            Operation::GenerateInvoice => "generate invoice",
            Operation::MarkInvoicePaid => "mark invoice paid",
            Operation::CompleteContract => "complete contract",
        };
        write!(f, "{s}")
    }
}

/// Which side of the contract an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredParty {
    /// The contract's engineer, and nobody else.
    Engineer,
    /// The contract's company, or a platform admin.
    Company,
}

/// The policy table: each operation requires exactly one party.
/// `SignContract` is absent here on purpose; the expected signer
/// depends on the contract's current status and the signature
/// coordinator resolves it before calling [`authorize_party`].
pub fn required_party(op: Operation) -> RequiredParty {
    match op {
        Operation::SubmitMilestone | Operation::SubmitTimesheet => RequiredParty::Engineer,
        Operation::CreateContract
        | Operation::SignContract
        | Operation::FundMilestone
        | Operation::ApproveMilestone
        | Operation::ApproveTimesheet
        | Operation::GenerateInvoice
        | Operation::MarkInvoicePaid
        | Operation::CompleteContract => RequiredParty::Company,
    }
}

/// Check that `actor` may perform `op` against `contract`.
pub fn authorize(op: Operation, actor: &Actor, contract: &Contract) -> Result<(), EngineError> {
    authorize_party(required_party(op), op, actor, contract)
}

/// Check that `actor` is the given party of `contract`. Admins pass any
/// company-side check; the engineer side admits only the contract's own
/// engineer.
pub fn authorize_party(
    party: RequiredParty,
    op: Operation,
    actor: &Actor,
    contract: &Contract,
) -> Result<(), EngineError> {
    let allowed = match party {
        RequiredParty::Engineer => {
            actor.role == ActorRole::Engineer && actor.id == contract.engineer_id.0
        }
        RequiredParty::Company => match actor.role {
            ActorRole::Admin => true,
            ActorRole::Company => actor.id == contract.company_id.0,
            ActorRole::Engineer => false,
        },
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::Unauthorized {
            operation: op,
            role: actor.role,
        })
    }
}
