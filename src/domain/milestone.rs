use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{ContractId, MilestoneId};

/// Escrow status of a single milestone. The sequence is strictly
/// forward; no transition may move a milestone back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneStatus {
    /// Agreed but not yet funded.
    Pending,
    /// Funds conceptually locked; engineer may work.
    FundedInProgress,
    /// Engineer has submitted the deliverable.
    SubmittedForApproval,
    /// Company accepted the deliverable; awaiting invoicing.
    ApprovedPendingInvoice,
    /// Consumed by an invoice; can never be billed again.
    CompletedPaid,
}

impl MilestoneStatus {
    /// The only status this one may advance to, if any.
    pub fn next(self) -> Option<MilestoneStatus> {
        match self {
            MilestoneStatus::Pending => Some(MilestoneStatus::FundedInProgress),
            MilestoneStatus::FundedInProgress => Some(MilestoneStatus::SubmittedForApproval),
            MilestoneStatus::SubmittedForApproval => Some(MilestoneStatus::ApprovedPendingInvoice),
            MilestoneStatus::ApprovedPendingInvoice => Some(MilestoneStatus::CompletedPaid),
            MilestoneStatus::CompletedPaid => None,
        }
    }

    /// Whether `target` is reachable from this status by zero or more
    /// forward steps.
    pub fn can_reach(self, target: MilestoneStatus) -> bool {
        let mut cursor = Some(self);
        while let Some(status) = cursor {
            if status == target {
                return true;
            }
            cursor = status.next();
        }
        false
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MilestoneStatus::Pending => "PENDING",
            MilestoneStatus::FundedInProgress => "FUNDED_IN_PROGRESS",
            MilestoneStatus::SubmittedForApproval => "SUBMITTED_FOR_APPROVAL",
            MilestoneStatus::ApprovedPendingInvoice => "APPROVED_PENDING_INVOICE",
            MilestoneStatus::CompletedPaid => "COMPLETED_PAID",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MilestoneStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MilestoneStatus::Pending),
            "FUNDED_IN_PROGRESS" => Ok(MilestoneStatus::FundedInProgress),
            "SUBMITTED_FOR_APPROVAL" => Ok(MilestoneStatus::SubmittedForApproval),
            "APPROVED_PENDING_INVOICE" => Ok(MilestoneStatus::ApprovedPendingInvoice),
            "COMPLETED_PAID" => Ok(MilestoneStatus::CompletedPaid),
            other => Err(format!("unknown milestone status: {other}")),
        }
    }
}

/// A discrete, priced deliverable within a fixed-scope contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub contract_id: ContractId,
    pub description: String,
    /// Positive, in the currency of the owning contract.
    pub amount: Decimal,
    pub status: MilestoneStatus,
}

impl Milestone {
    pub fn is_billable(&self) -> bool {
        self.status == MilestoneStatus::ApprovedPendingInvoice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_sequence_is_strictly_forward() {
        let mut status = MilestoneStatus::Pending;
        let expected = [
            MilestoneStatus::FundedInProgress,
            MilestoneStatus::SubmittedForApproval,
            MilestoneStatus::ApprovedPendingInvoice,
            MilestoneStatus::CompletedPaid,
        ];
        for want in expected {
            status = status.next().unwrap();
            assert_eq!(status, want);
        }
        assert_eq!(status.next(), None);
    }

    #[test]
    fn terminal_status_reaches_nothing_further() {
        assert!(MilestoneStatus::Pending.can_reach(MilestoneStatus::CompletedPaid));
        assert!(!MilestoneStatus::CompletedPaid.can_reach(MilestoneStatus::Pending));
        assert!(!MilestoneStatus::ApprovedPendingInvoice.can_reach(MilestoneStatus::Pending));
    }
}
