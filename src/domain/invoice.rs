use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{CompanyId, ContractId, EngineerId, InvoiceId, MilestoneId};

/// Net-N payment terms: days after issuance by which payment is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTerms {
    Net7,
    Net14,
    Net30,
    NetDays(u32),
}

impl PaymentTerms {
    pub fn days(self) -> i64 {
        match self {
            PaymentTerms::Net7 => 7,
            PaymentTerms::Net14 => 14,
            PaymentTerms::Net30 => 30,
            PaymentTerms::NetDays(n) => i64::from(n),
        }
    }

    pub fn due_date(self, issue_date: NaiveDate) -> NaiveDate {
        issue_date + Duration::days(self.days())
    }
}

impl From<u32> for PaymentTerms {
    fn from(days: u32) -> Self {
        match days {
            7 => PaymentTerms::Net7,
            14 => PaymentTerms::Net14,
            30 => PaymentTerms::Net30,
            n => PaymentTerms::NetDays(n),
        }
    }
}

impl std::fmt::Display for PaymentTerms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Net-{}", self.days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Sent,
    Paid,
    Overdue,
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SENT" => Ok(InvoiceStatus::Sent),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            other => Err(format!("unknown invoice status: {other}")),
        }
    }
}

/// One invoice line, drawn from exactly one consumed milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub milestone_id: MilestoneId,
    pub description: String,
    pub amount: Decimal,
}

/// An invoice over a contract's approved-but-uninvoiced milestones.
/// `consumed_milestones` records, for audit, exactly which milestones
/// this invoice moved to COMPLETED_PAID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub contract_id: ContractId,
    pub company_id: CompanyId,
    pub engineer_id: EngineerId,
    pub items: Vec<InvoiceItem>,
    pub total: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub consumed_milestones: Vec<MilestoneId>,
}

impl Invoice {
    /// Items always sum to the stored total; checked by tests and the
    /// store on load.
    pub fn items_total(&self) -> Decimal {
        self.items.iter().map(|i| i.amount).sum()
    }

    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status == InvoiceStatus::Sent && today > self.due_date
    }
}
