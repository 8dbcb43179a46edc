use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{CompanyId, ContractId, EngineerId, JobId, MilestoneId, TimesheetId};
use super::milestone::{Milestone, MilestoneStatus};
use super::timesheet::{Timesheet, TimesheetStatus};

/// ISO-4217 currency code, e.g. "GBP". The engine never converts
/// between currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(pub String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract lifecycle status. Monotonic: no operation moves a contract
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractStatus {
    Draft,
    PendingSignature,
    Signed,
    Active,
    Completed,
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContractStatus::Draft => "DRAFT",
            ContractStatus::PendingSignature => "PENDING_SIGNATURE",
            ContractStatus::Signed => "SIGNED",
            ContractStatus::Active => "ACTIVE",
            ContractStatus::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(ContractStatus::Draft),
            "PENDING_SIGNATURE" => Ok(ContractStatus::PendingSignature),
            "SIGNED" => Ok(ContractStatus::Signed),
            "ACTIVE" => Ok(ContractStatus::Active),
            "COMPLETED" => Ok(ContractStatus::Completed),
            other => Err(format!("unknown contract status: {other}")),
        }
    }
}

/// A recorded signature. Never overwritten once stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub signed_at: DateTime<Utc>,
}

/// The two engagement types, as a tagged union so milestone-only data
/// and timesheet-only data can never coexist on one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Engagement {
    /// Fixed-scope statement of work billed per milestone.
    MilestoneBased {
        agreed_total: Decimal,
        milestones: Vec<Milestone>,
    },
    /// Open-ended work billed per reported period.
    DayRate {
        day_rate: Decimal,
        timesheets: Vec<Timesheet>,
    },
}

impl Engagement {
    pub fn kind(&self) -> &'static str {
        match self {
            Engagement::MilestoneBased { .. } => "milestone-based",
            Engagement::DayRate { .. } => "day-rate",
        }
    }
}

/// The contract aggregate. Milestones and timesheets are owned by the
/// contract and cannot outlive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub engineer_id: EngineerId,
    pub currency: Currency,
    pub status: ContractStatus,
    pub engagement: Engagement,
    pub engineer_signature: Option<Signature>,
    pub company_signature: Option<Signature>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    pub fn is_active(&self) -> bool {
        self.status == ContractStatus::Active
    }

    pub fn both_signed(&self) -> bool {
        self.engineer_signature.is_some() && self.company_signature.is_some()
    }

    pub fn milestones(&self) -> Option<&[Milestone]> {
        match &self.engagement {
            Engagement::MilestoneBased { milestones, .. } => Some(milestones),
            Engagement::DayRate { .. } => None,
        }
    }

    pub fn milestones_mut(&mut self) -> Option<&mut Vec<Milestone>> {
        match &mut self.engagement {
            Engagement::MilestoneBased { milestones, .. } => Some(milestones),
            Engagement::DayRate { .. } => None,
        }
    }

    pub fn milestone(&self, id: MilestoneId) -> Option<&Milestone> {
        self.milestones()?.iter().find(|m| m.id == id)
    }

    pub fn milestone_mut(&mut self, id: MilestoneId) -> Option<&mut Milestone> {
        self.milestones_mut()?.iter_mut().find(|m| m.id == id)
    }

    pub fn timesheets(&self) -> Option<&[Timesheet]> {
        match &self.engagement {
            Engagement::DayRate { timesheets, .. } => Some(timesheets),
            Engagement::MilestoneBased { .. } => None,
        }
    }

    pub fn timesheets_mut(&mut self) -> Option<&mut Vec<Timesheet>> {
        match &mut self.engagement {
            Engagement::DayRate { timesheets, .. } => Some(timesheets),
            Engagement::MilestoneBased { .. } => None,
        }
    }

    pub fn timesheet_mut(&mut self, id: TimesheetId) -> Option<&mut Timesheet> {
        self.timesheets_mut()?.iter_mut().find(|t| t.id == id)
    }

    /// Whether every deliverable has been paid out, i.e. the contract
    /// is eligible for completion.
    pub fn is_settled(&self) -> bool {
        match &self.engagement {
            Engagement::MilestoneBased { milestones, .. } => milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::CompletedPaid),
            Engagement::DayRate { timesheets, .. } => {
                timesheets.iter().all(|t| t.status == TimesheetStatus::Paid)
            }
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Milestone as supplied at contract creation, before ids are assigned.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MilestoneDraft {
    pub description: String,
    pub amount: Decimal,
}

/// Engagement terms as supplied at contract creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum EngagementDraft {
    MilestoneBased {
        agreed_total: Decimal,
        milestones: Vec<MilestoneDraft>,
    },
    DayRate {
        day_rate: Decimal,
    },
}

/// Everything needed to create a contract in DRAFT.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractDraft {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub engineer_id: EngineerId,
    pub currency: Currency,
    pub engagement: EngagementDraft,
}
