use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{ContractId, EngineerId, TimesheetId};

/// Inclusive date range a timesheet covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Payment status of a reported work period. There is no funded escrow
/// step for day-rate work; approval implies settlement is handled
/// outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimesheetStatus {
    Submitted,
    Paid,
}

impl std::fmt::Display for TimesheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimesheetStatus::Submitted => write!(f, "SUBMITTED"),
            TimesheetStatus::Paid => write!(f, "PAID"),
        }
    }
}

impl std::str::FromStr for TimesheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(TimesheetStatus::Submitted),
            "PAID" => Ok(TimesheetStatus::Paid),
            other => Err(format!("unknown timesheet status: {other}")),
        }
    }
}

/// Work reported by the engineer on a day-rate engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: TimesheetId,
    pub contract_id: ContractId,
    pub engineer_id: EngineerId,
    pub period: Period,
    /// Days (or hours) worked in the period; positive.
    pub units_worked: Decimal,
    pub status: TimesheetStatus,
    pub submitted_at: DateTime<Utc>,
}
