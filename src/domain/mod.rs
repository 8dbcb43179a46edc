// Domain model for the contract lifecycle engine

pub mod actor;
pub mod contract;
pub mod ids;
pub mod invoice;
pub mod milestone;
pub mod timesheet;

pub use actor::{Actor, ActorRole};
pub use contract::{
    Contract, ContractDraft, ContractStatus, Currency, Engagement, EngagementDraft,
    MilestoneDraft, Signature,
};
pub use ids::{CompanyId, ContractId, EngineerId, InvoiceId, JobId, MilestoneId, TimesheetId};
pub use invoice::{Invoice, InvoiceItem, InvoiceStatus, PaymentTerms};
pub use milestone::{Milestone, MilestoneStatus};
pub use timesheet::{Period, Timesheet, TimesheetStatus};
