// milemark - contract lifecycle and milestone-escrow engine
// This exposes the core components for testing and integration

pub mod auth;
pub mod config;
pub mod directory;
pub mod domain;
pub mod engine;
pub mod error;
pub mod notify;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use auth::{authorize, authorize_party, Operation, RequiredParty};
pub use config::{config, init_config, MilemarkConfig};
pub use directory::{CachedDirectory, Directory, StaticDirectory};
pub use domain::{
    Actor, ActorRole, CompanyId, Contract, ContractDraft, ContractId, ContractStatus, Currency,
    Engagement, EngagementDraft, EngineerId, Invoice, InvoiceId, InvoiceItem, InvoiceStatus,
    JobId, Milestone, MilestoneDraft, MilestoneId, MilestoneStatus, PaymentTerms, Period,
    Signature, Timesheet, TimesheetId, TimesheetStatus,
};
pub use engine::ContractEngine;
pub use error::{EngineError, EntityKind, StoreError};
pub use notify::{LifecycleEvent, NotificationEmitter, TracingEmitter};
pub use store::{ContractStore, JsonFileStore, MemoryStore};
#[cfg(feature = "database")]
pub use store::SqliteStore;
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
