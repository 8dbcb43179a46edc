use thiserror::Error;

use crate::auth::Operation;
use crate::domain::{ActorRole, ContractId};

/// Which kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Contract,
    Milestone,
    Timesheet,
    Invoice,
    Job,
    Company,
    Engineer,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityKind::Contract => "contract",
            EntityKind::Milestone => "milestone",
            EntityKind::Timesheet => "timesheet",
            EntityKind::Invoice => "invoice",
            EntityKind::Job => "job",
            EntityKind::Company => "company",
            EntityKind::Engineer => "engineer",
        };
        write!(f, "{s}")
    }
}

/// Typed errors returned by every engine operation. A rejected call
/// leaves all entities exactly as they were.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },

    #[error("{role} is not allowed to {operation}")]
    Unauthorized { operation: Operation, role: ActorRole },

    #[error("cannot {operation}: {entity} is {from}")]
    InvalidTransition {
        entity: EntityKind,
        from: String,
        operation: Operation,
    },

    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("contract {contract_id} has no milestones awaiting invoicing")]
    NoPendingMilestones { contract_id: ContractId },

    #[error("directory lookup failed: {0}")]
    Directory(#[source] anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(entity: EntityKind, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(
        entity: EntityKind,
        from: impl std::fmt::Display,
        operation: Operation,
    ) -> Self {
        EngineError::InvalidTransition {
            entity,
            from: from.to_string(),
            operation,
        }
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        EngineError::InvariantViolation {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by a [`ContractStore`](crate::store::ContractStore)
/// implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store corruption detected: {reason}")]
    Corrupt { reason: String },

    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
