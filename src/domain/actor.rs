use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role an acting user holds when invoking a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorRole {
    /// The engineer party to a contract.
    Engineer,
    /// The company party to a contract.
    Company,
    /// Platform administrator; passes any company-side check.
    Admin,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Engineer => write!(f, "engineer"),
            ActorRole::Company => write!(f, "company"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

/// The acting user behind a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn engineer(id: Uuid) -> Self {
        Self::new(id, ActorRole::Engineer)
    }

    pub fn company(id: Uuid) -> Self {
        Self::new(id, ActorRole::Company)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, ActorRole::Admin)
    }
}
