// Typed identifiers for every entity the engine touches.
//
// Each id wraps a UUID so a milestone id can never be passed where a
// contract id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

entity_id!(
    /// Identifier of a contract aggregate.
    ContractId
);
entity_id!(
    /// Identifier of a milestone within a contract.
    MilestoneId
);
entity_id!(
    /// Identifier of a timesheet within a day-rate contract.
    TimesheetId
);
entity_id!(
    /// Identifier of a generated invoice.
    InvoiceId
);
entity_id!(
    /// Identifier of a job posting in the external directory.
    JobId
);
entity_id!(
    /// Identifier of a company account in the external directory.
    CompanyId
);
entity_id!(
    /// Identifier of an engineer account in the external directory.
    EngineerId
);
