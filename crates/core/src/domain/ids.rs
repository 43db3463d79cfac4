use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Zero until the application has been persisted.
    ApplicationId
);
numeric_id!(AgencyLocationId);
numeric_id!(InsurerId);
numeric_id!(QuestionId);
numeric_id!(AnswerId);
numeric_id!(QuoteId);
numeric_id!(PaymentPlanId);
numeric_id!(ActivityCodeId);

impl ApplicationId {
    pub fn is_assigned(&self) -> bool {
        self.0 > 0
    }
}
