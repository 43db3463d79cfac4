use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::payload::ClaimPayload;
use crate::domain::policy_type::PolicyType;
use crate::errors::DomainError;

/// A prior loss reported against one requested policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub date: NaiveDate,
    pub amount_paid: Decimal,
    pub amount_reserved: Decimal,
    pub missed_work: bool,
    pub open: bool,
}

impl Claim {
    pub fn from_payload(payload: ClaimPayload) -> Self {
        Self {
            date: payload.date,
            amount_paid: payload.amount_paid,
            amount_reserved: payload.amount_reserved,
            missed_work: payload.missed_work,
            open: payload.open,
        }
    }

    /// `missed_work` is a workers' comp notion and is dropped for other policy types.
    pub fn validate(
        &mut self,
        policy_type: PolicyType,
        founded: NaiveDate,
        today: NaiveDate,
    ) -> Result<(), DomainError> {
        if self.date > today {
            return Err(DomainError::validation(format!(
                "claim date {} cannot be in the future",
                self.date
            )));
        }
        if self.date < founded {
            return Err(DomainError::validation(format!(
                "claim date {} is before the business was founded ({founded})",
                self.date
            )));
        }
        if self.amount_paid.is_sign_negative() || self.amount_reserved.is_sign_negative() {
            return Err(DomainError::validation("claim amounts cannot be negative"));
        }
        if policy_type != PolicyType::Wc {
            self.missed_work = false;
        }
        Ok(())
    }
}
