use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::ActivityCodeId;
use crate::domain::payload::ActivityCodePayload;
use crate::errors::DomainError;

/// A workers' comp class of work performed at a location, with its annual payroll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCode {
    pub id: ActivityCodeId,
    pub payroll: Decimal,
}

impl ActivityCode {
    pub fn from_payload(payload: ActivityCodePayload) -> Self {
        Self { id: payload.id, payroll: payload.payroll }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.0 == 0 {
            return Err(DomainError::validation("activity code id must be a positive integer"));
        }
        if self.payroll <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "payroll for activity code {} must be greater than zero",
                self.id
            )));
        }
        Ok(())
    }
}

pub fn validate_all(codes: &[ActivityCode]) -> Result<(), DomainError> {
    let mut seen = BTreeSet::new();
    for code in codes {
        code.validate()?;
        if !seen.insert(code.id) {
            return Err(DomainError::validation(format!(
                "activity code {} is listed more than once for the same location",
                code.id
            )));
        }
    }
    Ok(())
}
