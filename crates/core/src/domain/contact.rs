use serde::{Deserialize, Serialize};

use crate::domain::payload::ContactPayload;
use crate::domain::rules::{is_valid_email, normalize_phone};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub primary: bool,
}

impl Contact {
    pub fn from_payload(payload: ContactPayload) -> Self {
        let phone = normalize_phone(&payload.phone).unwrap_or_else(|| payload.phone.trim().to_owned());
        Self {
            first_name: payload.first_name.trim().to_owned(),
            last_name: payload.last_name.trim().to_owned(),
            email: payload.email.trim().to_lowercase(),
            phone,
            primary: payload.primary,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.first_name.is_empty() {
            return Err(DomainError::validation("contact first_name is required"));
        }
        if self.last_name.is_empty() {
            return Err(DomainError::validation("contact last_name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(DomainError::validation(format!(
                "contact email '{}' is not a valid email address",
                self.email
            )));
        }
        if normalize_phone(&self.phone).is_none() {
            return Err(DomainError::validation(format!(
                "contact phone '{}' must be a 10 digit phone number",
                self.phone
            )));
        }
        Ok(())
    }
}

/// Exactly one contact ends up primary. The first contact is promoted when none is flagged.
pub fn elect_primary(contacts: &mut [Contact]) -> Result<(), DomainError> {
    match contacts.iter().filter(|contact| contact.primary).count() {
        0 => {
            let Some(first) = contacts.first_mut() else {
                return Err(DomainError::validation("at least one contact is required"));
            };
            first.primary = true;
            Ok(())
        }
        1 => Ok(()),
        _ => Err(DomainError::validation("only one contact may be marked primary")),
    }
}
