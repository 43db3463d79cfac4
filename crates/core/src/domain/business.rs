//! The insured business and its jurisdiction rules.
//!
//! Validation is ordered: standalone field checks first, then the mailing
//! zip lookup that yields `primary_territory`, then contacts and locations,
//! then the composite rules that depend on entity type, territory and
//! whether workers' comp was requested. The first violation is returned.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::contact::{self, Contact};
use crate::domain::ids::ActivityCodeId;
use crate::domain::location::Location;
use crate::domain::payload::{BusinessPayload, TaxIdType};
use crate::domain::policy_type::PolicyType;
use crate::domain::rules::{
    is_valid_website, is_valid_zip, normalize_phone, normalize_tax_id, normalize_zip,
};
use crate::errors::{DomainError, EngineError};
use crate::ports::ZipCodeLookup;

const MAX_NAME_LENGTH: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    Association,
    Corporation,
    LimitedLiabilityCompany,
    LimitedPartnership,
    Partnership,
    SoleProprietorship,
    Other,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::Association,
        EntityType::Corporation,
        EntityType::LimitedLiabilityCompany,
        EntityType::LimitedPartnership,
        EntityType::Partnership,
        EntityType::SoleProprietorship,
        EntityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Association => "Association",
            Self::Corporation => "Corporation",
            Self::LimitedLiabilityCompany => "Limited Liability Company",
            Self::LimitedPartnership => "Limited Partnership",
            Self::Partnership => "Partnership",
            Self::SoleProprietorship => "Sole Proprietorship",
            Self::Other => "Other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|entity| entity.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub first_name: String,
    pub last_name: String,
    pub ownership: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub name: String,
    pub dba: Option<String>,
    pub entity_type: String,
    pub tax_id: String,
    pub tax_id_type: TaxIdType,
    pub founded: NaiveDate,
    pub industry_code: u64,
    pub website: Option<String>,
    pub phone: String,
    pub mailing_address: String,
    pub mailing_zip: String,
    pub mailing_city: Option<String>,
    pub mailing_territory: Option<String>,
    pub primary_territory: Option<String>,
    pub owners: Vec<Owner>,
    pub num_owners: Option<u32>,
    pub owners_included: bool,
    pub management_structure: Option<String>,
    pub corporation_type: Option<String>,
    pub unincorporated_association: Option<bool>,
    pub contacts: Vec<Contact>,
    pub locations: Vec<Location>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

impl Business {
    pub fn from_payload(payload: BusinessPayload) -> Self {
        Self {
            name: payload.name.trim().to_owned(),
            dba: non_blank(payload.dba),
            entity_type: payload.entity_type.trim().to_owned(),
            tax_id: payload.tax_id,
            tax_id_type: payload.tax_id_type,
            founded: payload.founded,
            industry_code: payload.industry_code,
            website: non_blank(payload.website),
            phone: payload.phone,
            mailing_address: payload.mailing_address.trim().to_owned(),
            mailing_zip: normalize_zip(&payload.mailing_zip),
            mailing_city: None,
            mailing_territory: None,
            primary_territory: None,
            owners: payload
                .owners
                .into_iter()
                .map(|owner| Owner {
                    first_name: owner.first_name.trim().to_owned(),
                    last_name: owner.last_name.trim().to_owned(),
                    ownership: owner.ownership,
                })
                .collect(),
            num_owners: payload.num_owners,
            owners_included: payload.owners_included,
            management_structure: non_blank(payload.management_structure)
                .map(|value| value.to_lowercase()),
            corporation_type: non_blank(payload.corporation_type).map(|value| value.to_lowercase()),
            unincorporated_association: payload.unincorporated_association,
            contacts: payload.contacts.into_iter().map(Contact::from_payload).collect(),
            locations: payload.locations.into_iter().map(Location::from_payload).collect(),
        }
    }

    pub fn entity(&self) -> Option<EntityType> {
        EntityType::parse(&self.entity_type)
    }

    pub fn primary_contact(&self) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.primary)
    }

    /// Distinct territories across all locations, available after validation.
    pub fn territories(&self) -> BTreeSet<String> {
        self.locations.iter().filter_map(|location| location.territory.clone()).collect()
    }

    pub fn zip_codes(&self) -> BTreeSet<String> {
        self.locations.iter().map(|location| location.zip.clone()).collect()
    }

    pub fn activity_codes(&self) -> BTreeSet<ActivityCodeId> {
        self.locations
            .iter()
            .flat_map(|location| location.activity_codes.iter().map(|code| code.id))
            .collect()
    }

    pub async fn validate(
        &mut self,
        policy_types: &[PolicyType],
        today: NaiveDate,
        zips: &dyn ZipCodeLookup,
    ) -> Result<(), EngineError> {
        self.check_fields(today)?;

        let mailing = zips.lookup(&self.mailing_zip).await?.ok_or_else(|| {
            DomainError::validation(format!(
                "mailing_zip '{}' is not a known zip code",
                self.mailing_zip
            ))
        })?;
        self.mailing_city = Some(mailing.city);
        self.mailing_territory = Some(mailing.territory.clone());
        self.primary_territory = Some(mailing.territory);

        contact::elect_primary(&mut self.contacts)?;
        for contact in &self.contacts {
            contact.validate()?;
        }

        if self.locations.is_empty() {
            return Err(DomainError::validation("at least one business location is required").into());
        }
        let has_wc = policy_types.contains(&PolicyType::Wc);
        for location in &mut self.locations {
            location.validate(has_wc, zips).await?;
        }

        self.apply_jurisdiction_rules(has_wc)?;
        Ok(())
    }

    fn check_fields(&mut self, today: NaiveDate) -> Result<(), DomainError> {
        if self.name.is_empty() {
            return Err(DomainError::validation("business name is required"));
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(DomainError::validation("business name exceeds 100 characters"));
        }

        let Some(entity) = self.entity() else {
            let allowed: Vec<&str> = EntityType::ALL.iter().map(EntityType::as_str).collect();
            return Err(DomainError::validation(format!(
                "entity_type '{}' is not one of: {}",
                self.entity_type,
                allowed.join(", ")
            )));
        };
        self.entity_type = entity.as_str().to_owned();

        self.tax_id = normalize_tax_id(&self.tax_id).ok_or_else(|| {
            DomainError::validation("tax_id must be a 9 digit EIN or SSN")
        })?;
        if self.tax_id_type == TaxIdType::Ssn && entity != EntityType::SoleProprietorship {
            return Err(DomainError::validation(
                "an SSN may only be used to identify a Sole Proprietorship",
            ));
        }

        let earliest = NaiveDate::from_ymd_opt(1776, 7, 4).unwrap_or(NaiveDate::MIN);
        if self.founded <= earliest {
            return Err(DomainError::validation("founded must be after July 4, 1776"));
        }
        if self.founded > today {
            return Err(DomainError::validation("founded cannot be in the future"));
        }

        if self.industry_code == 0 {
            return Err(DomainError::validation("industry_code must be a positive integer"));
        }

        self.phone = normalize_phone(&self.phone)
            .ok_or_else(|| DomainError::validation("phone must be a 10 digit phone number"))?;

        if let Some(website) = &self.website {
            if !is_valid_website(website) {
                return Err(DomainError::validation(format!(
                    "website '{website}' is not a valid URL"
                )));
            }
        }

        if self.mailing_address.is_empty() {
            return Err(DomainError::validation("mailing_address is required"));
        }
        if !is_valid_zip(&self.mailing_zip) {
            return Err(DomainError::validation("mailing_zip must be 5 digits"));
        }

        self.check_owners()
    }

    fn check_owners(&self) -> Result<(), DomainError> {
        if self.owners.is_empty() {
            return Ok(());
        }
        if self.num_owners.unwrap_or(0) < 1 {
            return Err(DomainError::validation(
                "num_owners must be at least 1 when owners are listed",
            ));
        }

        let hundred = Decimal::ONE_HUNDRED;
        let mut total = Decimal::ZERO;
        for owner in &self.owners {
            if owner.first_name.is_empty() || owner.last_name.is_empty() {
                return Err(DomainError::validation("owner first_name and last_name are required"));
            }
            if owner.ownership <= Decimal::ZERO || owner.ownership > hundred {
                return Err(DomainError::validation(format!(
                    "ownership for {} {} must be between 0 and 100 percent",
                    owner.first_name, owner.last_name
                )));
            }
            total += owner.ownership;
        }
        if total > hundred {
            return Err(DomainError::validation("total ownership cannot exceed 100 percent"));
        }
        Ok(())
    }

    /// Fields that only exist for particular entity/territory/WC combinations
    /// are required there and cleared everywhere else.
    fn apply_jurisdiction_rules(&mut self, has_wc: bool) -> Result<(), DomainError> {
        let entity = self.entity();
        let territory = self.primary_territory.as_deref().unwrap_or_default();

        if has_wc && territory == "MT" && entity == Some(EntityType::LimitedLiabilityCompany) {
            match self.management_structure.as_deref() {
                Some("manager" | "member") => {}
                Some(other) => {
                    return Err(DomainError::validation(format!(
                        "management_structure '{other}' must be 'manager' or 'member'"
                    )));
                }
                None => {
                    return Err(DomainError::validation(
                        "management_structure is required for Limited Liability Companies in Montana",
                    ));
                }
            }
        } else {
            self.management_structure = None;
        }

        if has_wc
            && territory == "PA"
            && entity == Some(EntityType::Corporation)
            && !self.owners_included
        {
            match self.corporation_type.as_deref() {
                Some("c" | "n" | "s") => {}
                Some(other) => {
                    return Err(DomainError::validation(format!(
                        "corporation_type '{other}' must be one of c, n, s"
                    )));
                }
                None => {
                    return Err(DomainError::validation(
                        "corporation_type is required for Pennsylvania corporations that exclude owners",
                    ));
                }
            }
        } else {
            self.corporation_type = None;
        }

        if has_wc
            && territory == "NH"
            && matches!(
                entity,
                Some(EntityType::LimitedLiabilityCompany | EntityType::Corporation)
            )
        {
            if self.unincorporated_association.is_none() {
                return Err(DomainError::validation(
                    "unincorporated_association is required for New Hampshire corporations and LLCs",
                ));
            }
        } else {
            self.unincorporated_association = None;
        }

        Ok(())
    }
}
