//! Inbound request shapes.
//!
//! These mirror the JSON an agency portal submits. Nothing here is
//! validated; each domain entity has an explicit `from_payload` mapping and
//! its own `validate`.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ids::{ActivityCodeId, QuestionId};
use crate::domain::policy_type::PolicyType;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApplicationPayload {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub agency_location_id: Option<u64>,
    pub business: BusinessPayload,
    #[serde(default)]
    pub policies: Vec<PolicyPayload>,
    #[serde(default)]
    pub questions: HashMap<QuestionId, Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxIdType {
    #[default]
    Ein,
    Ssn,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusinessPayload {
    pub name: String,
    #[serde(default)]
    pub dba: Option<String>,
    pub entity_type: String,
    pub tax_id: String,
    #[serde(default)]
    pub tax_id_type: TaxIdType,
    pub founded: NaiveDate,
    pub industry_code: u64,
    #[serde(default)]
    pub website: Option<String>,
    pub phone: String,
    pub mailing_address: String,
    pub mailing_zip: String,
    #[serde(default)]
    pub owners: Vec<OwnerPayload>,
    #[serde(default)]
    pub num_owners: Option<u32>,
    #[serde(default = "default_owners_included")]
    pub owners_included: bool,
    #[serde(default)]
    pub management_structure: Option<String>,
    #[serde(default)]
    pub corporation_type: Option<String>,
    #[serde(default)]
    pub unincorporated_association: Option<bool>,
    #[serde(default)]
    pub contacts: Vec<ContactPayload>,
    #[serde(default)]
    pub locations: Vec<LocationPayload>,
}

fn default_owners_included() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerPayload {
    pub first_name: String,
    pub last_name: String,
    pub ownership: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    pub address: String,
    #[serde(default)]
    pub address2: Option<String>,
    pub zip: String,
    #[serde(default)]
    pub full_time_employees: u32,
    #[serde(default)]
    pub part_time_employees: u32,
    #[serde(default)]
    pub square_footage: Option<u32>,
    #[serde(default)]
    pub unemployment_number: Option<String>,
    #[serde(default)]
    pub activity_codes: Vec<ActivityCodePayload>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityCodePayload {
    pub id: ActivityCodeId,
    pub payroll: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyPayload {
    pub policy_type: PolicyType,
    pub effective_date: NaiveDate,
    pub limits: String,
    #[serde(default)]
    pub insurers: Vec<u64>,
    #[serde(default)]
    pub claims: Vec<ClaimPayload>,
    #[serde(default)]
    pub gross_sales: Option<Decimal>,
    #[serde(default)]
    pub coverage_lapse_non_payment: Option<bool>,
    #[serde(default)]
    pub deductible: Option<u32>,
    #[serde(default)]
    pub coverage_lapse: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimPayload {
    pub date: NaiveDate,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub amount_reserved: Decimal,
    #[serde(default)]
    pub missed_work: bool,
    #[serde(default)]
    pub open: bool,
}
