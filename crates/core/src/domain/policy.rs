use std::collections::BTreeSet;

use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::claim::Claim;
use crate::domain::ids::InsurerId;
use crate::domain::payload::PolicyPayload;
use crate::domain::policy_type::PolicyType;
use crate::domain::rules::parse_limits;
use crate::errors::DomainError;

const MAX_DAYS_UNTIL_EFFECTIVE: u64 = 90;
const DEDUCTIBLE_TERRITORIES: [&str; 12] =
    ["AR", "AZ", "CA", "CO", "ID", "NM", "NV", "OK", "OR", "TX", "UT", "WA"];
const DEDUCTIBLES: [u32; 3] = [500, 1000, 1500];

const WC_LIMITS_500K: &str = "500000/500000/500000";
const WC_LIMITS_1M: &str = "1000000/1000000/1000000";
const WC_LIMITS_2M: &str = "2000000/2000000/2000000";

/// Facts from the rest of the application a policy needs to validate itself.
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext<'a> {
    pub today: NaiveDate,
    pub founded: NaiveDate,
    pub primary_territory: &'a str,
    pub territories: &'a BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_type: PolicyType,
    pub effective_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub limits: String,
    pub insurers: BTreeSet<InsurerId>,
    pub claims: Vec<Claim>,
    pub gross_sales: Option<Decimal>,
    pub coverage_lapse_non_payment: Option<bool>,
    pub deductible: Option<u32>,
    pub coverage_lapse: Option<bool>,
}

impl Policy {
    pub fn from_payload(payload: PolicyPayload) -> Self {
        Self {
            policy_type: payload.policy_type,
            effective_date: payload.effective_date,
            expiration_date: None,
            limits: payload.limits.split_whitespace().collect(),
            insurers: payload.insurers.into_iter().map(InsurerId).collect(),
            claims: payload.claims.into_iter().map(Claim::from_payload).collect(),
            gross_sales: payload.gross_sales,
            coverage_lapse_non_payment: payload.coverage_lapse_non_payment,
            deductible: payload.deductible,
            coverage_lapse: payload.coverage_lapse,
        }
    }

    pub fn validate(&mut self, ctx: PolicyContext<'_>) -> Result<(), DomainError> {
        let name = self.policy_type.as_str();

        let latest = ctx
            .today
            .checked_add_days(Days::new(MAX_DAYS_UNTIL_EFFECTIVE))
            .unwrap_or(ctx.today);
        if self.effective_date < ctx.today || self.effective_date > latest {
            return Err(DomainError::validation(format!(
                "{name} effective_date must be between today and {MAX_DAYS_UNTIL_EFFECTIVE} days from now"
            )));
        }
        self.expiration_date = self.effective_date.checked_add_months(Months::new(12));

        if parse_limits(&self.limits).is_none() {
            return Err(DomainError::validation(format!(
                "{name} limits '{}' must be three slash-separated amounts",
                self.limits
            )));
        }

        match self.policy_type {
            PolicyType::Bop => {
                self.require_gross_sales()?;
                if self.coverage_lapse_non_payment.is_none() {
                    return Err(DomainError::validation(
                        "BOP coverage_lapse_non_payment is required",
                    ));
                }
                self.deductible = None;
                self.coverage_lapse = None;
            }
            PolicyType::Gl => {
                self.require_gross_sales()?;
                self.coverage_lapse_non_payment = None;
                self.coverage_lapse = None;
                if DEDUCTIBLE_TERRITORIES.contains(&ctx.primary_territory) {
                    match self.deductible {
                        Some(amount) if DEDUCTIBLES.contains(&amount) => {}
                        Some(amount) => {
                            return Err(DomainError::validation(format!(
                                "GL deductible {amount} must be one of 500, 1000, 1500"
                            )));
                        }
                        None => {
                            return Err(DomainError::validation(format!(
                                "GL deductible is required in {}",
                                ctx.primary_territory
                            )));
                        }
                    }
                } else {
                    self.deductible = None;
                }
            }
            PolicyType::Wc => {
                if self.coverage_lapse.is_none() {
                    return Err(DomainError::validation("WC coverage_lapse is required"));
                }
                self.gross_sales = None;
                self.coverage_lapse_non_payment = None;
                self.deductible = None;
                self.apply_wc_limit_floor(ctx.territories);
            }
        }

        for claim in &mut self.claims {
            claim.validate(self.policy_type, ctx.founded, ctx.today)?;
        }

        Ok(())
    }

    fn require_gross_sales(&self) -> Result<(), DomainError> {
        match self.gross_sales {
            Some(sales) if sales > Decimal::ZERO => Ok(()),
            _ => Err(DomainError::validation(format!(
                "{} gross_sales is required and must be greater than zero",
                self.policy_type.as_str()
            ))),
        }
    }

    /// CA and OR carry statutory employer's liability minimums.
    fn apply_wc_limit_floor(&mut self, territories: &BTreeSet<String>) {
        if territories.contains("CA") {
            if self.limits != WC_LIMITS_2M {
                self.limits = WC_LIMITS_1M.to_owned();
            }
        } else if territories.contains("OR") && self.limits != WC_LIMITS_1M && self.limits != WC_LIMITS_2M {
            self.limits = WC_LIMITS_500K.to_owned();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{Policy, PolicyContext};
    use crate::domain::payload::{ClaimPayload, PolicyPayload};
    use crate::domain::policy_type::PolicyType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn policy(policy_type: PolicyType, limits: &str) -> Policy {
        Policy::from_payload(PolicyPayload {
            policy_type,
            effective_date: date(2026, 11, 1),
            limits: limits.to_owned(),
            insurers: Vec::new(),
            claims: Vec::new(),
            gross_sales: Some(Decimal::new(750_000, 0)),
            coverage_lapse_non_payment: Some(false),
            deductible: Some(1000),
            coverage_lapse: Some(false),
        })
    }

    fn validate(policy: &mut Policy, territory: &str) -> Result<(), crate::errors::DomainError> {
        let territories = BTreeSet::from([territory.to_owned()]);
        policy.validate(PolicyContext {
            today: date(2026, 10, 16),
            founded: date(2001, 1, 1),
            primary_territory: territory,
            territories: &territories,
        })
    }

    #[test]
    fn expiration_is_one_year_after_effective() {
        let mut gl = policy(PolicyType::Gl, "1000000/2000000/1000000");
        validate(&mut gl, "NY").expect("valid");
        assert_eq!(gl.expiration_date, Some(date(2027, 11, 1)));
        assert_eq!(gl.deductible, None);
        assert_eq!(gl.coverage_lapse, None);
    }

    #[test]
    fn effective_date_window_is_today_through_ninety_days() {
        let mut past = policy(PolicyType::Gl, "1000000/2000000/1000000");
        past.effective_date = date(2026, 10, 15);
        assert!(validate(&mut past, "NY").is_err());

        let mut edge = policy(PolicyType::Gl, "1000000/2000000/1000000");
        edge.effective_date = date(2027, 1, 14);
        validate(&mut edge, "NY").expect("day 90");

        let mut late = policy(PolicyType::Gl, "1000000/2000000/1000000");
        late.effective_date = date(2027, 1, 15);
        assert!(validate(&mut late, "NY").is_err());
    }

    #[test]
    fn california_workers_comp_limits_are_raised() {
        let mut wc = policy(PolicyType::Wc, "100000/500000/100000");
        validate(&mut wc, "CA").expect("valid");
        assert_eq!(wc.limits, "1000000/1000000/1000000");

        let mut high = policy(PolicyType::Wc, "2000000/2000000/2000000");
        validate(&mut high, "CA").expect("valid");
        assert_eq!(high.limits, "2000000/2000000/2000000");
    }

    #[test]
    fn oregon_workers_comp_limits_have_a_lower_floor() {
        let mut wc = policy(PolicyType::Wc, "100000/500000/100000");
        validate(&mut wc, "OR").expect("valid");
        assert_eq!(wc.limits, "500000/500000/500000");

        let mut one_million = policy(PolicyType::Wc, "1000000/1000000/1000000");
        validate(&mut one_million, "OR").expect("valid");
        assert_eq!(one_million.limits, "1000000/1000000/1000000");
    }

    #[test]
    fn gl_deductible_is_checked_only_in_deductible_states() {
        let mut invalid = policy(PolicyType::Gl, "1000000/2000000/1000000");
        invalid.deductible = Some(750);
        assert!(validate(&mut invalid, "TX").is_err());

        let mut missing = policy(PolicyType::Gl, "1000000/2000000/1000000");
        missing.deductible = None;
        assert!(validate(&mut missing, "AZ").is_err());

        let mut kept = policy(PolicyType::Gl, "1000000/2000000/1000000");
        validate(&mut kept, "WA").expect("valid");
        assert_eq!(kept.deductible, Some(1000));
    }

    #[test]
    fn type_specific_booleans_are_required() {
        let mut bop = policy(PolicyType::Bop, "1000000/2000000/1000000");
        bop.coverage_lapse_non_payment = None;
        assert!(validate(&mut bop, "NY").is_err());

        let mut wc = policy(PolicyType::Wc, "1000000/1000000/1000000");
        wc.coverage_lapse = None;
        assert!(validate(&mut wc, "NY").is_err());
    }

    #[test]
    fn claims_are_validated_against_the_policy() {
        let mut gl = policy(PolicyType::Gl, "1000000/2000000/1000000");
        gl.claims.push(crate::domain::claim::Claim::from_payload(ClaimPayload {
            date: date(1999, 5, 1),
            amount_paid: Decimal::new(1000, 0),
            amount_reserved: Decimal::ZERO,
            missed_work: false,
            open: false,
        }));
        let error = validate(&mut gl, "NY").expect_err("claim before founding");
        assert!(error.to_string().contains("founded"));
    }

    #[test]
    fn malformed_limits_are_rejected() {
        let mut gl = policy(PolicyType::Gl, "1000000/2000000");
        assert!(validate(&mut gl, "NY").is_err());
    }
}
