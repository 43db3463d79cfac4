use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AgencyLocationId, ApplicationId, InsurerId, QuoteId};
use crate::domain::insurer::PaymentPlan;
use crate::domain::policy_type::PolicyType;
use crate::errors::DomainError;

/// Insurer-agnostic summary of an integration's API result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatedStatus {
    Quoted,
    QuotedManual,
    ReferredWithPrice,
    Referred,
    AcordEmailed,
    BindRequested,
    Bound,
    PriceIndication,
    Declined,
    Autodeclined,
    Error,
}

impl AggregatedStatus {
    pub const ALL: [AggregatedStatus; 11] = [
        AggregatedStatus::Quoted,
        AggregatedStatus::QuotedManual,
        AggregatedStatus::ReferredWithPrice,
        AggregatedStatus::Referred,
        AggregatedStatus::AcordEmailed,
        AggregatedStatus::BindRequested,
        AggregatedStatus::Bound,
        AggregatedStatus::PriceIndication,
        AggregatedStatus::Declined,
        AggregatedStatus::Autodeclined,
        AggregatedStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quoted => "quoted",
            Self::QuotedManual => "quoted_manual",
            Self::ReferredWithPrice => "referred_with_price",
            Self::Referred => "referred",
            Self::AcordEmailed => "acord_emailed",
            Self::BindRequested => "bind_requested",
            Self::Bound => "bound",
            Self::PriceIndication => "price_indication",
            Self::Declined => "declined",
            Self::Autodeclined => "autodeclined",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|status| status.as_str().eq_ignore_ascii_case(value))
    }

    pub fn bind_eligible(&self) -> bool {
        matches!(
            self,
            Self::Quoted
                | Self::QuotedManual
                | Self::ReferredWithPrice
                | Self::Referred
                | Self::AcordEmailed
                | Self::BindRequested
        )
    }
}

impl fmt::Display for AggregatedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one quote contributes to its policy type's outcome sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeClass {
    Quoted,
    Referred,
    Neither,
}

/// Result of one integration `quote()` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOutcome {
    pub insurer_id: InsurerId,
    pub insurer_name: String,
    pub policy_type: PolicyType,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub status: Option<AggregatedStatus>,
    #[serde(default)]
    pub letter: Option<String>,
    /// Assigned once the outcome has been recorded.
    #[serde(default)]
    pub quote_id: Option<QuoteId>,
}

impl QuoteOutcome {
    /// A non-zero amount counts as quoted; otherwise only an explicit `referred` counts.
    pub fn classify(&self) -> OutcomeClass {
        if self.amount.is_some_and(|amount| !amount.is_zero()) {
            OutcomeClass::Quoted
        } else if self.status == Some(AggregatedStatus::Referred) {
            OutcomeClass::Referred
        } else {
            OutcomeClass::Neither
        }
    }

    pub fn aggregated_status(&self) -> AggregatedStatus {
        match (self.status, self.classify()) {
            (Some(status), _) => status,
            (None, OutcomeClass::Quoted) => AggregatedStatus::Quoted,
            (None, _) => AggregatedStatus::Error,
        }
    }
}

/// A persisted quote as loaded for the bind workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: QuoteId,
    pub application_id: ApplicationId,
    pub agency_location_id: AgencyLocationId,
    pub insurer_id: InsurerId,
    pub policy_type: PolicyType,
    pub amount: Option<Decimal>,
    pub status: AggregatedStatus,
    pub bound: bool,
}

impl QuoteRecord {
    pub fn ensure_bindable(&self) -> Result<(), DomainError> {
        if self.bound {
            return Err(DomainError::AlreadyBound(self.id));
        }
        if !self.status.bind_eligible() {
            return Err(DomainError::NotEligibleForBind { quote_id: self.id, status: self.status });
        }
        Ok(())
    }
}

/// A quote plus the payment plan chosen for binding it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteBind {
    pub quote: QuoteRecord,
    pub insurer_name: String,
    pub insurer_slug: String,
    pub payment_plan: PaymentPlan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindDecision {
    Bound,
    Referred,
}

impl BindDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bound => "Bound",
            Self::Referred => "Referred",
        }
    }
}

impl fmt::Display for BindDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{AggregatedStatus, OutcomeClass, QuoteOutcome, QuoteRecord};
    use crate::domain::ids::{AgencyLocationId, ApplicationId, InsurerId, QuoteId};
    use crate::domain::policy_type::PolicyType;
    use crate::errors::DomainError;

    fn outcome(amount: Option<i64>, status: Option<AggregatedStatus>) -> QuoteOutcome {
        QuoteOutcome {
            insurer_id: InsurerId(5),
            insurer_name: "Granite Mutual".to_owned(),
            policy_type: PolicyType::Gl,
            amount: amount.map(|value| Decimal::new(value, 0)),
            status,
            letter: None,
            quote_id: None,
        }
    }

    fn record(status: AggregatedStatus, bound: bool) -> QuoteRecord {
        QuoteRecord {
            id: QuoteId(77),
            application_id: ApplicationId(42),
            agency_location_id: AgencyLocationId(1),
            insurer_id: InsurerId(5),
            policy_type: PolicyType::Gl,
            amount: Some(Decimal::new(1_200, 0)),
            status,
            bound,
        }
    }

    #[test]
    fn classification_prefers_amount_over_status() {
        assert_eq!(outcome(Some(900), Some(AggregatedStatus::Referred)).classify(), OutcomeClass::Quoted);
        assert_eq!(outcome(Some(0), Some(AggregatedStatus::Referred)).classify(), OutcomeClass::Referred);
        assert_eq!(outcome(None, Some(AggregatedStatus::Declined)).classify(), OutcomeClass::Neither);
        assert_eq!(outcome(None, None).aggregated_status(), AggregatedStatus::Error);
        assert_eq!(outcome(Some(10), None).aggregated_status(), AggregatedStatus::Quoted);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in AggregatedStatus::ALL {
            assert_eq!(AggregatedStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AggregatedStatus::parse("nope"), None);
    }

    #[test]
    fn bind_guard_checks_bound_flag_before_status() {
        assert_eq!(
            record(AggregatedStatus::Autodeclined, true).ensure_bindable(),
            Err(DomainError::AlreadyBound(QuoteId(77)))
        );
        assert!(matches!(
            record(AggregatedStatus::Autodeclined, false).ensure_bindable(),
            Err(DomainError::NotEligibleForBind { status: AggregatedStatus::Autodeclined, .. })
        ));
        record(AggregatedStatus::AcordEmailed, false).ensure_bindable().expect("eligible");
    }
}
