use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::agency_location::AgencyLocation;
use crate::domain::business::Business;
use crate::domain::ids::{AgencyLocationId, ApplicationId, InsurerId, QuestionId};
use crate::domain::insurer::Insurer;
use crate::domain::payload::ApplicationPayload;
use crate::domain::policy::Policy;
use crate::domain::policy_type::PolicyType;
use crate::domain::question::QuestionSet;
use crate::domain::quote::{OutcomeClass, QuoteOutcome};
use crate::errors::DomainError;

/// Persisted as an integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    New,
    Referred,
    Quoted,
}

impl ApplicationState {
    pub fn code(&self) -> i64 {
        match self {
            Self::New => 1,
            Self::Referred => 2,
            Self::Quoted => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::New),
            2 => Some(Self::Referred),
            3 => Some(Self::Quoted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Referred => "referred",
            Self::Quoted => "quoted",
        }
    }

    pub fn can_transition_to(&self, next: ApplicationState) -> bool {
        matches!(
            (self, next),
            (ApplicationState::New, ApplicationState::Quoted)
                | (ApplicationState::New, ApplicationState::Referred)
        )
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which insurers quoted or referred, per requested policy type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    requested: BTreeSet<PolicyType>,
    quoted: BTreeMap<PolicyType, BTreeSet<InsurerId>>,
    referred: BTreeMap<PolicyType, BTreeSet<InsurerId>>,
    outcomes: usize,
}

impl OutcomeTally {
    pub fn new(requested: impl IntoIterator<Item = PolicyType>) -> Self {
        Self { requested: requested.into_iter().collect(), ..Self::default() }
    }

    pub fn record(&mut self, outcome: &QuoteOutcome) {
        self.outcomes += 1;
        let bucket = match outcome.classify() {
            OutcomeClass::Quoted => &mut self.quoted,
            OutcomeClass::Referred => &mut self.referred,
            OutcomeClass::Neither => return,
        };
        bucket.entry(outcome.policy_type).or_default().insert(outcome.insurer_id);
    }

    pub fn outcome_count(&self) -> usize {
        self.outcomes
    }

    pub fn quoted_types(&self) -> BTreeSet<PolicyType> {
        self.requested.iter().copied().filter(|policy_type| self.has_quote(*policy_type)).collect()
    }

    fn has_quote(&self, policy_type: PolicyType) -> bool {
        self.quoted.get(&policy_type).is_some_and(|insurers| !insurers.is_empty())
    }

    fn has_referral(&self, policy_type: PolicyType) -> bool {
        self.referred.get(&policy_type).is_some_and(|insurers| !insurers.is_empty())
    }

    pub fn all_quoted(&self) -> bool {
        !self.requested.is_empty() && self.requested.iter().all(|pt| self.has_quote(*pt))
    }

    pub fn any_quoted(&self) -> bool {
        self.requested.iter().any(|pt| self.has_quote(*pt))
    }

    /// All-or-nothing per policy type: mixed results leave the application `New`.
    pub fn resulting_state(&self) -> ApplicationState {
        if self.all_quoted() {
            ApplicationState::Quoted
        } else if !self.requested.is_empty()
            && !self.any_quoted()
            && self.requested.iter().all(|pt| self.has_referral(*pt))
        {
            ApplicationState::Referred
        } else {
            ApplicationState::New
        }
    }
}

/// The aggregate root: one business applying for one or more policies through one agency location.
#[derive(Clone, Debug)]
pub struct Application {
    pub id: ApplicationId,
    pub test: bool,
    pub correlation_id: String,
    pub agency_location_id: AgencyLocationId,
    pub agency_location: Option<AgencyLocation>,
    pub business: Business,
    pub policies: Vec<Policy>,
    pub answers: HashMap<QuestionId, Value>,
    pub questions: QuestionSet,
    pub insurers: Vec<Insurer>,
    pub state: ApplicationState,
}

impl Application {
    /// Maps the payload without validating anything.
    pub fn load(payload: ApplicationPayload, house_agency_id: AgencyLocationId) -> Self {
        Self {
            id: ApplicationId(payload.id),
            test: payload.test,
            correlation_id: Uuid::new_v4().to_string(),
            agency_location_id: payload
                .agency_location_id
                .map(AgencyLocationId)
                .unwrap_or(house_agency_id),
            agency_location: None,
            business: Business::from_payload(payload.business),
            policies: payload.policies.into_iter().map(Policy::from_payload).collect(),
            answers: payload.questions,
            questions: QuestionSet::default(),
            insurers: Vec::new(),
            state: ApplicationState::New,
        }
    }

    pub fn policy_types(&self) -> Vec<PolicyType> {
        let mut types: Vec<PolicyType> = self.policies.iter().map(|policy| policy.policy_type).collect();
        types.sort();
        types.dedup();
        types
    }

    pub fn agency(&self) -> Result<&AgencyLocation, DomainError> {
        self.agency_location.as_ref().ok_or_else(|| {
            DomainError::MisconfiguredAgent(format!(
                "agency location {} has not been initialized",
                self.agency_location_id
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ApplicationState, OutcomeTally};
    use crate::domain::ids::InsurerId;
    use crate::domain::policy_type::PolicyType;
    use crate::domain::quote::{AggregatedStatus, QuoteOutcome};

    fn outcome(insurer: u64, policy_type: PolicyType, amount: i64, referred: bool) -> QuoteOutcome {
        QuoteOutcome {
            insurer_id: InsurerId(insurer),
            insurer_name: format!("Insurer {insurer}"),
            policy_type,
            amount: (amount > 0).then(|| Decimal::new(amount, 0)),
            status: referred.then_some(AggregatedStatus::Referred),
            letter: None,
            quote_id: None,
        }
    }

    #[test]
    fn every_type_quoted_means_quoted() {
        let mut tally = OutcomeTally::new([PolicyType::Gl, PolicyType::Wc]);
        tally.record(&outcome(5, PolicyType::Gl, 1200, false));
        tally.record(&outcome(7, PolicyType::Wc, 3400, false));
        tally.record(&outcome(7, PolicyType::Gl, 0, true));

        assert_eq!(tally.resulting_state(), ApplicationState::Quoted);
        assert_eq!(tally.outcome_count(), 3);
    }

    #[test]
    fn mixed_results_stay_new() {
        let mut tally = OutcomeTally::new([PolicyType::Gl, PolicyType::Wc]);
        tally.record(&outcome(5, PolicyType::Gl, 1200, false));
        tally.record(&outcome(7, PolicyType::Wc, 0, true));

        assert_eq!(tally.resulting_state(), ApplicationState::New);
        assert!(tally.any_quoted());
        assert!(!tally.all_quoted());
    }

    #[test]
    fn every_type_referred_and_none_quoted_means_referred() {
        let mut tally = OutcomeTally::new([PolicyType::Bop]);
        tally.record(&outcome(5, PolicyType::Bop, 0, true));
        assert_eq!(tally.resulting_state(), ApplicationState::Referred);
    }

    #[test]
    fn no_outcomes_stay_new() {
        let tally = OutcomeTally::new([PolicyType::Gl]);
        assert_eq!(tally.resulting_state(), ApplicationState::New);
    }

    #[test]
    fn state_only_moves_forward_from_new() {
        assert!(ApplicationState::New.can_transition_to(ApplicationState::Quoted));
        assert!(ApplicationState::New.can_transition_to(ApplicationState::Referred));
        assert!(!ApplicationState::Quoted.can_transition_to(ApplicationState::New));
        assert!(!ApplicationState::Referred.can_transition_to(ApplicationState::Quoted));
        assert_eq!(ApplicationState::from_code(ApplicationState::Referred.code()), Some(ApplicationState::Referred));
    }
}
