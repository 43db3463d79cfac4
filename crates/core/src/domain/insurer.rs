use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Environment;
use crate::domain::ids::{InsurerId, PaymentPlanId};
use crate::domain::policy_type::PolicyType;
use crate::errors::{DomainError, EngineError};
use crate::ports::{EncryptionService, InsurerStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    pub id: PaymentPlanId,
    pub name: String,
    /// Minimum premium at which this plan may be offered.
    pub premium_threshold: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageType {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OutageWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// A carrier as seen by one application: capabilities plus decrypted credentials.
#[derive(Clone, Debug)]
pub struct Insurer {
    pub id: InsurerId,
    pub name: String,
    pub slug: String,
    pub policy_types: BTreeSet<PolicyType>,
    pub payment_plans: Vec<PaymentPlan>,
    pub package_types: Vec<PackageType>,
    pub outages: Vec<OutageWindow>,
    live_credentials: Option<Credentials>,
    test_credentials: Option<Credentials>,
}

impl Insurer {
    /// Loads the carrier row, its payment plans, packages and outages concurrently.
    /// Any lookup failure fails the whole init.
    pub async fn init(
        id: InsurerId,
        store: &dyn InsurerStore,
        encryption: &dyn EncryptionService,
    ) -> Result<Self, EngineError> {
        let (record, payment_plans, package_types, outages) = tokio::try_join!(
            store.load_insurer(id),
            store.load_payment_plans(id),
            store.load_package_types(id),
            store.load_outages(id),
        )?;

        let record = record.ok_or_else(|| {
            DomainError::MisconfiguredAgent(format!("insurer {id} is enabled but does not exist"))
        })?;

        let live_credentials =
            decrypt_pair(encryption, record.live_username, record.live_password).await?;
        let test_credentials =
            decrypt_pair(encryption, record.test_username, record.test_password).await?;

        debug!(
            event_name = "insurer.init.loaded",
            insurer_id = %id,
            slug = %record.slug,
            payment_plans = payment_plans.len(),
            outages = outages.len(),
            "insurer initialized"
        );

        Ok(Self {
            id,
            name: record.name,
            slug: record.slug,
            policy_types: record.policy_types.into_iter().collect(),
            payment_plans,
            package_types,
            outages,
            live_credentials,
            test_credentials,
        })
    }

    pub fn supports(&self, policy_type: PolicyType) -> bool {
        self.policy_types.contains(&policy_type)
    }

    pub fn in_outage(&self, at: DateTime<Utc>) -> bool {
        self.outages.iter().any(|window| window.contains(at))
    }

    /// Live credentials only in production-like environments.
    pub fn credentials(&self, environment: Environment) -> Option<&Credentials> {
        if environment.is_production_like() {
            self.live_credentials.as_ref()
        } else {
            self.test_credentials.as_ref()
        }
    }

    pub fn payment_plan(&self, id: PaymentPlanId) -> Option<&PaymentPlan> {
        self.payment_plans.iter().find(|plan| plan.id == id)
    }
}

async fn decrypt_pair(
    encryption: &dyn EncryptionService,
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<Credentials>, EngineError> {
    let (Some(username), Some(password)) = (username, password) else {
        return Ok(None);
    };
    let (username, password) =
        tokio::try_join!(encryption.decrypt(&username), encryption.decrypt(&password))?;
    Ok(Some(Credentials { username, password: SecretString::from(password) }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;

    use super::{Insurer, OutageWindow, PackageType, PaymentPlan};
    use crate::config::Environment;
    use crate::domain::ids::{InsurerId, PaymentPlanId};
    use crate::domain::policy_type::PolicyType;
    use crate::errors::{DomainError, EngineError};
    use crate::ports::{
        EncryptionService, InsurerRecord, InsurerStore, RepositoryError, ServiceError,
    };

    struct Reverse;

    #[async_trait]
    impl EncryptionService for Reverse {
        async fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError> {
            Ok(plaintext.chars().rev().collect())
        }

        async fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError> {
            Ok(ciphertext.chars().rev().collect())
        }
    }

    #[derive(Default)]
    struct Store {
        insurers: HashMap<InsurerId, InsurerRecord>,
        outage: Option<OutageWindow>,
        fail_plans: bool,
    }

    #[async_trait]
    impl InsurerStore for Store {
        async fn load_insurer(
            &self,
            id: InsurerId,
        ) -> Result<Option<InsurerRecord>, RepositoryError> {
            Ok(self.insurers.get(&id).cloned())
        }

        async fn load_payment_plans(
            &self,
            _id: InsurerId,
        ) -> Result<Vec<PaymentPlan>, RepositoryError> {
            if self.fail_plans {
                return Err(RepositoryError::Database("connection reset".to_owned()));
            }
            Ok(vec![PaymentPlan {
                id: PaymentPlanId(1),
                name: "Annual".to_owned(),
                premium_threshold: Decimal::ZERO,
            }])
        }

        async fn load_package_types(
            &self,
            _id: InsurerId,
        ) -> Result<Vec<PackageType>, RepositoryError> {
            Ok(vec![PackageType { id: 1, name: "Standard".to_owned() }])
        }

        async fn load_outages(&self, _id: InsurerId) -> Result<Vec<OutageWindow>, RepositoryError> {
            Ok(self.outage.into_iter().collect())
        }
    }

    fn store() -> Store {
        let record = InsurerRecord {
            id: InsurerId(5),
            name: "Granite Mutual".to_owned(),
            slug: "granite".to_owned(),
            policy_types: vec![PolicyType::Gl, PolicyType::Wc],
            live_username: Some("evil".to_owned()),
            live_password: Some("terces".to_owned()),
            test_username: Some("tset".to_owned()),
            test_password: None,
        };
        Store { insurers: HashMap::from([(InsurerId(5), record)]), ..Store::default() }
    }

    #[tokio::test]
    async fn init_decrypts_live_credentials_and_loads_capabilities() {
        let insurer = Insurer::init(InsurerId(5), &store(), &Reverse).await.expect("init");

        assert!(insurer.supports(PolicyType::Gl));
        assert!(!insurer.supports(PolicyType::Bop));
        assert!(insurer.payment_plan(PaymentPlanId(1)).is_some());

        let live = insurer.credentials(Environment::Production).expect("live credentials");
        assert_eq!(live.username, "live");
        assert_eq!(live.password.expose_secret(), "secret");
        assert!(insurer.credentials(Environment::Development).is_none());
    }

    #[tokio::test]
    async fn missing_insurer_row_is_misconfiguration() {
        let error = Insurer::init(InsurerId(9), &store(), &Reverse).await.expect_err("missing");
        assert!(matches!(error, EngineError::Domain(DomainError::MisconfiguredAgent(_))));
    }

    #[tokio::test]
    async fn any_lookup_failure_fails_init() {
        let mut failing = store();
        failing.fail_plans = true;
        let error = Insurer::init(InsurerId(5), &failing, &Reverse).await.expect_err("plans");
        assert!(matches!(error, EngineError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn outage_window_is_half_open() {
        let now = Utc::now();
        let mut outage_store = store();
        outage_store.outage =
            Some(OutageWindow { start: now - Duration::hours(1), end: now + Duration::hours(1) });
        let insurer = Insurer::init(InsurerId(5), &outage_store, &Reverse).await.expect("init");

        assert!(insurer.in_outage(now));
        assert!(!insurer.in_outage(now + Duration::hours(1)));
    }
}
