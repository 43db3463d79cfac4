//! The distributing agent's capability set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::domain::ids::{AgencyLocationId, InsurerId};
use crate::domain::policy_type::PolicyType;
use crate::errors::{DomainError, EngineError};
use crate::ports::{AgencyLocationStore, EncryptionService};

/// Per-insurer appointment of an agency location. Both codes are present by construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InsurerAppointment {
    pub agency_code: String,
    pub agent_code: String,
    pub policy_types: BTreeSet<PolicyType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgencyLocation {
    pub id: AgencyLocationId,
    pub agency_id: u64,
    pub agency_name: String,
    pub email: String,
    pub phone: String,
    pub website: Option<String>,
    pub wholesale: bool,
    pub insurers: BTreeMap<InsurerId, InsurerAppointment>,
    pub territories: BTreeSet<String>,
    house_agency_id: AgencyLocationId,
}

impl AgencyLocation {
    pub async fn init(
        id: AgencyLocationId,
        house_agency_id: AgencyLocationId,
        store: &dyn AgencyLocationStore,
        encryption: &dyn EncryptionService,
    ) -> Result<Self, EngineError> {
        if id.0 == 0 {
            return Err(DomainError::validation("agency location id must be a positive integer").into());
        }

        let (core, settings, territories) = tokio::try_join!(
            store.load_core(id),
            store.load_insurer_settings(id),
            store.load_territories(id),
        )?;

        let core = core.ok_or_else(|| {
            DomainError::MisconfiguredAgent(format!("agency location {id} does not exist"))
        })?;

        let (email, phone) =
            tokio::try_join!(encryption.decrypt(&core.email), encryption.decrypt(&core.phone))?;

        let mut insurers = BTreeMap::new();
        for setting in settings {
            let codes = (
                setting.agency_code.filter(|code| !code.trim().is_empty()),
                setting.agent_code.filter(|code| !code.trim().is_empty()),
            );
            let (Some(agency_code), Some(agent_code)) = codes else {
                warn!(
                    event_name = "agency_location.insurer.dropped",
                    agency_location_id = %id,
                    insurer_id = %setting.insurer_id,
                    "insurer entry is missing an agency or agent code and was dropped"
                );
                continue;
            };

            let policy_types = [
                (PolicyType::Bop, setting.bop),
                (PolicyType::Gl, setting.gl),
                (PolicyType::Wc, setting.wc),
            ]
            .into_iter()
            .filter_map(|(policy_type, enabled)| enabled.then_some(policy_type))
            .collect();

            insurers.insert(
                setting.insurer_id,
                InsurerAppointment { agency_code, agent_code, policy_types },
            );
        }

        if insurers.is_empty() {
            return Err(DomainError::MisconfiguredAgent(format!(
                "agency location {id} has no usable insurers"
            ))
            .into());
        }

        Ok(Self {
            id,
            agency_id: core.agency_id,
            agency_name: core.agency_name,
            email,
            phone,
            website: core.website,
            wholesale: core.wholesale,
            insurers,
            territories: territories.into_iter().map(|territory| territory.to_uppercase()).collect(),
            house_agency_id,
        })
    }

    pub fn is_house_agency(&self) -> bool {
        self.id == self.house_agency_id
    }

    pub fn insurer_enabled(&self, insurer_id: InsurerId, policy_type: PolicyType) -> bool {
        self.insurers
            .get(&insurer_id)
            .map(|appointment| appointment.policy_types.contains(&policy_type))
            .unwrap_or(false)
    }

    pub fn insurers_for(&self, policy_type: PolicyType) -> BTreeSet<InsurerId> {
        self.insurers
            .iter()
            .filter(|(_, appointment)| appointment.policy_types.contains(&policy_type))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn appointment(&self, insurer_id: InsurerId) -> Option<&InsurerAppointment> {
        self.insurers.get(&insurer_id)
    }

    /// Every location's territory must be served and every policy type must have an enabled insurer.
    pub fn supports_application(
        &self,
        territories: &BTreeSet<String>,
        policy_types: &[PolicyType],
    ) -> Result<(), DomainError> {
        if let Some(territory) = territories.iter().find(|territory| !self.territories.contains(*territory)) {
            return Err(DomainError::unsupported(format!(
                "agency location {} does not serve territory {territory}",
                self.id
            )));
        }

        if let Some(policy_type) =
            policy_types.iter().find(|policy_type| self.insurers_for(**policy_type).is_empty())
        {
            return Err(DomainError::unsupported(format!(
                "agency location {} has no insurer enabled for {}",
                self.id,
                policy_type.description()
            )));
        }

        Ok(())
    }
}
