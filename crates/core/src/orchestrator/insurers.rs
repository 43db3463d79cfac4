use std::collections::BTreeSet;

use futures::future::try_join_all;
use tracing::debug;

use super::QuoteOrchestrator;
use crate::domain::application::Application;
use crate::domain::ids::InsurerId;
use crate::domain::insurer::Insurer;
use crate::errors::{DomainError, EngineError};

impl QuoteOrchestrator {
    /// Resolves and initializes the insurers this application may be quoted with.
    ///
    /// Policy-level insurer lists are unioned; each listed insurer must be
    /// enabled for that policy's type at the agency and write that type itself. An empty union means every insurer the
    /// agency has. `requested_slugs` narrows the initialized set afterwards.
    pub async fn get_insurers(
        &self,
        app: &mut Application,
        requested_slugs: Option<&[String]>,
    ) -> Result<(), EngineError> {
        let agency = app.agency()?;

        let mut desired: BTreeSet<InsurerId> = BTreeSet::new();
        for policy in &app.policies {
            let enabled = agency.insurers_for(policy.policy_type);
            if enabled.is_empty() {
                return Err(DomainError::unsupported(format!(
                    "agency location {} does not offer {} coverage",
                    agency.id, policy.policy_type
                ))
                .into());
            }
            if let Some(missing) = policy.insurers.iter().find(|id| !enabled.contains(*id)) {
                return Err(DomainError::unsupported(format!(
                    "insurer {missing} is not enabled for {} at agency location {}",
                    policy.policy_type, agency.id
                ))
                .into());
            }
            desired.extend(policy.insurers.iter().copied());
        }

        if desired.is_empty() {
            desired = agency.insurers.keys().copied().collect();
        }

        let store = self.deps.insurers.as_ref();
        let encryption = self.deps.encryption.as_ref();
        let mut insurers =
            try_join_all(desired.iter().map(|id| Insurer::init(*id, store, encryption))).await?;

        for policy in &app.policies {
            let unsupported = insurers.iter().find(|insurer| {
                policy.insurers.contains(&insurer.id) && !insurer.supports(policy.policy_type)
            });
            if let Some(insurer) = unsupported {
                return Err(DomainError::unsupported(format!(
                    "insurer {} does not write {} coverage",
                    insurer.id, policy.policy_type
                ))
                .into());
            }
        }

        if let Some(slugs) = requested_slugs.filter(|slugs| !slugs.is_empty()) {
            let allowed: BTreeSet<String> =
                slugs.iter().map(|slug| slug.trim().to_ascii_lowercase()).collect();
            insurers.retain(|insurer| allowed.contains(&insurer.slug.to_ascii_lowercase()));
        }

        debug!(
            event_name = "application.insurers.resolved",
            correlation_id = %app.correlation_id,
            agency_location_id = %agency.id,
            insurers = ?insurers.iter().map(|insurer| insurer.id.0).collect::<Vec<_>>(),
            "insurers resolved"
        );

        app.insurers = insurers;
        Ok(())
    }
}
