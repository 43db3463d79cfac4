//! Application orchestration: validate, resolve insurers, fan out quotes.
//!
//! `QuoteOrchestrator` holds no per-application state. Everything it needs
//! from the outside world arrives through [`EngineDeps`].

mod insurers;
mod quoting;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::config::AppConfig;
use crate::domain::agency_location::AgencyLocation;
use crate::domain::application::Application;
use crate::domain::ids::AgencyLocationId;
use crate::domain::payload::ApplicationPayload;
use crate::domain::policy::PolicyContext;
use crate::domain::policy_type::PolicyType;
use crate::domain::question::QuestionSet;
use crate::errors::{DomainError, EngineError};
use crate::integrations::IntegrationRegistry;
use crate::notifications::NotificationQueue;
use crate::ports::{
    AgencyLocationStore, ApplicationStore, EncryptionService, InsurerStore, QuestionCatalog,
    QuestionQuery, QuoteStore, ZipCodeLookup,
};

pub use quoting::{QuoteStreamEvent, QuotingReport};

const ACTOR: &str = "quote-orchestrator";

/// Every collaborator the engine talks to.
pub struct EngineDeps {
    pub config: AppConfig,
    pub zips: Arc<dyn ZipCodeLookup>,
    pub agencies: Arc<dyn AgencyLocationStore>,
    pub insurers: Arc<dyn InsurerStore>,
    pub questions: Arc<dyn QuestionCatalog>,
    pub encryption: Arc<dyn EncryptionService>,
    pub applications: Arc<dyn ApplicationStore>,
    pub quotes: Arc<dyn QuoteStore>,
    pub integrations: IntegrationRegistry,
    pub notifications: NotificationQueue,
    pub audit: Arc<dyn AuditSink>,
}

impl EngineDeps {
    pub fn house_agency_id(&self) -> AgencyLocationId {
        self.config.runtime.house_agency_location_id
    }
}

#[derive(Clone)]
pub struct QuoteOrchestrator {
    deps: Arc<EngineDeps>,
}

impl QuoteOrchestrator {
    pub fn new(deps: Arc<EngineDeps>) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &Arc<EngineDeps> {
        &self.deps
    }

    /// Maps a payload onto a fresh `Application`. Nothing is validated here.
    pub fn load(&self, payload: ApplicationPayload) -> Application {
        Application::load(payload, self.deps.house_agency_id())
    }

    /// Validates the whole application and resolves its insurers and questions.
    ///
    /// Stops at the first failure. On success `app.agency_location`,
    /// `app.insurers` and `app.questions` are populated.
    pub async fn validate(
        &self,
        app: &mut Application,
        requested_insurers: Option<&[String]>,
    ) -> Result<(), EngineError> {
        let today = Utc::now().date_naive();
        info!(
            event_name = "application.validate.start",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            agency_location_id = %app.agency_location_id,
            "validating application"
        );

        app.agency_location = Some(self.init_agency(app.agency_location_id).await?);

        if !app.test && !app.id.is_assigned() {
            return Err(DomainError::validation("application id must be a positive integer").into());
        }
        if app.policies.is_empty() {
            return Err(DomainError::validation("at least one policy is required").into());
        }

        match self.get_insurers(app, requested_insurers).await {
            Err(EngineError::Domain(DomainError::UnsupportedRequest(reason)))
                if self.can_retarget(app) =>
            {
                self.retarget_to_house(app, &reason).await?;
                self.get_insurers(app, requested_insurers).await?;
            }
            other => other?,
        }

        let policy_types = app.policy_types();
        app.business.validate(&policy_types, today, self.deps.zips.as_ref()).await?;
        self.validate_policies(app, today)?;
        self.resolve_questions(app, &policy_types).await?;

        app.agency()?.supports_application(&app.business.territories(), &policy_types)?;

        info!(
            event_name = "application.validate.complete",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            agency_location_id = %app.agency_location_id,
            insurers = app.insurers.len(),
            questions = app.questions.len(),
            "application is valid"
        );
        Ok(())
    }

    async fn init_agency(&self, id: AgencyLocationId) -> Result<AgencyLocation, EngineError> {
        AgencyLocation::init(
            id,
            self.deps.house_agency_id(),
            self.deps.agencies.as_ref(),
            self.deps.encryption.as_ref(),
        )
        .await
    }

    fn can_retarget(&self, app: &Application) -> bool {
        app.agency_location
            .as_ref()
            .is_some_and(|agency| agency.wholesale && !agency.is_house_agency())
    }

    /// Moves a wholesale application onto the house agency. Only insurer
    /// resolution is repeated afterwards.
    async fn retarget_to_house(&self, app: &mut Application, reason: &str) -> Result<(), EngineError> {
        let original = app.agency_location_id;
        let house = self.deps.house_agency_id();
        warn!(
            event_name = "application.wholesale.retarget",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            from_agency_location_id = %original,
            to_agency_location_id = %house,
            reason,
            "agency cannot support request; retargeting to house agency"
        );

        app.agency_location_id = house;
        app.agency_location = Some(self.init_agency(house).await?);

        self.deps.audit.emit(
            AuditEvent::new(
                Some(app.id),
                None,
                app.correlation_id.clone(),
                "application.wholesale_retarget",
                AuditCategory::Validation,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("from_agency_location_id", original.to_string())
            .with_metadata("to_agency_location_id", house.to_string())
            .with_metadata("reason", reason),
        );
        Ok(())
    }

    fn validate_policies(&self, app: &mut Application, today: NaiveDate) -> Result<(), EngineError> {
        let territories = app.business.territories();
        let primary_territory = app.business.primary_territory.clone().unwrap_or_default();
        let founded = app.business.founded;

        for policy in &mut app.policies {
            policy.validate(PolicyContext {
                today,
                founded,
                primary_territory: &primary_territory,
                territories: &territories,
            })?;
        }
        Ok(())
    }

    async fn resolve_questions(
        &self,
        app: &mut Application,
        policy_types: &[PolicyType],
    ) -> Result<(), EngineError> {
        let query = QuestionQuery {
            activity_codes: if policy_types.contains(&PolicyType::Wc) {
                app.business.activity_codes().into_iter().collect()
            } else {
                Vec::new()
            },
            industry_code: Some(app.business.industry_code),
            zip_codes: app.business.zip_codes().into_iter().collect(),
            policy_types: policy_types.to_vec(),
            insurer_ids: app.insurers.iter().map(|insurer| insurer.id).collect(),
        };

        let records = self.deps.questions.get_questions(&query).await?;
        debug!(
            event_name = "application.questions.loaded",
            correlation_id = %app.correlation_id,
            questions = records.len(),
            "question catalog loaded"
        );

        let mut questions = QuestionSet::from_catalog(records, &app.answers)?;
        questions.resolve_requirements()?;
        questions.validate()?;
        app.questions = questions;
        Ok(())
    }
}
