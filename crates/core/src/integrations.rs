//! Per-carrier quote and bind adapters.
//!
//! Adapters are registered against `(insurer slug, policy type)`. A missing
//! registration means the pair is not quotable; it is never an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Environment;
use crate::domain::agency_location::AgencyLocation;
use crate::domain::application::Application;
use crate::domain::insurer::{Credentials, Insurer};
use crate::domain::policy::Policy;
use crate::domain::policy_type::PolicyType;
use crate::domain::quote::{BindDecision, QuoteBind, QuoteOutcome};
use crate::ports::IntegrationError;

/// Everything an adapter may read to price one policy with one carrier.
#[derive(Clone, Copy, Debug)]
pub struct QuoteRequest<'a> {
    pub application: &'a Application,
    pub agency: &'a AgencyLocation,
    pub policy: &'a Policy,
    pub insurer: &'a Insurer,
    pub credentials: Option<&'a Credentials>,
    pub environment: Environment,
}

#[async_trait]
pub trait QuoteIntegration: Send + Sync {
    /// Adapters own their timeouts and rate limiting.
    async fn quote(&self, request: QuoteRequest<'_>) -> Result<QuoteOutcome, IntegrationError>;
}

#[async_trait]
pub trait BindIntegration: Send + Sync {
    async fn bind(&self, bind: &QuoteBind) -> Result<BindDecision, IntegrationError>;
}

type IntegrationKey = (String, PolicyType);

#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    quote: HashMap<IntegrationKey, Arc<dyn QuoteIntegration>>,
    bind: HashMap<IntegrationKey, Arc<dyn BindIntegration>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_quote(
        &mut self,
        slug: impl Into<String>,
        policy_type: PolicyType,
        integration: Arc<dyn QuoteIntegration>,
    ) -> &mut Self {
        self.quote.insert((normalize_slug(slug), policy_type), integration);
        self
    }

    pub fn register_bind(
        &mut self,
        slug: impl Into<String>,
        policy_type: PolicyType,
        integration: Arc<dyn BindIntegration>,
    ) -> &mut Self {
        self.bind.insert((normalize_slug(slug), policy_type), integration);
        self
    }

    pub fn quote_integration(
        &self,
        slug: &str,
        policy_type: PolicyType,
    ) -> Option<Arc<dyn QuoteIntegration>> {
        self.quote.get(&(slug.trim().to_ascii_lowercase(), policy_type)).cloned()
    }

    pub fn bind_integration(
        &self,
        slug: &str,
        policy_type: PolicyType,
    ) -> Option<Arc<dyn BindIntegration>> {
        self.bind.get(&(slug.trim().to_ascii_lowercase(), policy_type)).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.quote.is_empty() && self.bind.is_empty()
    }
}

fn normalize_slug(slug: impl Into<String>) -> String {
    slug.into().trim().to_ascii_lowercase()
}

impl fmt::Debug for IntegrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut quote: Vec<String> =
            self.quote.keys().map(|(slug, policy_type)| format!("{slug}/{policy_type}")).collect();
        quote.sort();
        let mut bind: Vec<String> =
            self.bind.keys().map(|(slug, policy_type)| format!("{slug}/{policy_type}")).collect();
        bind.sort();
        f.debug_struct("IntegrationRegistry").field("quote", &quote).field("bind", &bind).finish()
    }
}
