//! Contracts for every collaborator the engine talks to.
//!
//! Persistence, the question catalog, the encryption service and the
//! notification transports all sit behind these traits so the orchestrator
//! can be wired with SQL/HTTP adapters in production and fakes in tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::application::ApplicationState;
use crate::domain::ids::{
    ActivityCodeId, AgencyLocationId, ApplicationId, InsurerId, QuoteId,
};
use crate::domain::insurer::{OutageWindow, PackageType, PaymentPlan};
use crate::domain::policy_type::PolicyType;
use crate::domain::question::CatalogQuestion;
use crate::domain::quote::{AggregatedStatus, QuoteRecord};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} service transport failure: {message}")]
    Transport { service: &'static str, message: String },
    #[error("{service} service responded with status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} service returned an unreadable body: {message}")]
    Decode { service: &'static str, message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("integration request failed: {0}")]
    Request(String),
    #[error("integration response rejected: {0}")]
    Response(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification transport failure: {0}")]
pub struct NotificationError(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipCode {
    pub zip: String,
    pub city: String,
    pub territory: String,
}

#[async_trait]
pub trait ZipCodeLookup: Send + Sync {
    async fn lookup(&self, zip: &str) -> Result<Option<ZipCode>, RepositoryError>;
}

/// Core agency row. `email` and `phone` arrive encrypted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgencyLocationRecord {
    pub id: AgencyLocationId,
    pub agency_id: u64,
    pub agency_name: String,
    pub email: String,
    pub phone: String,
    pub website: Option<String>,
    pub wholesale: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgencyInsurerRecord {
    pub insurer_id: InsurerId,
    pub agency_code: Option<String>,
    pub agent_code: Option<String>,
    pub bop: bool,
    pub gl: bool,
    pub wc: bool,
}

#[async_trait]
pub trait AgencyLocationStore: Send + Sync {
    async fn load_core(
        &self,
        id: AgencyLocationId,
    ) -> Result<Option<AgencyLocationRecord>, RepositoryError>;
    async fn load_insurer_settings(
        &self,
        id: AgencyLocationId,
    ) -> Result<Vec<AgencyInsurerRecord>, RepositoryError>;
    async fn load_territories(&self, id: AgencyLocationId) -> Result<Vec<String>, RepositoryError>;
}

/// Insurer row. Credential columns arrive encrypted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsurerRecord {
    pub id: InsurerId,
    pub name: String,
    pub slug: String,
    pub policy_types: Vec<PolicyType>,
    pub live_username: Option<String>,
    pub live_password: Option<String>,
    pub test_username: Option<String>,
    pub test_password: Option<String>,
}

#[async_trait]
pub trait InsurerStore: Send + Sync {
    async fn load_insurer(&self, id: InsurerId) -> Result<Option<InsurerRecord>, RepositoryError>;
    async fn load_payment_plans(&self, id: InsurerId) -> Result<Vec<PaymentPlan>, RepositoryError>;
    async fn load_package_types(&self, id: InsurerId)
        -> Result<Vec<PackageType>, RepositoryError>;
    async fn load_outages(&self, id: InsurerId) -> Result<Vec<OutageWindow>, RepositoryError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionQuery {
    pub activity_codes: Vec<ActivityCodeId>,
    pub industry_code: Option<u64>,
    pub zip_codes: Vec<String>,
    pub policy_types: Vec<PolicyType>,
    pub insurer_ids: Vec<InsurerId>,
}

#[async_trait]
pub trait QuestionCatalog: Send + Sync {
    async fn get_questions(&self, query: &QuestionQuery)
        -> Result<Vec<CatalogQuestion>, ServiceError>;
}

#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError>;
    async fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteProgress {
    Quoting,
    Complete,
}

impl QuoteProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quoting => "quoting",
            Self::Complete => "complete",
        }
    }
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn update_progress(
        &self,
        id: ApplicationId,
        progress: QuoteProgress,
    ) -> Result<(), RepositoryError>;

    /// Conditional single-row write: applies only while the stored state equals `from`.
    /// Returns whether a row changed.
    async fn transition_state(
        &self,
        id: ApplicationId,
        from: ApplicationState,
        to: ApplicationState,
    ) -> Result<bool, RepositoryError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewQuote {
    pub application_id: ApplicationId,
    pub agency_location_id: AgencyLocationId,
    pub insurer_id: InsurerId,
    pub policy_type: PolicyType,
    pub amount: Option<Decimal>,
    pub status: AggregatedStatus,
    pub letter: Option<String>,
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn record_quote(&self, quote: NewQuote) -> Result<QuoteId, RepositoryError>;
    async fn find_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError>;
    /// One-way: never clears an existing `bound` flag.
    async fn mark_bound(&self, id: QuoteId) -> Result<bool, RepositoryError>;
    async fn mark_bind_requested(&self, id: QuoteId) -> Result<bool, RepositoryError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub keys: BTreeMap<String, String>,
    pub brand: String,
    pub agency_location_id: AgencyLocationId,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlackSeverity {
    Celebrate,
    Ok,
    Warning,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlackAttachment {
    pub title: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlackPost {
    pub channel: String,
    pub severity: SlackSeverity,
    pub message: String,
    pub attachment: Option<SlackAttachment>,
}

#[async_trait]
pub trait SlackPoster: Send + Sync {
    async fn post(&self, post: &SlackPost) -> Result<(), NotificationError>;
}
