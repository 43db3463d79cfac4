pub mod audit;
pub mod bind;
pub mod config;
pub mod domain;
pub mod errors;
pub mod integrations;
pub mod notifications;
pub mod orchestrator;
pub mod ports;

pub use audit::{
    AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use bind::BindService;
pub use domain::application::{Application, ApplicationState, OutcomeTally};
pub use domain::ids::{
    ActivityCodeId, AgencyLocationId, AnswerId, ApplicationId, InsurerId, PaymentPlanId,
    QuestionId, QuoteId,
};
pub use domain::payload::ApplicationPayload;
pub use domain::policy_type::PolicyType;
pub use domain::quote::{AggregatedStatus, BindDecision, QuoteBind, QuoteOutcome, QuoteRecord};
pub use errors::{DomainError, EngineError, InterfaceError};
pub use integrations::{BindIntegration, IntegrationRegistry, QuoteIntegration, QuoteRequest};
pub use notifications::{
    BindSummary, NotificationEvent, NotificationQueue, NotificationWorker, QuotingSummary,
};
pub use orchestrator::{EngineDeps, QuoteOrchestrator, QuoteStreamEvent, QuotingReport};
