//! Outbound domain events and the worker that turns them into emails and Slack posts.
//!
//! The orchestrator and bind service only publish events. Delivery happens on
//! the worker task, and transport failures end in a log line.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, Environment};
use crate::domain::ids::{AgencyLocationId, ApplicationId, QuoteId};
use crate::domain::policy_type::PolicyType;
use crate::domain::quote::{QuoteOutcome, OutcomeClass};
use crate::errors::EngineError;
use crate::ports::{EmailMessage, EmailSender, SlackAttachment, SlackPost, SlackPoster, SlackSeverity};

const CUSTOMER_TEMPLATE: &str = "customer_update.html";
const AGENCY_TEMPLATE: &str = "agency_update.html";

/// What quoting produced for one application.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuotingSummary {
    pub application_id: ApplicationId,
    pub correlation_id: String,
    pub business_name: String,
    pub customer_name: String,
    pub customer_email: String,
    pub agency_location_id: AgencyLocationId,
    pub agency_name: String,
    pub agency_email: String,
    pub agency_phone: String,
    pub is_house_agency: bool,
    pub policy_types: Vec<PolicyType>,
    pub quoted_types: Vec<PolicyType>,
    pub outcomes: Vec<QuoteOutcome>,
}

impl QuotingSummary {
    pub fn all_quoted(&self) -> bool {
        !self.policy_types.is_empty() && self.quoted_types.len() == self.policy_types.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BindSummary {
    pub quote_id: QuoteId,
    pub application_id: ApplicationId,
    pub agency_location_id: AgencyLocationId,
    pub correlation_id: String,
    pub insurer_name: String,
    pub policy_type: PolicyType,
    pub amount: Option<Decimal>,
    pub payment_plan: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum NotificationEvent {
    ApplicationQuoted(QuotingSummary),
    ApplicationReferred(QuotingSummary),
    QuotingFinished(QuotingSummary),
    NoQuotesProduced(QuotingSummary),
    BindRequested(BindSummary),
    PolicyBound(BindSummary),
    BindReferred(BindSummary),
    PriceIndicationBindAttempt(BindSummary),
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ApplicationQuoted(_) => "application_quoted",
            Self::ApplicationReferred(_) => "application_referred",
            Self::QuotingFinished(_) => "quoting_finished",
            Self::NoQuotesProduced(_) => "no_quotes_produced",
            Self::BindRequested(_) => "bind_requested",
            Self::PolicyBound(_) => "policy_bound",
            Self::BindReferred(_) => "bind_referred",
            Self::PriceIndicationBindAttempt(_) => "price_indication_bind_attempt",
        }
    }
}

/// Cloneable publishing half of the notification channel.
#[derive(Clone, Debug)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn publish(&self, event: NotificationEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            warn!(
                event_name = "notification.publish.dropped",
                notification = name,
                "notification worker is gone; event dropped"
            );
        }
    }
}

#[derive(Clone, Debug)]
struct WorkerSettings {
    environment: Environment,
    brand: String,
    channel: String,
    bind_channel: String,
}

pub struct NotificationWorker {
    receiver: mpsc::UnboundedReceiver<NotificationEvent>,
    email: Arc<dyn EmailSender>,
    slack: Arc<dyn SlackPoster>,
    templates: Tera,
    settings: WorkerSettings,
}

impl NotificationWorker {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<NotificationEvent>,
        email: Arc<dyn EmailSender>,
        slack: Arc<dyn SlackPoster>,
        config: &AppConfig,
    ) -> Result<Self, EngineError> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                (CUSTOMER_TEMPLATE, include_str!("../templates/email/customer_update.html")),
                (AGENCY_TEMPLATE, include_str!("../templates/email/agency_update.html")),
            ])
            .map_err(|error| EngineError::Configuration(format!("email templates: {error}")))?;

        Ok(Self {
            receiver,
            email,
            slack,
            templates,
            settings: WorkerSettings {
                environment: config.runtime.environment,
                brand: config.email.brand.clone(),
                channel: config.slack.channel.clone(),
                bind_channel: config.slack.bind_channel.clone(),
            },
        })
    }

    /// Runs until every `NotificationQueue` clone has been dropped.
    pub async fn run(mut self) {
        info!(event_name = "notification.worker.started", "notification worker started");
        while let Some(event) = self.receiver.recv().await {
            self.handle(&event).await;
        }
        info!(event_name = "notification.worker.stopped", "notification worker stopped");
    }

    pub async fn handle(&self, event: &NotificationEvent) {
        debug!(event_name = "notification.received", notification = event.name());
        match event {
            NotificationEvent::ApplicationQuoted(summary)
            | NotificationEvent::ApplicationReferred(summary)
            | NotificationEvent::QuotingFinished(summary) => self.quoting_finished(summary).await,
            NotificationEvent::NoQuotesProduced(summary) => self.no_quotes(summary).await,
            NotificationEvent::PolicyBound(bind) => {
                self.bind_post(bind, SlackSeverity::Celebrate, "Policy bound").await
            }
            NotificationEvent::BindReferred(bind) => {
                self.bind_post(bind, SlackSeverity::Warning, "Bind referred by insurer").await
            }
            NotificationEvent::BindRequested(bind) => {
                self.bind_post(bind, SlackSeverity::Ok, "Bind requested (manual)").await
            }
            NotificationEvent::PriceIndicationBindAttempt(bind) => {
                self.bind_post(bind, SlackSeverity::Warning, "Bind attempted on a price indication")
                    .await
            }
        }
    }

    async fn quoting_finished(&self, summary: &QuotingSummary) {
        if !self.settings.environment.is_production_like() {
            debug!(
                event_name = "notification.quoting.skipped",
                correlation_id = %summary.correlation_id,
                environment = self.settings.environment.as_str(),
                "notifications are only sent in production-like environments"
            );
            return;
        }

        if summary.quoted_types.is_empty() && !summary.outcomes.is_empty() {
            self.send_customer_email(summary).await;
            if !summary.is_house_agency {
                self.send_agency_email(summary).await;
            }
        }

        if summary.is_house_agency {
            let severity = if summary.all_quoted() {
                SlackSeverity::Celebrate
            } else if summary.quoted_types.is_empty() {
                SlackSeverity::Warning
            } else {
                SlackSeverity::Ok
            };
            let message = format!(
                "Application {} for {} quoted {}/{} policy types",
                summary.application_id,
                summary.business_name,
                summary.quoted_types.len(),
                summary.policy_types.len()
            );
            self.post(SlackPost {
                channel: self.settings.channel.clone(),
                severity,
                message,
                attachment: Some(outcome_attachment(summary)),
            })
            .await;
        }
    }

    async fn no_quotes(&self, summary: &QuotingSummary) {
        if !self.settings.environment.is_production_like() {
            return;
        }
        self.post(SlackPost {
            channel: self.settings.channel.clone(),
            severity: SlackSeverity::Error,
            message: format!(
                "Application {} for {} produced no quotes",
                summary.application_id, summary.business_name
            ),
            attachment: None,
        })
        .await;
    }

    async fn send_customer_email(&self, summary: &QuotingSummary) {
        if summary.customer_email.is_empty() {
            return;
        }
        let Some(html) = self.render(CUSTOMER_TEMPLATE, summary) else {
            return;
        };
        let message = EmailMessage {
            to: summary.customer_email.clone(),
            subject: format!("Your {} insurance application", summary.business_name),
            html,
            keys: email_keys(summary),
            brand: self.settings.brand.clone(),
            agency_location_id: summary.agency_location_id,
        };
        self.send(message, summary).await;
    }

    async fn send_agency_email(&self, summary: &QuotingSummary) {
        if summary.agency_email.is_empty() {
            return;
        }
        let Some(html) = self.render(AGENCY_TEMPLATE, summary) else {
            return;
        };
        let message = EmailMessage {
            to: summary.agency_email.clone(),
            subject: format!("Application {} needs attention", summary.application_id),
            html,
            keys: email_keys(summary),
            brand: self.settings.brand.clone(),
            agency_location_id: summary.agency_location_id,
        };
        self.send(message, summary).await;
    }

    fn render(&self, template: &str, summary: &QuotingSummary) -> Option<String> {
        let mut context = Context::new();
        context.insert("application_id", &summary.application_id.0);
        context.insert("business_name", &summary.business_name);
        context.insert("customer_name", &summary.customer_name);
        context.insert("customer_email", &summary.customer_email);
        context.insert("agency_name", &summary.agency_name);
        context.insert("agency_phone", &summary.agency_phone);
        context.insert(
            "policy_types",
            &summary.policy_types.iter().map(|pt| pt.description()).collect::<Vec<_>>(),
        );
        let outcomes: Vec<BTreeMap<&str, String>> = summary
            .outcomes
            .iter()
            .map(|outcome| {
                BTreeMap::from([
                    ("insurer", outcome.insurer_name.clone()),
                    ("policy_type", outcome.policy_type.to_string()),
                    ("result", describe_outcome(outcome)),
                ])
            })
            .collect();
        context.insert("outcomes", &outcomes);

        match self.templates.render(template, &context) {
            Ok(html) => Some(html),
            Err(error) => {
                warn!(
                    event_name = "notification.email.render_failed",
                    correlation_id = %summary.correlation_id,
                    template,
                    error = %error,
                    "email template failed to render"
                );
                None
            }
        }
    }

    async fn send(&self, message: EmailMessage, summary: &QuotingSummary) {
        if let Err(error) = self.email.send(&message).await {
            warn!(
                event_name = "notification.email.failed",
                correlation_id = %summary.correlation_id,
                application_id = %summary.application_id,
                error = %error,
                "email delivery failed"
            );
        }
    }

    async fn bind_post(&self, bind: &BindSummary, severity: SlackSeverity, headline: &str) {
        let mut fields = vec![
            ("Quote".to_owned(), bind.quote_id.to_string()),
            ("Application".to_owned(), bind.application_id.to_string()),
            ("Insurer".to_owned(), bind.insurer_name.clone()),
            ("Policy type".to_owned(), bind.policy_type.description().to_owned()),
        ];
        if let Some(amount) = bind.amount {
            fields.push(("Premium".to_owned(), format!("${}", amount.round_dp(2))));
        }
        if let Some(plan) = &bind.payment_plan {
            fields.push(("Payment plan".to_owned(), plan.clone()));
        }

        self.post(SlackPost {
            channel: self.settings.bind_channel.clone(),
            severity,
            message: format!("{headline}: quote {}", bind.quote_id),
            attachment: Some(SlackAttachment { title: headline.to_owned(), fields }),
        })
        .await;
    }

    async fn post(&self, post: SlackPost) {
        if let Err(error) = self.slack.post(&post).await {
            warn!(
                event_name = "notification.slack.failed",
                channel = %post.channel,
                error = %error,
                "slack post failed"
            );
        }
    }
}

fn describe_outcome(outcome: &QuoteOutcome) -> String {
    match (outcome.classify(), outcome.amount) {
        (OutcomeClass::Quoted, Some(amount)) => format!("quoted ${}", amount.round_dp(2)),
        _ => outcome.aggregated_status().as_str().replace('_', " "),
    }
}

fn outcome_attachment(summary: &QuotingSummary) -> SlackAttachment {
    SlackAttachment {
        title: format!("{} ({})", summary.business_name, summary.agency_name),
        fields: summary
            .outcomes
            .iter()
            .map(|outcome| {
                (format!("{} {}", outcome.insurer_name, outcome.policy_type), describe_outcome(outcome))
            })
            .collect(),
    }
}

fn email_keys(summary: &QuotingSummary) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("application_id".to_owned(), summary.application_id.to_string()),
        ("business_name".to_owned(), summary.business_name.clone()),
        ("agency_name".to_owned(), summary.agency_name.clone()),
        ("agency_email".to_owned(), summary.agency_email.clone()),
        ("agency_phone".to_owned(), summary.agency_phone.clone()),
    ])
}
