use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{QuoteOrchestrator, ACTOR};
use crate::audit::{AuditCategory, AuditEvent, AuditOutcome};
use crate::domain::agency_location::AgencyLocation;
use crate::domain::application::{Application, ApplicationState, OutcomeTally};
use crate::domain::insurer::Insurer;
use crate::domain::policy::Policy;
use crate::domain::policy_type::PolicyType;
use crate::domain::quote::QuoteOutcome;
use crate::errors::{DomainError, EngineError};
use crate::integrations::{QuoteIntegration, QuoteRequest};
use crate::notifications::{NotificationEvent, QuotingSummary};
use crate::ports::{NewQuote, QuoteProgress};

/// Emitted while quoting in streaming mode. `Done` is always last and sent once.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QuoteStreamEvent {
    Quote(QuoteOutcome),
    Done(QuotingReport),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuotingReport {
    pub outcomes: Vec<QuoteOutcome>,
    pub state: ApplicationState,
    pub quoted_types: BTreeSet<PolicyType>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QuotingMode {
    Live,
    /// Quotes are computed but nothing is persisted or announced.
    Test,
}

impl QuotingMode {
    fn persists(self) -> bool {
        self == Self::Live
    }
}

/// One (policy, insurer) combination with a registered adapter.
struct QuotePair<'a> {
    policy: &'a Policy,
    insurer: &'a Insurer,
    integration: Arc<dyn QuoteIntegration>,
}

impl QuoteOrchestrator {
    /// Quotes every eligible pair and waits for all of them.
    ///
    /// Fails with `NoQuotesPossible` when no adapter produced an outcome.
    pub async fn run_quotes(&self, app: &Application) -> Result<QuotingReport, EngineError> {
        let report = self.quote_batch(app, QuotingMode::Live).await?;
        if report.outcomes.is_empty() {
            return Err(DomainError::NoQuotesPossible(format!(
                "no insurer produced a quote for application {}",
                app.id
            ))
            .into());
        }
        Ok(report)
    }

    /// Same fan-out as `run_quotes`, without persistence or notifications.
    pub async fn run_test(&self, app: &Application) -> Result<QuotingReport, EngineError> {
        self.quote_batch(app, QuotingMode::Test).await
    }

    /// Quotes every eligible pair, forwarding each outcome as soon as it lands.
    ///
    /// Keeps quoting when the receiver goes away; outcomes are still recorded.
    pub async fn run_quotes_streaming(
        &self,
        app: &Application,
        sender: mpsc::UnboundedSender<QuoteStreamEvent>,
    ) -> Result<QuotingReport, EngineError> {
        let agency = app.agency()?;
        let pairs = self.quote_pairs(app, agency);
        self.begin(app, pairs.len(), QuotingMode::Live).await;

        let mut tally = OutcomeTally::new(app.policy_types());
        let mut outcomes = Vec::with_capacity(pairs.len());
        let mut pending: FuturesUnordered<_> = pairs
            .iter()
            .map(|pair| self.quote_one(app, agency, pair, QuotingMode::Live))
            .collect();

        let mut receiver_open = true;
        while let Some(result) = pending.next().await {
            let Some(outcome) = result else {
                continue;
            };
            tally.record(&outcome);
            if receiver_open && sender.send(QuoteStreamEvent::Quote(outcome.clone())).is_err() {
                receiver_open = false;
                debug!(
                    event_name = "quote.stream.receiver_closed",
                    correlation_id = %app.correlation_id,
                    "stream receiver dropped; quoting continues"
                );
            }
            outcomes.push(outcome);
        }

        let report = self.finish(app, agency, tally, outcomes, QuotingMode::Live).await;
        if receiver_open {
            let _ = sender.send(QuoteStreamEvent::Done(report.clone()));
        }
        Ok(report)
    }

    async fn quote_batch(
        &self,
        app: &Application,
        mode: QuotingMode,
    ) -> Result<QuotingReport, EngineError> {
        let agency = app.agency()?;
        let pairs = self.quote_pairs(app, agency);
        self.begin(app, pairs.len(), mode).await;

        let results =
            join_all(pairs.iter().map(|pair| self.quote_one(app, agency, pair, mode))).await;

        let mut tally = OutcomeTally::new(app.policy_types());
        let outcomes: Vec<QuoteOutcome> = results.into_iter().flatten().collect();
        for outcome in &outcomes {
            tally.record(outcome);
        }

        Ok(self.finish(app, agency, tally, outcomes, mode).await)
    }

    fn quote_pairs<'a>(&self, app: &'a Application, agency: &AgencyLocation) -> Vec<QuotePair<'a>> {
        let now = Utc::now();
        let mut pairs = Vec::new();

        for policy in &app.policies {
            for insurer in &app.insurers {
                let policy_type = policy.policy_type;
                if !insurer.supports(policy_type) || !agency.insurer_enabled(insurer.id, policy_type) {
                    continue;
                }
                if !policy.insurers.is_empty() && !policy.insurers.contains(&insurer.id) {
                    continue;
                }
                if insurer.in_outage(now) {
                    warn!(
                        event_name = "quote.insurer.outage",
                        correlation_id = %app.correlation_id,
                        insurer_id = %insurer.id,
                        policy_type = %policy_type,
                        "insurer is in an outage window; skipped"
                    );
                    continue;
                }
                let Some(integration) =
                    self.deps.integrations.quote_integration(&insurer.slug, policy_type)
                else {
                    debug!(
                        event_name = "quote.integration.missing",
                        correlation_id = %app.correlation_id,
                        insurer_slug = %insurer.slug,
                        policy_type = %policy_type,
                        "no quote integration registered; skipped"
                    );
                    continue;
                };
                pairs.push(QuotePair { policy, insurer, integration });
            }
        }
        pairs
    }

    async fn begin(&self, app: &Application, pairs: usize, mode: QuotingMode) {
        info!(
            event_name = "quote.run.start",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            pairs,
            test = !mode.persists(),
            "quoting started"
        );
        if mode.persists() {
            self.record_progress(app, QuoteProgress::Quoting).await;
        }
    }

    async fn quote_one(
        &self,
        app: &Application,
        agency: &AgencyLocation,
        pair: &QuotePair<'_>,
        mode: QuotingMode,
    ) -> Option<QuoteOutcome> {
        let environment = self.deps.config.runtime.environment;
        let request = QuoteRequest {
            application: app,
            agency,
            policy: pair.policy,
            insurer: pair.insurer,
            credentials: pair.insurer.credentials(environment),
            environment,
        };

        let mut outcome = match pair.integration.quote(request).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "quote.integration.failed",
                    correlation_id = %app.correlation_id,
                    insurer_id = %pair.insurer.id,
                    policy_type = %pair.policy.policy_type,
                    error = %error,
                    "integration failed; no quote from this insurer"
                );
                return None;
            }
        };
        outcome.insurer_id = pair.insurer.id;
        outcome.policy_type = pair.policy.policy_type;
        if outcome.insurer_name.is_empty() {
            outcome.insurer_name = pair.insurer.name.clone();
        }

        if mode.persists() {
            let record = NewQuote {
                application_id: app.id,
                agency_location_id: agency.id,
                insurer_id: outcome.insurer_id,
                policy_type: outcome.policy_type,
                amount: outcome.amount,
                status: outcome.aggregated_status(),
                letter: outcome.letter.clone(),
            };
            match self.deps.quotes.record_quote(record).await {
                Ok(quote_id) => outcome.quote_id = Some(quote_id),
                Err(error) => warn!(
                    event_name = "quote.record.failed",
                    correlation_id = %app.correlation_id,
                    insurer_id = %outcome.insurer_id,
                    error = %error,
                    "failed to record quote"
                ),
            }
        }
        Some(outcome)
    }

    async fn finish(
        &self,
        app: &Application,
        agency: &AgencyLocation,
        tally: OutcomeTally,
        outcomes: Vec<QuoteOutcome>,
        mode: QuotingMode,
    ) -> QuotingReport {
        let state = tally.resulting_state();
        let quoted_types = tally.quoted_types();
        info!(
            event_name = "quote.run.complete",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            outcomes = outcomes.len(),
            state = %state,
            "quoting finished"
        );

        if mode.persists() {
            self.record_progress(app, QuoteProgress::Complete).await;
            if app.state.can_transition_to(state) {
                self.transition(app, state).await;
            }

            let summary = quoting_summary(app, agency, &outcomes, &quoted_types);
            let event = if outcomes.is_empty() {
                NotificationEvent::NoQuotesProduced(summary)
            } else {
                match state {
                    ApplicationState::Quoted => NotificationEvent::ApplicationQuoted(summary),
                    ApplicationState::Referred => NotificationEvent::ApplicationReferred(summary),
                    ApplicationState::New => NotificationEvent::QuotingFinished(summary),
                }
            };
            self.deps.notifications.publish(event);
        }

        QuotingReport { outcomes, state, quoted_types }
    }

    async fn record_progress(&self, app: &Application, progress: QuoteProgress) {
        if let Err(error) = self.deps.applications.update_progress(app.id, progress).await {
            warn!(
                event_name = "application.progress.failed",
                correlation_id = %app.correlation_id,
                application_id = %app.id,
                progress = progress.as_str(),
                error = %error,
                "failed to record quote progress"
            );
        }
    }

    /// Single-row conditional write; a concurrent requote may already have moved the row.
    async fn transition(&self, app: &Application, to: ApplicationState) {
        let outcome = match self.deps.applications.transition_state(app.id, app.state, to).await {
            Ok(true) => AuditOutcome::Success,
            Ok(false) => {
                warn!(
                    event_name = "application.state.stale",
                    correlation_id = %app.correlation_id,
                    application_id = %app.id,
                    from = %app.state,
                    to = %to,
                    "application state changed underneath this run"
                );
                AuditOutcome::Rejected
            }
            Err(error) => {
                warn!(
                    event_name = "application.state.failed",
                    correlation_id = %app.correlation_id,
                    application_id = %app.id,
                    error = %error,
                    "failed to persist application state"
                );
                AuditOutcome::Failed
            }
        };

        self.deps.audit.emit(
            AuditEvent::new(
                Some(app.id),
                None,
                app.correlation_id.clone(),
                "application.state_transition",
                AuditCategory::Quoting,
                ACTOR,
                outcome,
            )
            .with_metadata("from", app.state.as_str())
            .with_metadata("to", to.as_str()),
        );
    }
}

fn quoting_summary(
    app: &Application,
    agency: &AgencyLocation,
    outcomes: &[QuoteOutcome],
    quoted_types: &BTreeSet<PolicyType>,
) -> QuotingSummary {
    let contact = app.business.primary_contact();
    QuotingSummary {
        application_id: app.id,
        correlation_id: app.correlation_id.clone(),
        business_name: app.business.name.clone(),
        customer_name: contact.map(|contact| contact.full_name()).unwrap_or_default(),
        customer_email: contact.map(|contact| contact.email.clone()).unwrap_or_default(),
        agency_location_id: agency.id,
        agency_name: agency.agency_name.clone(),
        agency_email: agency.email.clone(),
        agency_phone: agency.phone.clone(),
        is_house_agency: agency.is_house_agency(),
        policy_types: app.policy_types(),
        quoted_types: quoted_types.iter().copied().collect(),
        outcomes: outcomes.to_vec(),
    }
}
