//! Bind workflow for a previously recorded quote.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome};
use crate::domain::ids::{PaymentPlanId, QuoteId};
use crate::domain::quote::{AggregatedStatus, BindDecision, QuoteBind};
use crate::errors::{DomainError, EngineError};
use crate::notifications::{BindSummary, NotificationEvent};
use crate::orchestrator::EngineDeps;

const ACTOR: &str = "bind-service";

#[derive(Clone)]
pub struct BindService {
    deps: Arc<EngineDeps>,
}

impl BindService {
    pub fn new(deps: Arc<EngineDeps>) -> Self {
        Self { deps }
    }

    /// Loads a quote with the payment plan chosen for it.
    ///
    /// The plan must belong to the quote's insurer and the quoted amount must
    /// reach the plan's premium threshold.
    pub async fn load_quote_for_bind(
        &self,
        quote_id: QuoteId,
        payment_plan_id: PaymentPlanId,
    ) -> Result<QuoteBind, EngineError> {
        let quote = self
            .deps
            .quotes
            .find_quote(quote_id)
            .await?
            .ok_or_else(|| DomainError::validation(format!("quote {quote_id} does not exist")))?;

        let (insurer, plans) = tokio::try_join!(
            self.deps.insurers.load_insurer(quote.insurer_id),
            self.deps.insurers.load_payment_plans(quote.insurer_id),
        )?;
        let insurer = insurer.ok_or_else(|| {
            DomainError::MisconfiguredAgent(format!(
                "quote {quote_id} references missing insurer {}",
                quote.insurer_id
            ))
        })?;

        let payment_plan =
            plans.into_iter().find(|plan| plan.id == payment_plan_id).ok_or_else(|| {
                DomainError::validation(format!(
                    "payment plan {payment_plan_id} is not offered by {}",
                    insurer.name
                ))
            })?;
        if let Some(amount) = quote.amount {
            if amount < payment_plan.premium_threshold {
                return Err(DomainError::validation(format!(
                    "payment plan '{}' requires a premium of at least {}",
                    payment_plan.name, payment_plan.premium_threshold
                ))
                .into());
            }
        }

        Ok(QuoteBind { quote, insurer_name: insurer.name, insurer_slug: insurer.slug, payment_plan })
    }

    /// Binds through the carrier's API when an adapter exists, otherwise
    /// requests a manual bind. Both paths count as success for the caller.
    pub async fn bind(&self, bind: &QuoteBind) -> Result<BindDecision, EngineError> {
        let correlation_id = Uuid::new_v4().to_string();
        let quote = &bind.quote;

        if let Err(error) = quote.ensure_bindable() {
            info!(
                event_name = "bind.rejected",
                correlation_id = %correlation_id,
                quote_id = %quote.id,
                status = %quote.status,
                error = %error,
                "bind refused"
            );
            if quote.status == AggregatedStatus::PriceIndication && !quote.bound {
                self.deps.notifications.publish(NotificationEvent::PriceIndicationBindAttempt(
                    summary(bind, &correlation_id),
                ));
            }
            return Err(error.into());
        }

        if let Some(integration) =
            self.deps.integrations.bind_integration(&bind.insurer_slug, quote.policy_type)
        {
            match integration.bind(bind).await {
                Ok(BindDecision::Bound) => {
                    match self.deps.quotes.mark_bound(quote.id).await {
                        Ok(true) => {}
                        Ok(false) => warn!(
                            event_name = "bind.mark_bound.noop",
                            correlation_id = %correlation_id,
                            quote_id = %quote.id,
                            "quote row was not updated"
                        ),
                        Err(error) => warn!(
                            event_name = "bind.mark_bound.failed",
                            correlation_id = %correlation_id,
                            quote_id = %quote.id,
                            error = %error,
                            "carrier bound the policy but the quote row was not updated"
                        ),
                    }
                    self.deps
                        .notifications
                        .publish(NotificationEvent::PolicyBound(summary(bind, &correlation_id)));
                    return Ok(self.decided(bind, &correlation_id, BindDecision::Bound, "api"));
                }
                Ok(BindDecision::Referred) => {
                    self.deps
                        .notifications
                        .publish(NotificationEvent::BindReferred(summary(bind, &correlation_id)));
                    return Ok(self.decided(bind, &correlation_id, BindDecision::Referred, "api"));
                }
                Err(error) => warn!(
                    event_name = "bind.integration.failed",
                    correlation_id = %correlation_id,
                    quote_id = %quote.id,
                    insurer_slug = %bind.insurer_slug,
                    error = %error,
                    "bind integration failed; falling back to a manual bind request"
                ),
            }
        }

        if let Err(error) = self.deps.quotes.mark_bind_requested(quote.id).await {
            warn!(
                event_name = "bind.mark_requested.failed",
                correlation_id = %correlation_id,
                quote_id = %quote.id,
                error = %error,
                "failed to flag quote as bind requested"
            );
        }
        self.deps
            .notifications
            .publish(NotificationEvent::BindRequested(summary(bind, &correlation_id)));
        Ok(self.decided(bind, &correlation_id, BindDecision::Referred, "manual"))
    }

    fn decided(
        &self,
        bind: &QuoteBind,
        correlation_id: &str,
        decision: BindDecision,
        path: &str,
    ) -> BindDecision {
        info!(
            event_name = "bind.decided",
            correlation_id,
            quote_id = %bind.quote.id,
            decision = decision.as_str(),
            path,
            "bind decided"
        );
        self.deps.audit.emit(
            AuditEvent::new(
                Some(bind.quote.application_id),
                Some(bind.quote.id),
                correlation_id,
                "bind.decided",
                AuditCategory::Bind,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("decision", decision.as_str())
            .with_metadata("path", path)
            .with_metadata("payment_plan", bind.payment_plan.name.clone()),
        );
        decision
    }
}

fn summary(bind: &QuoteBind, correlation_id: &str) -> BindSummary {
    BindSummary {
        quote_id: bind.quote.id,
        application_id: bind.quote.application_id,
        agency_location_id: bind.quote.agency_location_id,
        correlation_id: correlation_id.to_owned(),
        insurer_name: bind.insurer_name.clone(),
        policy_type: bind.quote.policy_type,
        amount: bind.quote.amount,
        payment_plan: Some(bind.payment_plan.name.clone()),
    }
}
