mod support;

use std::sync::Arc;

use rust_decimal::Decimal;

use coverquote_core::ports::IntegrationError;
use coverquote_core::{
    AgencyLocationId, AggregatedStatus, ApplicationId, BindDecision, BindService, DomainError,
    EngineError, InsurerId, NotificationEvent, PaymentPlanId, PolicyType, QuoteId, QuoteRecord,
};

use support::{HarnessBuilder, ScriptedBind, AGENCY, GRANITE};

fn record(id: u64, status: AggregatedStatus, bound: bool) -> QuoteRecord {
    QuoteRecord {
        id: QuoteId(id),
        application_id: ApplicationId(42),
        agency_location_id: AgencyLocationId(AGENCY),
        insurer_id: InsurerId(GRANITE),
        policy_type: PolicyType::Wc,
        amount: Some(Decimal::new(3_400, 0)),
        status,
        bound,
    }
}

#[tokio::test]
async fn api_bind_marks_quote_bound_and_announces_it() {
    let integration = Arc::new(ScriptedBind::new(Ok(BindDecision::Bound)));
    let mut harness = HarnessBuilder::new().bind("granite", PolicyType::Wc, integration.clone()).build();
    harness.quotes.insert(record(77, AggregatedStatus::Quoted, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(77), PaymentPlanId(1)).await.expect("bindable");
    assert_eq!(bind.insurer_slug, "granite");
    assert_eq!(bind.payment_plan.name, "Annual");

    assert_eq!(service.bind(&bind).await, Ok(BindDecision::Bound));
    assert!(harness.quotes.get(QuoteId(77)).expect("row").bound);
    assert!(matches!(harness.drain_events().as_slice(), [NotificationEvent::PolicyBound(_)]));

    let audit = harness.audit.events_of("bind.decided");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].metadata.get("decision").map(String::as_str), Some("Bound"));
}

#[tokio::test]
async fn bound_quote_is_refused_without_side_effects() {
    let integration = Arc::new(ScriptedBind::new(Ok(BindDecision::Bound)));
    let mut harness = HarnessBuilder::new().bind("granite", PolicyType::Wc, integration.clone()).build();
    harness.quotes.insert(record(77, AggregatedStatus::Bound, true));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(77), PaymentPlanId(1)).await.expect("loads");
    assert_eq!(
        service.bind(&bind).await,
        Err(EngineError::Domain(DomainError::AlreadyBound(QuoteId(77))))
    );
    assert_eq!(*integration.calls.lock().expect("lock"), 0);
    assert!(harness.drain_events().is_empty());
    assert!(harness.quotes.bind_requested.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn autodeclined_quote_is_not_eligible_and_sends_nothing() {
    let mut harness = HarnessBuilder::new().build();
    harness.quotes.insert(record(78, AggregatedStatus::Autodeclined, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(78), PaymentPlanId(1)).await.expect("loads");
    let error = service.bind(&bind).await.expect_err("ineligible");

    assert!(matches!(
        error,
        EngineError::Domain(DomainError::NotEligibleForBind {
            status: AggregatedStatus::Autodeclined,
            ..
        })
    ));
    assert!(harness.drain_events().is_empty());
}

#[tokio::test]
async fn price_indication_bind_attempt_is_flagged() {
    let mut harness = HarnessBuilder::new().build();
    harness.quotes.insert(record(79, AggregatedStatus::PriceIndication, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(79), PaymentPlanId(1)).await.expect("loads");
    assert!(service.bind(&bind).await.is_err());
    assert!(matches!(
        harness.drain_events().as_slice(),
        [NotificationEvent::PriceIndicationBindAttempt(_)]
    ));
}

#[tokio::test]
async fn without_bind_integration_a_manual_bind_is_requested() {
    let mut harness = HarnessBuilder::new().build();
    harness.quotes.insert(record(80, AggregatedStatus::Referred, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(80), PaymentPlanId(1)).await.expect("loads");
    assert_eq!(service.bind(&bind).await, Ok(BindDecision::Referred));

    let row = harness.quotes.get(QuoteId(80)).expect("row");
    assert_eq!(row.status, AggregatedStatus::BindRequested);
    assert!(!row.bound);
    assert!(matches!(harness.drain_events().as_slice(), [NotificationEvent::BindRequested(_)]));
}

#[tokio::test]
async fn failed_bind_integration_falls_back_to_manual_request() {
    let integration =
        Arc::new(ScriptedBind::new(Err(IntegrationError::Request("carrier offline".to_owned()))));
    let mut harness = HarnessBuilder::new().bind("granite", PolicyType::Wc, integration).build();
    harness.quotes.insert(record(81, AggregatedStatus::Quoted, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(81), PaymentPlanId(1)).await.expect("loads");
    assert_eq!(service.bind(&bind).await, Ok(BindDecision::Referred));
    assert_eq!(harness.quotes.bind_requested.lock().expect("lock").clone(), vec![QuoteId(81)]);
    assert!(matches!(harness.drain_events().as_slice(), [NotificationEvent::BindRequested(_)]));
}

#[tokio::test]
async fn carrier_referral_leaves_quote_untouched() {
    let integration = Arc::new(ScriptedBind::new(Ok(BindDecision::Referred)));
    let mut harness = HarnessBuilder::new().bind("granite", PolicyType::Wc, integration).build();
    harness.quotes.insert(record(82, AggregatedStatus::Quoted, false));
    let service = BindService::new(harness.deps.clone());

    let bind = service.load_quote_for_bind(QuoteId(82), PaymentPlanId(1)).await.expect("loads");
    assert_eq!(service.bind(&bind).await, Ok(BindDecision::Referred));
    assert_eq!(harness.quotes.get(QuoteId(82)).expect("row").status, AggregatedStatus::Quoted);
    assert!(matches!(harness.drain_events().as_slice(), [NotificationEvent::BindReferred(_)]));
}

#[tokio::test]
async fn payment_plan_must_exist_and_meet_threshold() {
    let harness = HarnessBuilder::new().build();
    harness.quotes.insert(record(83, AggregatedStatus::Quoted, false));
    let service = BindService::new(harness.deps.clone());

    assert!(matches!(
        service.load_quote_for_bind(QuoteId(83), PaymentPlanId(99)).await,
        Err(EngineError::Domain(DomainError::Validation(_)))
    ));
    let error = service
        .load_quote_for_bind(QuoteId(83), PaymentPlanId(2))
        .await
        .expect_err("3400 is below the monthly threshold");
    assert!(error.to_string().contains("Monthly"));
    assert!(matches!(
        service.load_quote_for_bind(QuoteId(404), PaymentPlanId(1)).await,
        Err(EngineError::Domain(DomainError::Validation(_)))
    ));
}
