//! JSON API.
//!
//! - `POST /v1/applications` validates synchronously and quotes in a detached task
//! - `POST /v1/quotes/{quote_id}/bind` binds a recorded quote with a payment plan

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use coverquote_core::{
    Application, ApplicationPayload, BindService, InterfaceError, PaymentPlanId,
    QuoteOrchestrator, QuoteId,
};
use coverquote_db::repositories::SqlApplicationStore;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: QuoteOrchestrator,
    pub binds: BindService,
    pub applications: Arc<SqlApplicationStore>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitQuery {
    /// Comma-separated insurer slugs to restrict quoting to.
    pub insurers: Option<String>,
}

impl SubmitQuery {
    fn requested_insurers(&self) -> Option<Vec<String>> {
        let slugs: Vec<String> = self
            .insurers
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_owned)
            .collect();
        (!slugs.is_empty()).then_some(slugs)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub token: String,
    pub application_id: u64,
    pub correlation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub payment_plan_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BindResponse {
    pub result: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub struct ApiError(pub InterfaceError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(
                event_name = "api.request.failed",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request failed"
            );
        } else {
            info!(
                event_name = "api.request.rejected",
                correlation_id = %self.0.correlation_id(),
                status = status.as_u16(),
                error = %self.0,
                "request rejected"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_owned(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/applications", post(submit_application))
        .route("/v1/quotes/{quote_id}/bind", post(bind_quote))
        .with_state(state)
}

pub async fn submit_application(
    State(state): State<ApiState>,
    Query(query): Query<SubmitQuery>,
    Json(payload): Json<ApplicationPayload>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mut app = state.orchestrator.load(payload);
    let correlation_id = app.correlation_id.clone();
    let requested = query.requested_insurers();

    state
        .orchestrator
        .validate(&mut app, requested.as_deref())
        .await
        .map_err(|error| ApiError(error.into_interface(&correlation_id)))?;

    if !app.test {
        if let Err(error) = state.applications.register(app.id, app.agency_location_id).await {
            warn!(
                event_name = "api.application.register_failed",
                correlation_id = %correlation_id,
                application_id = %app.id,
                error = %error,
                "could not register application row; state transitions will be skipped"
            );
        }
    }

    let response = SubmitResponse {
        token: Uuid::new_v4().to_string(),
        application_id: app.id.0,
        correlation_id,
    };
    tokio::spawn(quote_in_background(state.orchestrator.clone(), app));

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn quote_in_background(orchestrator: QuoteOrchestrator, app: Application) {
    let result = if app.test {
        orchestrator.run_test(&app).await
    } else {
        orchestrator.run_quotes(&app).await
    };
    match result {
        Ok(report) => info!(
            event_name = "api.quoting.finished",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            outcomes = report.outcomes.len(),
            state = report.state.as_str(),
            "background quoting finished"
        ),
        Err(error) => warn!(
            event_name = "api.quoting.failed",
            correlation_id = %app.correlation_id,
            application_id = %app.id,
            error = %error,
            "background quoting produced no quotes"
        ),
    }
}

pub async fn bind_quote(
    State(state): State<ApiState>,
    Path(quote_id): Path<u64>,
    Json(body): Json<BindRequest>,
) -> Result<Json<BindResponse>, ApiError> {
    let correlation_id = Uuid::new_v4().to_string();
    let interface =
        |error: coverquote_core::EngineError| ApiError(error.into_interface(&correlation_id));

    let bind = state
        .binds
        .load_quote_for_bind(QuoteId(quote_id), PaymentPlanId(body.payment_plan_id))
        .await
        .map_err(interface)?;
    let decision = state.binds.bind(&bind).await.map_err(interface)?;

    Ok(Json(BindResponse { result: decision.as_str().to_owned() }))
}
