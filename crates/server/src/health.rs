use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use coverquote_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    /// Whether any carrier adapter was registered at bootstrap.
    pub carriers_registered: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub carriers: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness follows the database only. Missing carriers are reported but do not
/// take the service out of rotation: applications still validate.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let carriers = if state.carriers_registered {
        HealthCheck { status: "ready", detail: "carrier integrations registered".to_string() }
    } else {
        HealthCheck { status: "idle", detail: "no carrier integrations registered".to_string() }
    };

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        carriers,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM agency_location").fetch_one(pool).await
    {
        Ok(count) => HealthCheck {
            status: "ready",
            detail: format!("{count} agency locations configured"),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{extract::State, Json};
    use coverquote_db::{connect_with_settings, migrations};
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_is_ready_once_schema_is_migrated() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let response = router(HealthState { db_pool: pool.clone(), carriers_registered: false })
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let (_, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), carriers_registered: false })).await;
        assert_eq!(payload.database.detail, "0 agency locations configured");
        assert_eq!(payload.carriers.status, "idle");

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_is_degraded() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), carriers_registered: true })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.carriers.status, "ready");
    }

    #[tokio::test]
    async fn closed_pool_is_degraded() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, carriers_registered: true })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "degraded");
    }
}
