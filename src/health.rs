use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::{db, AppState};

/// Liveness/readiness probe: reports overall status and whether the
/// database answers a ping.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_ok = db::check_connection(&state.db).await.is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
