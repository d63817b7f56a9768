use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{
    audit,
    auth::AuthenticatedUser,
    error::AppResult,
    models::AuditEntry,
    state::AppState,
};

use super::to_iso;

#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AuditView {
    pub id: i32,
    pub occurred_at: String,
    pub user_id: Option<String>,
    pub action: String,
    pub detail: String,
}

fn audit_view(entry: AuditEntry) -> AuditView {
    AuditView {
        id: entry.id,
        occurred_at: to_iso(entry.occurred_at),
        user_id: entry.user_id,
        action: entry.action,
        detail: entry.detail,
    }
}

/// Newest entries first. Admins and Managers only.
pub async fn list_audit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditView>>> {
    user.require_admin_or_manager()?;
    let mut conn = state.db()?;

    let entries = match query.limit {
        Some(limit) if limit > 0 => audit::recent(&mut conn, limit)?,
        _ => audit::all(&mut conn)?,
    };

    Ok(Json(entries.into_iter().map(audit_view).collect()))
}
