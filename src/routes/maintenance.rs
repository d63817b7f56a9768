use axum::extract::State;
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    audit,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    schema::{direct_messages, documents, project_members, project_messages, projects, tasks, users},
    state::AppState,
};

#[derive(Serialize, Default)]
pub struct CleanupReport {
    pub members_removed: usize,
    pub tasks_removed: usize,
    pub messages_removed: usize,
    pub documents_removed: usize,
    pub direct_messages_removed: usize,
}

/// Removes rows whose parent project, task or user no longer exists.
/// Foreign keys keep new data consistent; this sweeps up anything that
/// predates them or slipped past. Failures are logged and reported as a
/// zero-count sweep, never as an error.
pub async fn cleanup_orphans(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<CleanupReport>> {
    user.require_admin()?;
    let mut conn = state.db()?;

    let result = conn.transaction::<CleanupReport, AppError, _>(|conn| {
        let members_removed = diesel::delete(project_members::table.filter(
            project_members::project_id.ne_all(projects::table.select(projects::id)),
        ))
        .execute(conn)?;

        let tasks_removed = diesel::delete(
            tasks::table.filter(tasks::project_id.ne_all(projects::table.select(projects::id))),
        )
        .execute(conn)?;

        let messages_removed = diesel::delete(project_messages::table.filter(
            project_messages::project_id.ne_all(projects::table.select(projects::id)),
        ))
        .execute(conn)?;

        let documents_removed = diesel::delete(
            documents::table.filter(documents::task_id.ne_all(tasks::table.select(tasks::id))),
        )
        .execute(conn)?;

        let direct_messages_removed = diesel::delete(
            direct_messages::table.filter(
                direct_messages::sender_id
                    .ne_all(users::table.select(users::id))
                    .or(direct_messages::receiver_id.ne_all(users::table.select(users::id))),
            ),
        )
        .execute(conn)?;

        let report = CleanupReport {
            members_removed,
            tasks_removed,
            messages_removed,
            documents_removed,
            direct_messages_removed,
        };

        audit::record(
            conn,
            Some(&user.user_id),
            "Cleanup Orphan Data",
            format!(
                "removed {} members, {} tasks, {} messages, {} documents, {} direct messages",
                report.members_removed,
                report.tasks_removed,
                report.messages_removed,
                report.documents_removed,
                report.direct_messages_removed
            ),
        );
        Ok(report)
    });

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            warn!(error = ?err, "orphan cleanup failed, reporting empty sweep");
            CleanupReport::default()
        }
    };

    info!(
        members = report.members_removed,
        tasks = report.tasks_removed,
        messages = report.messages_removed,
        documents = report.documents_removed,
        direct = report.direct_messages_removed,
        "orphan cleanup finished"
    );
    Ok(Json(report))
}
