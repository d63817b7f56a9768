use axum::extract::State;
use axum::Json;
use chrono::{Datelike, Months, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::TaskStatus,
    schema::{projects, tasks},
    state::AppState,
};

#[derive(Serialize)]
pub struct SummaryMetric {
    pub total: i64,
    pub this_month: i64,
    pub delta: i64,
}

#[derive(Serialize)]
pub struct SummaryReport {
    pub projects: SummaryMetric,
    pub tasks: SummaryMetric,
    pub done_tasks: SummaryMetric,
}

/// Start of the current and previous calendar month, as timestamps.
fn month_boundaries() -> AppResult<(NaiveDateTime, NaiveDateTime)> {
    let today = Utc::now().date_naive();
    let this_month = today
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| AppError::internal("failed to compute month start"))?;
    let last_month = this_month
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| AppError::internal("failed to compute previous month"))?;
    Ok((this_month, last_month))
}

fn metric(total: i64, this_month: i64, last_month: i64) -> SummaryMetric {
    SummaryMetric {
        total,
        this_month,
        delta: this_month - last_month,
    }
}

/// Dashboard counters with month-over-month movement for projects, tasks
/// and completed tasks.
pub async fn summary(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<SummaryReport>> {
    let mut conn = state.db()?;
    let (this_month, last_month) = month_boundaries()?;

    let projects_total: i64 = projects::table.count().get_result(&mut conn)?;
    let projects_this: i64 = projects::table
        .filter(projects::created_at.ge(this_month))
        .count()
        .get_result(&mut conn)?;
    let projects_last: i64 = projects::table
        .filter(projects::created_at.ge(last_month))
        .filter(projects::created_at.lt(this_month))
        .count()
        .get_result(&mut conn)?;

    let tasks_total: i64 = tasks::table.count().get_result(&mut conn)?;
    let tasks_this: i64 = tasks::table
        .filter(tasks::created_at.ge(this_month))
        .count()
        .get_result(&mut conn)?;
    let tasks_last: i64 = tasks::table
        .filter(tasks::created_at.ge(last_month))
        .filter(tasks::created_at.lt(this_month))
        .count()
        .get_result(&mut conn)?;

    let done_total: i64 = tasks::table
        .filter(tasks::status.eq(TaskStatus::Done.as_str()))
        .count()
        .get_result(&mut conn)?;
    let done_this: i64 = tasks::table
        .filter(tasks::status.eq(TaskStatus::Done.as_str()))
        .filter(tasks::completed_at.ge(this_month))
        .count()
        .get_result(&mut conn)?;
    let done_last: i64 = tasks::table
        .filter(tasks::status.eq(TaskStatus::Done.as_str()))
        .filter(tasks::completed_at.ge(last_month))
        .filter(tasks::completed_at.lt(this_month))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(SummaryReport {
        projects: metric(projects_total, projects_this, projects_last),
        tasks: metric(tasks_total, tasks_this, tasks_last),
        done_tasks: metric(done_total, done_this, done_last),
    }))
}
