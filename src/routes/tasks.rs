use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audit,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewTask, Project, Task, TaskStatus, User, STATUS_APPROVED},
    schema::{project_members, projects, tasks, users},
    state::AppState,
};

use super::to_iso;

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub pic_id: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    pub title: String,
    pub pic_id: String,
    pub due_date: NaiveDate,
}

#[derive(Serialize)]
pub struct TaskCreatedResponse {
    pub id: i32,
}

#[derive(Serialize)]
pub struct TaskView {
    pub id: i32,
    pub project_id: i32,
    pub title: String,
    pub pic_id: String,
    pub delegator_id: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub actual_start: Option<String>,
}

#[derive(Serialize)]
pub struct PendingApproval {
    pub task_id: i32,
    pub project_id: i32,
    pub title: String,
    pub pic_id: String,
    pub pic_name: String,
    pub due_date: NaiveDate,
}

pub(super) fn task_view(task: Task) -> TaskView {
    TaskView {
        id: task.id,
        project_id: task.project_id,
        title: task.title,
        pic_id: task.pic_id,
        delegator_id: task.delegator_id,
        due_date: task.due_date,
        status: task.status,
        created_at: to_iso(task.created_at),
        completed_at: task.completed_at.map(to_iso),
        actual_start: task.actual_start.map(to_iso),
    }
}

/// The assignee must be an approved member of the task's project.
fn ensure_assignable(
    conn: &mut SqliteConnection,
    project_id: i32,
    pic_id: &str,
) -> AppResult<()> {
    let approved: Option<User> = users::table
        .find(pic_id)
        .filter(users::status.eq(STATUS_APPROVED))
        .first(conn)
        .optional()?;
    if approved.is_none() {
        return Err(AppError::bad_request(
            "assignee must be an approved user",
        ));
    }

    let is_member: bool = select(exists(
        project_members::table
            .filter(project_members::project_id.eq(project_id))
            .filter(project_members::user_id.eq(pic_id)),
    ))
    .get_result(conn)?;
    if !is_member {
        return Err(AppError::bad_request(
            "assignee must be a member of the project",
        ));
    }
    Ok(())
}

pub async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<TaskCreatedResponse>)> {
    if !user.role.can_delegate() {
        return Err(AppError::forbidden(
            "only Supervisors, Managers and Admins may delegate tasks",
        ));
    }
    let title = payload.title.trim().to_owned();
    if title.is_empty() {
        return Err(AppError::bad_request("task title must not be empty"));
    }

    let mut conn = state.db()?;

    let task_id = conn.transaction::<i32, AppError, _>(|conn| {
        projects::table.find(project_id).first::<Project>(conn)?;

        // Supervisors only delegate inside their own projects; Admins and
        // Managers already see every project.
        if !user.role.is_admin_or_manager() {
            let is_member: bool = select(exists(
                project_members::table
                    .filter(project_members::project_id.eq(project_id))
                    .filter(project_members::user_id.eq(&user.user_id)),
            ))
            .get_result(conn)?;
            if !is_member {
                return Err(AppError::forbidden(
                    "must be a project member to delegate tasks",
                ));
            }
        }

        ensure_assignable(conn, project_id, &payload.pic_id)?;

        let new_task = NewTask {
            project_id,
            title: title.clone(),
            pic_id: payload.pic_id.clone(),
            delegator_id: user.user_id.clone(),
            due_date: payload.due_date,
            status: TaskStatus::Yet.as_str().to_owned(),
            created_at: Utc::now().naive_utc(),
        };
        let task_id: i32 = diesel::insert_into(tasks::table)
            .values(&new_task)
            .returning(tasks::id)
            .get_result(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Create Task",
            format!(
                "task '{title}' (id {task_id}) delegated to '{}'; notes: '{}'",
                payload.pic_id, payload.notes
            ),
        );
        Ok(task_id)
    })?;

    info!(task_id, project_id, "task created");
    Ok((StatusCode::CREATED, Json(TaskCreatedResponse { id: task_id })))
}

/// Only the delegator may edit, and only before the task is Done.
pub async fn update_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<i32>,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<StatusCode> {
    let title = payload.title.trim().to_owned();
    if title.is_empty() {
        return Err(AppError::bad_request("task title must not be empty"));
    }

    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let task: Task = tasks::table.find(task_id).first(conn)?;
        if task.delegator_id != user.user_id {
            return Err(AppError::forbidden("only the delegator may edit a task"));
        }
        if task.status().is_terminal() {
            return Err(AppError::conflict("completed tasks cannot be edited"));
        }

        ensure_assignable(conn, task.project_id, &payload.pic_id)?;

        diesel::update(tasks::table.find(task_id))
            .set((
                tasks::title.eq(&title),
                tasks::pic_id.eq(&payload.pic_id),
                tasks::due_date.eq(payload.due_date),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Edit Task",
            format!("task '{title}' (id {task_id}) edited"),
        );
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Records the actual start of work. Calling it again once a start time
/// exists is a no-op, not an error.
pub async fn start_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<i32>,
) -> AppResult<Json<TaskView>> {
    let mut conn = state.db()?;

    let task = conn.transaction::<Task, AppError, _>(|conn| {
        let task: Task = tasks::table.find(task_id).first(conn)?;
        if task.pic_id != user.user_id {
            return Err(AppError::forbidden("only the assignee may start work"));
        }
        if task.actual_start.is_some() {
            return Ok(task);
        }

        let now = Utc::now().naive_utc();
        diesel::update(tasks::table.find(task_id))
            .set((
                tasks::actual_start.eq(Some(now)),
                tasks::status.eq(TaskStatus::OnProgress.as_str()),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Start Actual Work",
            format!("work on task {task_id} started"),
        );
        tasks::table.find(task_id).first(conn).map_err(AppError::from)
    })?;

    Ok(Json(task_view(task)))
}

/// Sign-off: the delegator, the owning project's creator, or any
/// Admin/Manager may approve a task awaiting approval.
pub async fn approve_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<i32>,
) -> AppResult<Json<TaskView>> {
    let mut conn = state.db()?;

    let task = conn.transaction::<Task, AppError, _>(|conn| {
        let task: Task = tasks::table.find(task_id).first(conn)?;
        let project: Project = projects::table.find(task.project_id).first(conn)?;

        let allowed = task.delegator_id == user.user_id
            || project.creator_id == user.user_id
            || user.role.is_admin_or_manager();
        if !allowed {
            return Err(AppError::forbidden(
                "not authorized to approve this task",
            ));
        }
        if task.status() != TaskStatus::PendingApproval {
            return Err(AppError::conflict("task is not awaiting approval"));
        }

        diesel::update(tasks::table.find(task_id))
            .set((
                tasks::status.eq(TaskStatus::Done.as_str()),
                tasks::completed_at.eq(Some(Utc::now().naive_utc())),
            ))
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Task Approved",
            format!("task {task_id} approved as 'Done'"),
        );
        tasks::table.find(task_id).first(conn).map_err(AppError::from)
    })?;

    info!(task_id, "task approved");
    Ok(Json(task_view(task)))
}

/// Tasks submitted for the caller's sign-off — the notification feed.
pub async fn pending_approvals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<PendingApproval>>> {
    let mut conn = state.db()?;

    let rows: Vec<(Task, String)> = tasks::table
        .inner_join(users::table.on(users::id.eq(tasks::pic_id)))
        .filter(tasks::status.eq(TaskStatus::PendingApproval.as_str()))
        .filter(tasks::delegator_id.eq(&user.user_id))
        .order(tasks::due_date.asc())
        .select((tasks::all_columns, users::fullname))
        .load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(task, pic_name)| PendingApproval {
                task_id: task.id,
                project_id: task.project_id,
                title: task.title,
                pic_id: task.pic_id,
                pic_name,
                due_date: task.due_date,
            })
            .collect(),
    ))
}
