use std::collections::{BTreeSet, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audit,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Document, NewProject, Project, ProjectMember, ProjectMessage, Task, User},
    schema::{documents, project_members, project_messages, projects, tasks, users},
    state::AppState,
};

use super::documents::{document_view, DocumentView};
use super::messages::{message_view, MessageView};
use super::tasks::{task_view, TaskView};
use super::to_iso;

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

/// Edits replace every scalar field and the whole member set; there is no
/// partial patch.
#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ProjectListQuery {
    pub search: Option<String>,
    pub creator: Option<String>,
}

#[derive(Serialize)]
pub struct ProjectCreatedResponse {
    pub id: i32,
}

#[derive(Serialize)]
pub struct ProjectSummary {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub part_name: String,
    pub part_number: String,
    pub customer: String,
    pub model: String,
    pub creator_id: String,
    pub creator_name: String,
    pub created_at: String,
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct MemberInfo {
    pub id: String,
    pub fullname: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: TaskView,
    pub documents: Vec<DocumentView>,
}

#[derive(Serialize)]
pub struct ProjectDetailResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub part_name: String,
    pub part_number: String,
    pub customer: String,
    pub model: String,
    pub creator_id: String,
    pub created_at: String,
    pub members: Vec<MemberInfo>,
    pub tasks: Vec<TaskDetail>,
    pub messages: Vec<MessageView>,
}

pub async fn create_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<ProjectCreatedResponse>)> {
    let name = payload.name.trim().to_owned();
    if name.is_empty() {
        return Err(AppError::bad_request("project name must not be empty"));
    }

    // The creator is always a member; duplicates in the request collapse.
    let mut member_ids: BTreeSet<String> = payload.member_ids.into_iter().collect();
    member_ids.insert(user.user_id.clone());

    let mut conn = state.db()?;

    let project_id = conn.transaction::<i32, AppError, _>(|conn| {
        let known: i64 = users::table
            .filter(users::id.eq_any(&member_ids))
            .count()
            .get_result(conn)?;
        if known != member_ids.len() as i64 {
            return Err(AppError::bad_request("member list contains unknown users"));
        }

        let new_project = NewProject {
            name: name.clone(),
            description: payload.description,
            part_name: payload.part_name,
            part_number: payload.part_number,
            customer: payload.customer,
            model: payload.model,
            creator_id: user.user_id.clone(),
            created_at: Utc::now().naive_utc(),
        };
        let project_id: i32 = diesel::insert_into(projects::table)
            .values(&new_project)
            .returning(projects::id)
            .get_result(conn)?;

        let rows: Vec<ProjectMember> = member_ids
            .iter()
            .map(|member_id| ProjectMember {
                project_id,
                user_id: member_id.clone(),
            })
            .collect();
        diesel::insert_into(project_members::table)
            .values(&rows)
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Create Project",
            format!("project '{name}' (id {project_id}) created"),
        );
        Ok(project_id)
    })?;

    info!(project_id, "project created");
    Ok((
        StatusCode::CREATED,
        Json(ProjectCreatedResponse { id: project_id }),
    ))
}

/// Admins and Managers see every project; everyone else sees only projects
/// they belong to. Search is a substring match over name and part fields.
pub async fn list_projects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ProjectListQuery>,
) -> AppResult<Json<Vec<ProjectSummary>>> {
    let mut conn = state.db()?;

    let mut projects_query = projects::table.into_boxed();

    if !user.role.is_admin_or_manager() {
        let member_of = project_members::table
            .filter(project_members::user_id.eq(user.user_id.clone()))
            .select(project_members::project_id);
        projects_query = projects_query.filter(projects::id.eq_any(member_of));
    }

    if let Some(search) = query.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            let pattern = format!("%{search}%");
            projects_query = projects_query.filter(
                projects::name
                    .like(pattern.clone())
                    .or(projects::part_name.like(pattern.clone()))
                    .or(projects::part_number.like(pattern)),
            );
        }
    }

    if let Some(creator) = query.creator.as_deref().map(str::trim) {
        if !creator.is_empty() {
            projects_query = projects_query.filter(projects::creator_id.eq(creator.to_owned()));
        }
    }

    let rows: Vec<Project> = projects_query.order(projects::id.desc()).load(&mut conn)?;

    let creator_ids: BTreeSet<String> = rows.iter().map(|p| p.creator_id.clone()).collect();
    let creator_names: HashMap<String, String> = users::table
        .filter(users::id.eq_any(&creator_ids))
        .select((users::id, users::fullname))
        .load::<(String, String)>(&mut conn)?
        .into_iter()
        .collect();

    let mut summaries = Vec::with_capacity(rows.len());
    for project in rows {
        let unread_count: i64 = project_messages::table
            .filter(project_messages::project_id.eq(project.id))
            .filter(project_messages::sender_id.ne(&user.user_id))
            .filter(project_messages::is_read.eq(false))
            .count()
            .get_result(&mut conn)?;

        let creator_name = creator_names
            .get(&project.creator_id)
            .cloned()
            .unwrap_or_default();

        summaries.push(ProjectSummary {
            id: project.id,
            name: project.name,
            description: project.description,
            part_name: project.part_name,
            part_number: project.part_number,
            customer: project.customer,
            model: project.model,
            creator_id: project.creator_id,
            creator_name,
            created_at: to_iso(project.created_at),
            unread_count,
        });
    }

    Ok(Json(summaries))
}

pub async fn get_project(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(project_id): Path<i32>,
) -> AppResult<Json<ProjectDetailResponse>> {
    let mut conn = state.db()?;

    let project: Project = projects::table.find(project_id).first(&mut conn)?;

    let members: Vec<MemberInfo> = project_members::table
        .inner_join(users::table)
        .filter(project_members::project_id.eq(project_id))
        .filter(users::status.eq(crate::models::STATUS_APPROVED))
        .order(users::fullname.asc())
        .select(users::all_columns)
        .load::<User>(&mut conn)?
        .into_iter()
        .map(|member| MemberInfo {
            id: member.id,
            fullname: member.fullname,
            role: member.role,
        })
        .collect();

    let task_rows: Vec<Task> = tasks::table
        .filter(tasks::project_id.eq(project_id))
        .order(tasks::id.asc())
        .load(&mut conn)?;

    let mut task_details = Vec::with_capacity(task_rows.len());
    for task in task_rows {
        let docs: Vec<Document> = documents::table
            .filter(documents::task_id.eq(task.id))
            .order(documents::id.asc())
            .load(&mut conn)?;
        task_details.push(TaskDetail {
            task: task_view(task),
            documents: docs.into_iter().map(document_view).collect(),
        });
    }

    let messages: Vec<MessageView> = project_messages::table
        .filter(project_messages::project_id.eq(project_id))
        .order((project_messages::sent_at.asc(), project_messages::id.asc()))
        .load::<ProjectMessage>(&mut conn)?
        .into_iter()
        .map(message_view)
        .collect();

    Ok(Json(ProjectDetailResponse {
        id: project.id,
        name: project.name,
        description: project.description,
        part_name: project.part_name,
        part_number: project.part_number,
        customer: project.customer,
        model: project.model,
        creator_id: project.creator_id,
        created_at: to_iso(project.created_at),
        members,
        tasks: task_details,
        messages,
    }))
}

/// Any authenticated user may edit; only deletion is creator-gated. The
/// member set is replaced wholesale, so concurrent editors are
/// last-writer-wins.
pub async fn update_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
    Json(payload): Json<UpdateProjectRequest>,
) -> AppResult<StatusCode> {
    let name = payload.name.trim().to_owned();
    if name.is_empty() {
        return Err(AppError::bad_request("project name must not be empty"));
    }

    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let project: Project = projects::table.find(project_id).first(conn)?;

        let mut member_ids: BTreeSet<String> = payload.member_ids.iter().cloned().collect();
        member_ids.insert(project.creator_id.clone());

        let known: i64 = users::table
            .filter(users::id.eq_any(&member_ids))
            .count()
            .get_result(conn)?;
        if known != member_ids.len() as i64 {
            return Err(AppError::bad_request("member list contains unknown users"));
        }

        diesel::update(projects::table.find(project_id))
            .set((
                projects::name.eq(&name),
                projects::description.eq(&payload.description),
                projects::part_name.eq(&payload.part_name),
                projects::part_number.eq(&payload.part_number),
                projects::customer.eq(&payload.customer),
                projects::model.eq(&payload.model),
            ))
            .execute(conn)?;

        diesel::delete(
            project_members::table.filter(project_members::project_id.eq(project_id)),
        )
        .execute(conn)?;
        let rows: Vec<ProjectMember> = member_ids
            .iter()
            .map(|member_id| ProjectMember {
                project_id,
                user_id: member_id.clone(),
            })
            .collect();
        diesel::insert_into(project_members::table)
            .values(&rows)
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Edit Project",
            format!("project '{name}' (id {project_id}) edited"),
        );
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let project: Project = projects::table.find(project_id).first(conn)?;
        if project.creator_id != user.user_id {
            return Err(AppError::forbidden(
                "only the project creator may delete it",
            ));
        }

        // Members, tasks (and their documents) and chat go with the project.
        diesel::delete(projects::table.find(project_id)).execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Delete Project",
            format!("project '{}' (id {project_id}) deleted", project.name),
        );
        Ok(())
    })?;

    info!(project_id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}
