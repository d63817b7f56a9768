use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    audit,
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{Role, User, STATUS_APPROVED, STATUS_PENDING},
    schema::users,
    state::AppState,
};

#[derive(Serialize)]
pub struct UserInfo {
    pub id: String,
    pub fullname: String,
    pub department: String,
    pub section: String,
    pub role: String,
    pub status: String,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            department: user.department,
            section: user.section,
            role: user.role,
            status: user.status,
        }
    }
}

#[derive(Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// Approved users, ordered by fullname. This is the pool of assignable
/// project members.
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserInfo>>> {
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table
        .filter(users::status.eq(STATUS_APPROVED))
        .order(users::fullname.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserInfo::from).collect()))
}

pub async fn list_pending_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserInfo>>> {
    user.require_admin_or_manager()?;
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table
        .filter(users::status.eq(STATUS_PENDING))
        .order(users::fullname.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserInfo::from).collect()))
}

pub async fn approve_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(target_id): Path<String>,
) -> AppResult<StatusCode> {
    user.require_admin_or_manager()?;
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let updated = diesel::update(users::table.find(&target_id))
            .set(users::status.eq(STATUS_APPROVED))
            .execute(conn)?;
        if updated == 0 {
            return Err(AppError::not_found());
        }

        audit::record(
            conn,
            Some(&user.user_id),
            "Approve User",
            format!("user '{target_id}' approved"),
        );
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(target_id): Path<String>,
    Json(payload): Json<ChangeRoleRequest>,
) -> AppResult<StatusCode> {
    user.require_admin_or_manager()?;
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let updated = diesel::update(users::table.find(&target_id))
            .set(users::role.eq(payload.role.as_str()))
            .execute(conn)?;
        if updated == 0 {
            return Err(AppError::not_found());
        }

        audit::record(
            conn,
            Some(&user.user_id),
            "Change User Role",
            format!("role of user '{target_id}' changed to '{}'", payload.role),
        );
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(target_id): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    user.require_admin_or_manager()?;
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password must not be empty"));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let updated = diesel::update(users::table.find(&target_id))
            .set(users::password_hash.eq(password_hash))
            .execute(conn)?;
        if updated == 0 {
            return Err(AppError::not_found());
        }

        audit::record(
            conn,
            Some(&user.user_id),
            "Reset Password",
            format!("password for user '{target_id}' was reset"),
        );
        Ok(())
    })?;

    Ok(StatusCode::NO_CONTENT)
}
