use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audit,
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, Role, User, STATUS_APPROVED, STATUS_PENDING},
    schema::users,
    state::AppState,
};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub password: String,
    pub fullname: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub section: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Creates a Staff account awaiting approval. Does not log the user in.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<StatusCode> {
    let id = payload.id.trim().to_owned();
    let fullname = payload.fullname.trim().to_owned();
    if id.is_empty() || payload.password.is_empty() || fullname.is_empty() {
        return Err(AppError::bad_request(
            "id, password and fullname are required",
        ));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let mut conn = state.db()?;

    conn.transaction::<_, AppError, _>(|conn| {
        let existing: Option<User> = users::table.find(&id).first(conn).optional()?;
        if existing.is_some() {
            return Err(AppError::conflict("employee id already registered"));
        }

        let new_user = NewUser {
            id: id.clone(),
            password_hash,
            fullname,
            department: payload.department.trim().to_owned(),
            section: payload.section.trim().to_owned(),
            role: Role::Staff.as_str().to_owned(),
            status: STATUS_PENDING.to_owned(),
            created_at: Utc::now().naive_utc(),
        };
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)?;

        audit::record(
            conn,
            Some(&id),
            "User Register",
            format!("user '{id}' registered with role 'Staff' and status 'pending'"),
        );
        Ok(())
    })?;

    info!(user_id = %id, "user registered, awaiting approval");
    Ok(StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let mut conn = state.db()?;

    let user: Option<User> = users::table.find(&payload.id).first(&mut conn).optional()?;
    let user = user.ok_or_else(|| AppError::unauthorized("invalid employee id or password"))?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("invalid employee id or password"))?;
    if !valid {
        return Err(AppError::unauthorized("invalid employee id or password"));
    }

    if user.status != STATUS_APPROVED {
        return Err(AppError::forbidden(
            "account is awaiting Admin/Manager approval",
        ));
    }

    let access_token = state
        .jwt
        .generate_token(&user.id, &user.fullname, user.role())?;

    audit::record(
        &mut conn,
        Some(&user.id),
        "User Login",
        format!("user '{}' logged in", user.id),
    );

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(user: AuthenticatedUser) -> Json<AuthenticatedUser> {
    Json(user)
}
