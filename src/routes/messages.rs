use std::collections::{BTreeMap, BTreeSet};

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;

use crate::{
    attachment::{self, Attachment},
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{DirectMessage, NewDirectMessage, NewProjectMessage, ProjectMessage, User},
    schema::{direct_messages, project_messages, projects, users},
    state::AppState,
};

use super::to_iso;

#[derive(Serialize)]
pub struct MessageView {
    pub id: i32,
    pub sender_id: String,
    pub text: String,
    pub attachment: Option<Attachment>,
    pub sent_at: String,
    pub is_read: bool,
}

#[derive(Serialize)]
pub struct DirectMessageView {
    pub id: i32,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub attachment: Option<Attachment>,
    pub sent_at: String,
    pub is_read: bool,
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Serialize)]
pub struct PartnerInfo {
    pub id: String,
    pub fullname: String,
}

pub(super) fn message_view(msg: ProjectMessage) -> MessageView {
    let (text, attachment) = attachment::parse(&msg.body);
    MessageView {
        id: msg.id,
        sender_id: msg.sender_id,
        text,
        attachment,
        sent_at: to_iso(msg.sent_at),
        is_read: msg.is_read,
    }
}

fn direct_message_view(msg: DirectMessage) -> DirectMessageView {
    let (text, attachment) = attachment::parse(&msg.body);
    DirectMessageView {
        id: msg.id,
        sender_id: msg.sender_id,
        receiver_id: msg.receiver_id,
        text,
        attachment,
        sent_at: to_iso(msg.sent_at),
        is_read: msg.is_read,
    }
}

/// Reads the `text` field and optional `file` field of a chat message and
/// returns the encoded body. Image parts become inline images, everything
/// else a named file attachment.
async fn read_message_parts(
    state: &AppState,
    mut multipart: Multipart,
) -> AppResult<String> {
    let mut text = String::new();
    let mut attachment: Option<Attachment> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("text") => {
                text = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid text: {err}")))?;
            }
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(|n| n.to_string())
                    .ok_or_else(|| AppError::bad_request("attachment filename is required"))?;
                let is_image = field
                    .content_type()
                    .map(|ct| ct.starts_with("image/"))
                    .unwrap_or(false);
                let data = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read attachment: {err}"))
                })?;
                if data.is_empty() {
                    return Err(AppError::bad_request("attachment must not be empty"));
                }

                let key = state
                    .storage
                    .put(data.to_vec(), &filename)
                    .await
                    .map_err(AppError::internal)?;
                attachment = Some(if is_image {
                    Attachment::Image { path: key }
                } else {
                    Attachment::File {
                        path: key,
                        filename,
                    }
                });
            }
            _ => {}
        }
    }

    let text = text.trim().to_owned();
    if text.is_empty() && attachment.is_none() {
        return Err(AppError::bad_request(
            "message needs text or an attachment",
        ));
    }
    Ok(attachment::encode(&text, attachment.as_ref()))
}

pub async fn list_project_messages(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(project_id): Path<i32>,
) -> AppResult<Json<Vec<MessageView>>> {
    let mut conn = state.db()?;

    projects::table
        .find(project_id)
        .select(projects::id)
        .first::<i32>(&mut conn)?;

    let rows: Vec<ProjectMessage> = project_messages::table
        .filter(project_messages::project_id.eq(project_id))
        .order((project_messages::sent_at.asc(), project_messages::id.asc()))
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(message_view).collect()))
}

pub async fn send_project_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MessageView>)> {
    let body = read_message_parts(&state, multipart).await?;
    let mut conn = state.db()?;

    projects::table
        .find(project_id)
        .select(projects::id)
        .first::<i32>(&mut conn)?;

    let new_message = NewProjectMessage {
        project_id,
        sender_id: user.user_id,
        body,
        sent_at: Utc::now().naive_utc(),
        is_read: false,
    };
    let message: ProjectMessage = diesel::insert_into(project_messages::table)
        .values(&new_message)
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(message_view(message))))
}

/// Marks every message in the room not sent by the caller as read. The
/// read flag is shared, so the count is per room, not per reader.
pub async fn mark_project_messages_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    projects::table
        .find(project_id)
        .select(projects::id)
        .first::<i32>(&mut conn)?;

    diesel::update(
        project_messages::table
            .filter(project_messages::project_id.eq(project_id))
            .filter(project_messages::sender_id.ne(&user.user_id)),
    )
    .set(project_messages::is_read.eq(true))
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn unread_project_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(project_id): Path<i32>,
) -> AppResult<Json<UnreadCount>> {
    let mut conn = state.db()?;

    projects::table
        .find(project_id)
        .select(projects::id)
        .first::<i32>(&mut conn)?;

    let unread: i64 = project_messages::table
        .filter(project_messages::project_id.eq(project_id))
        .filter(project_messages::sender_id.ne(&user.user_id))
        .filter(project_messages::is_read.eq(false))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(UnreadCount { unread }))
}

/// Both directions of the conversation with `peer`, oldest first.
pub async fn list_direct_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(peer): Path<String>,
) -> AppResult<Json<Vec<DirectMessageView>>> {
    let mut conn = state.db()?;

    let rows: Vec<DirectMessage> = direct_messages::table
        .filter(
            direct_messages::sender_id
                .eq(&user.user_id)
                .and(direct_messages::receiver_id.eq(&peer))
                .or(direct_messages::sender_id
                    .eq(&peer)
                    .and(direct_messages::receiver_id.eq(&user.user_id))),
        )
        .order((direct_messages::sent_at.asc(), direct_messages::id.asc()))
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(direct_message_view).collect()))
}

pub async fn send_direct_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(peer): Path<String>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DirectMessageView>)> {
    let body = read_message_parts(&state, multipart).await?;
    let mut conn = state.db()?;

    users::table
        .find(&peer)
        .select(users::id)
        .first::<String>(&mut conn)?;

    let new_message = NewDirectMessage {
        sender_id: user.user_id,
        receiver_id: peer,
        body,
        sent_at: Utc::now().naive_utc(),
        is_read: false,
    };
    let message: DirectMessage = diesel::insert_into(direct_messages::table)
        .values(&new_message)
        .get_result(&mut conn)?;

    Ok((StatusCode::CREATED, Json(direct_message_view(message))))
}

pub async fn mark_direct_messages_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(peer): Path<String>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    diesel::update(
        direct_messages::table
            .filter(direct_messages::sender_id.eq(&peer))
            .filter(direct_messages::receiver_id.eq(&user.user_id)),
    )
    .set(direct_messages::is_read.eq(true))
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Unread counts keyed by sender, for the inbox badge.
pub async fn unread_direct_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<BTreeMap<String, i64>>> {
    let mut conn = state.db()?;

    let rows: Vec<(String, i64)> = direct_messages::table
        .filter(direct_messages::receiver_id.eq(&user.user_id))
        .filter(direct_messages::is_read.eq(false))
        .group_by(direct_messages::sender_id)
        .select((direct_messages::sender_id, diesel::dsl::count_star()))
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().collect()))
}

/// Everyone the caller has exchanged a direct message with.
pub async fn direct_partners(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<PartnerInfo>>> {
    let mut conn = state.db()?;

    let sent_to: Vec<String> = direct_messages::table
        .filter(direct_messages::sender_id.eq(&user.user_id))
        .select(direct_messages::receiver_id)
        .distinct()
        .load(&mut conn)?;
    let received_from: Vec<String> = direct_messages::table
        .filter(direct_messages::receiver_id.eq(&user.user_id))
        .select(direct_messages::sender_id)
        .distinct()
        .load(&mut conn)?;

    let partner_ids: BTreeSet<String> =
        sent_to.into_iter().chain(received_from).collect();

    let partners: Vec<PartnerInfo> = users::table
        .filter(users::id.eq_any(&partner_ids))
        .order(users::fullname.asc())
        .load::<User>(&mut conn)?
        .into_iter()
        .map(|u| PartnerInfo {
            id: u.id,
            fullname: u.fullname,
        })
        .collect();

    Ok(Json(partners))
}
