use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    audit,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{Document, NewDocument, Task, TaskStatus},
    schema::{documents, tasks},
    state::AppState,
};

use super::to_iso;

#[derive(Serialize)]
pub struct DocumentView {
    pub id: i32,
    pub task_id: i32,
    pub filename: String,
    pub storage_key: String,
    pub revision_of: Option<i32>,
    pub notes: Option<String>,
    pub uploaded_at: String,
}

#[derive(Serialize)]
pub struct DocumentUploadResponse {
    pub document: DocumentView,
    pub task_status: String,
}

pub(super) fn document_view(doc: Document) -> DocumentView {
    DocumentView {
        id: doc.id,
        task_id: doc.task_id,
        filename: doc.filename,
        storage_key: doc.storage_key,
        revision_of: doc.revision_of,
        notes: doc.notes,
        uploaded_at: to_iso(doc.uploaded_at),
    }
}

/// Uploading a document is the approval request: the new row links to the
/// task's previous latest document and the task is forced to
/// Pending Approval, both in one transaction.
pub async fn upload_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(task_id): Path<i32>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DocumentUploadResponse>)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut original_name: Option<String> = None;
    let mut notes: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                original_name = field.file_name().map(|n| n.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(format!("failed to read file bytes: {err}"))
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("notes") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid notes: {err}")))?;
                if !value.trim().is_empty() {
                    notes = Some(value);
                }
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    if file_bytes.is_empty() {
        return Err(AppError::bad_request("file field must not be empty"));
    }
    let original_name =
        original_name.ok_or_else(|| AppError::bad_request("filename is required"))?;

    {
        let mut conn = state.db()?;
        let task: Task = tasks::table.find(task_id).first(&mut conn)?;
        if task.pic_id != user.user_id {
            return Err(AppError::forbidden("only the assignee may upload documents"));
        }
        if !task.status().accepts_upload() {
            return Err(AppError::conflict("completed tasks cannot accept uploads"));
        }
    }

    let storage_key = state
        .storage
        .put(file_bytes, &original_name)
        .await
        .map_err(AppError::internal)?;

    let mut conn = state.db()?;
    let result = conn.transaction::<Document, AppError, _>(|conn| {
        // Re-check under the transaction; the pre-check only keeps obviously
        // bad uploads out of the blob store.
        let task: Task = tasks::table.find(task_id).first(conn)?;
        if !task.status().accepts_upload() {
            return Err(AppError::conflict("completed tasks cannot accept uploads"));
        }

        // Link to the most recent document so the revision chain never
        // branches.
        let previous: Option<i32> = documents::table
            .filter(documents::task_id.eq(task_id))
            .order(documents::id.desc())
            .select(documents::id)
            .first(conn)
            .optional()?;

        let new_document = NewDocument {
            task_id,
            filename: original_name.clone(),
            storage_key: storage_key.clone(),
            revision_of: previous,
            notes: notes.clone(),
            uploaded_at: Utc::now().naive_utc(),
        };
        let document_id: i32 = diesel::insert_into(documents::table)
            .values(&new_document)
            .returning(documents::id)
            .get_result(conn)?;

        diesel::update(tasks::table.find(task_id))
            .set(tasks::status.eq(TaskStatus::PendingApproval.as_str()))
            .execute(conn)?;

        audit::record(
            conn,
            Some(&user.user_id),
            "Upload Document & Request Approval",
            format!("document '{original_name}' uploaded, approval requested for task {task_id}"),
        );

        documents::table
            .find(document_id)
            .first(conn)
            .map_err(AppError::from)
    });

    let document = match result {
        Ok(document) => document,
        Err(err) => {
            // Nothing was committed; drop the stray blob too.
            let _ = state.storage.delete(&storage_key).await;
            return Err(err);
        }
    };

    info!(task_id, document_id = document.id, "document uploaded");
    Ok((
        StatusCode::CREATED,
        Json(DocumentUploadResponse {
            document: document_view(document),
            task_status: TaskStatus::PendingApproval.as_str().to_owned(),
        }),
    ))
}

/// Documents for a task, oldest first. Following `revision_of` walks the
/// chain newest to oldest.
pub async fn list_documents(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(task_id): Path<i32>,
) -> AppResult<Json<Vec<DocumentView>>> {
    let mut conn = state.db()?;

    tasks::table.find(task_id).first::<Task>(&mut conn)?;

    let docs: Vec<Document> = documents::table
        .filter(documents::task_id.eq(task_id))
        .order(documents::id.asc())
        .load(&mut conn)?;

    Ok(Json(docs.into_iter().map(document_view).collect()))
}

pub async fn download_document(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(document_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let document: Document = documents::table.find(document_id).first(&mut conn)?;
    drop(conn);

    let bytes = state
        .storage
        .get(&document.storage_key)
        .await
        .map_err(|_| AppError::not_found())?;

    let content_type = mime_guess::from_path(&document.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.filename.replace(['"', '\\'], "_")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
