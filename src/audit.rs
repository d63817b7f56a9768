use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::AppResult;
use crate::models::{AuditEntry, NewAuditEntry};
use crate::schema::audit_log;

/// Appends an audit entry on the caller's connection. Best-effort: a failed
/// insert is logged and swallowed so the primary operation never fails on
/// account of its audit record.
pub fn record(conn: &mut SqliteConnection, actor: Option<&str>, action: &str, detail: String) {
    let entry = NewAuditEntry {
        occurred_at: Utc::now().naive_utc(),
        user_id: actor.map(str::to_owned),
        action: action.to_owned(),
        detail,
    };

    if let Err(err) = diesel::insert_into(audit_log::table)
        .values(&entry)
        .execute(conn)
    {
        tracing::warn!(error = %err, action, "failed to record audit entry");
    }
}

pub fn recent(conn: &mut SqliteConnection, limit: i64) -> AppResult<Vec<AuditEntry>> {
    let entries = audit_log::table
        .order((audit_log::occurred_at.desc(), audit_log::id.desc()))
        .limit(limit)
        .load(conn)?;
    Ok(entries)
}

pub fn all(conn: &mut SqliteConnection) -> AppResult<Vec<AuditEntry>> {
    let entries = audit_log::table
        .order((audit_log::occurred_at.desc(), audit_log::id.desc()))
        .load(conn)?;
    Ok(entries)
}
