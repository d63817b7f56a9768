use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::*;

/// User roles, from most to least privileged. Stored as text in the `role`
/// column; `Role::from_str` accepts exactly the stored spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Supervisor => "Supervisor",
            Role::Staff => "Staff",
        }
    }

    /// Admins and Managers administer accounts and see every project.
    pub fn is_admin_or_manager(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }

    /// Roles allowed to delegate tasks within a project.
    pub fn can_delegate(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Supervisor)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "Supervisor" => Ok(Role::Supervisor),
            "Staff" => Ok(Role::Staff),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";

/// Task lifecycle states. The workflow only ever moves forward:
/// Yet -> On Progress -> Pending Approval -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Yet,
    OnProgress,
    PendingApproval,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Yet => "Yet",
            TaskStatus::OnProgress => "On Progress",
            TaskStatus::PendingApproval => "Pending Approval",
            TaskStatus::Done => "Done",
        }
    }

    /// Done is terminal; nothing transitions out of it.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// A document upload requests approval from any non-terminal state.
    pub fn accepts_upload(&self) -> bool {
        !self.is_terminal()
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Yet" => Ok(TaskStatus::Yet),
            "On Progress" => Ok(TaskStatus::OnProgress),
            "Pending Approval" => Ok(TaskStatus::PendingApproval),
            "Done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub password_hash: String,
    pub fullname: String,
    pub department: String,
    pub section: String,
    pub role: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        Role::from_str(&self.role).unwrap_or(Role::Staff)
    }

    pub fn is_approved(&self) -> bool {
        self.status == STATUS_APPROVED
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub password_hash: String,
    pub fullname: String,
    pub department: String,
    pub section: String,
    pub role: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub part_name: String,
    pub part_number: String,
    pub customer: String,
    pub model: String,
    pub creator_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub part_name: String,
    pub part_number: String,
    pub customer: String,
    pub model: String,
    pub creator_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Insertable, Associations)]
#[diesel(table_name = project_members)]
#[diesel(belongs_to(Project))]
#[diesel(primary_key(project_id, user_id))]
pub struct ProjectMember {
    pub project_id: i32,
    pub user_id: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = tasks)]
#[diesel(belongs_to(Project))]
pub struct Task {
    pub id: i32,
    pub project_id: i32,
    pub title: String,
    pub pic_id: String,
    pub delegator_id: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub actual_start: Option<NaiveDateTime>,
}

impl Task {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_str(&self.status).unwrap_or(TaskStatus::Yet)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tasks)]
pub struct NewTask {
    pub project_id: i32,
    pub title: String,
    pub pic_id: String,
    pub delegator_id: String,
    pub due_date: NaiveDate,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = documents)]
#[diesel(belongs_to(Task))]
pub struct Document {
    pub id: i32,
    pub task_id: i32,
    pub filename: String,
    pub storage_key: String,
    pub revision_of: Option<i32>,
    pub notes: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub task_id: i32,
    pub filename: String,
    pub storage_key: String,
    pub revision_of: Option<i32>,
    pub notes: Option<String>,
    pub uploaded_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = project_messages)]
#[diesel(belongs_to(Project))]
pub struct ProjectMessage {
    pub id: i32,
    pub project_id: i32,
    pub sender_id: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub is_read: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = project_messages)]
pub struct NewProjectMessage {
    pub project_id: i32,
    pub sender_id: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub is_read: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = direct_messages)]
pub struct DirectMessage {
    pub id: i32,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub is_read: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = direct_messages)]
pub struct NewDirectMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub sent_at: NaiveDateTime,
    pub is_read: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = audit_log)]
pub struct AuditEntry {
    pub id: i32,
    pub occurred_at: NaiveDateTime,
    pub user_id: Option<String>,
    pub action: String,
    pub detail: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = audit_log)]
pub struct NewAuditEntry {
    pub occurred_at: NaiveDateTime,
    pub user_id: Option<String>,
    pub action: String,
    pub detail: String,
}
