use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Raised when a stored or transmitted enum label is not one we know.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// --- Identity & Roles ---

/// Role
///
/// The closed set of roles an identity can hold. Fixed when the identity is
/// created and carried verbatim inside every issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

/// Identity
///
/// The login record backing every person. `username` is the person's domain
/// identifier (student number, teacher id, admin id).
#[derive(Clone)]
pub struct Identity {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

// --- People ---

/// StudentStatus
///
/// Progress of a student towards graduation. Written together with graduation
/// request state, never on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StudentStatus {
    #[default]
    Studying,
    PendingGraduation,
    Graduated,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Studying => "studying",
            StudentStatus::PendingGraduation => "pending_graduation",
            StudentStatus::Graduated => "graduated",
        }
    }
}

impl FromStr for StudentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "studying" => Ok(StudentStatus::Studying),
            "pending_graduation" => Ok(StudentStatus::PendingGraduation),
            "graduated" => Ok(StudentStatus::Graduated),
            other => Err(UnknownVariant::new("student status", other)),
        }
    }
}

/// Student
///
/// Student record from the `students` table. Serialized with the field names the
/// portal frontend reads (`StudentID`, `FirstName`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "PascalCase")]
#[ts(export)]
pub struct Student {
    #[serde(rename = "StudentID")]
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(rename = "CurriculumID")]
    pub curriculum_id: Option<String>,
    pub status: StudentStatus,
}

/// Teacher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "PascalCase")]
#[ts(export)]
pub struct Teacher {
    #[serde(rename = "TeacherID")]
    pub teacher_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Option<String>,
}

/// Admin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "PascalCase")]
#[ts(export)]
pub struct Admin {
    #[serde(rename = "AdminID")]
    pub admin_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Profile
///
/// The role-specific payload returned at sign-in and by `GET /me`. Tagged with
/// `role` so clients can branch on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Profile {
    Student(Student),
    Teacher(Teacher),
    Admin(Admin),
}

impl Profile {
    pub fn role(&self) -> Role {
        match self {
            Profile::Student(_) => Role::Student,
            Profile::Teacher(_) => Role::Teacher,
            Profile::Admin(_) => Role::Admin,
        }
    }
}

// --- Catalog ---

/// Curriculum row. Catalog maintenance happens outside this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Curriculum {
    pub curriculum_id: String,
    pub name: String,
}

/// Subject row. Catalog maintenance happens outside this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Subject {
    pub subject_id: String,
    pub name: String,
    pub credit: i32,
}

// --- Registration ---

/// One line of a registration batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EnrollmentEntry {
    pub subject_id: String,
    /// Academic term, e.g. "1/2567".
    pub semester: String,
}

/// Enrollment
///
/// A persisted enrollment row. `(student_id, subject_id, semester)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: String,
    pub subject_id: String,
    pub semester: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Graduation ---

/// GraduationStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum GraduationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl GraduationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraduationStatus::Pending => "pending",
            GraduationStatus::Approved => "approved",
            GraduationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for GraduationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(GraduationStatus::Pending),
            "approved" => Ok(GraduationStatus::Approved),
            "rejected" => Ok(GraduationStatus::Rejected),
            other => Err(UnknownVariant::new("graduation status", other)),
        }
    }
}

/// GraduationRequest
///
/// A student's request to graduate under a curriculum. Status is only changed by an
/// admin decision, and always in the same transaction as the student's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct GraduationRequest {
    pub id: Uuid,
    pub student_id: String,
    pub curriculum_id: String,
    pub status: GraduationStatus,
    pub reject_reason: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// GraduationDecision
///
/// A validated admin decision. Only the two terminal outcomes can be expressed, so
/// a request can never be moved back to pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraduationDecision {
    Approve,
    Reject { reason: Option<String> },
}

impl GraduationDecision {
    /// Status written to the graduation request row.
    pub fn request_status(&self) -> GraduationStatus {
        match self {
            GraduationDecision::Approve => GraduationStatus::Approved,
            GraduationDecision::Reject { .. } => GraduationStatus::Rejected,
        }
    }

    /// Status written to the owning student's row.
    pub fn student_status(&self) -> StudentStatus {
        match self {
            GraduationDecision::Approve => StudentStatus::Graduated,
            GraduationDecision::Reject { .. } => StudentStatus::Studying,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            GraduationDecision::Approve => None,
            GraduationDecision::Reject { reason } => reason.as_deref(),
        }
    }
}

// --- Reports ---

/// Attachment metadata. The file itself lives in external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Attachment {
    pub id: Uuid,
    pub report_id: Uuid,
    pub file_name: String,
    pub file_path: String,
}

/// Report
///
/// A student report. `attachment` is populated when the report was created with one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Report {
    pub id: Uuid,
    pub student_id: String,
    pub title: String,
    pub details: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub attachment: Option<Attachment>,
}

/// Report fields as supplied to the workflow engine.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub student_id: String,
    pub title: String,
    pub details: String,
}

/// Attachment fields as supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_path: String,
}

// --- Accounts ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewStudent {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub curriculum_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewTeacher {
    pub teacher_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewAdmin {
    pub admin_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// NewAccount
///
/// A person record to create. The variant decides both the table and the role of
/// the identity created alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum NewAccount {
    Student(NewStudent),
    Teacher(NewTeacher),
    Admin(NewAdmin),
}

impl NewAccount {
    /// The identity username: the person's domain identifier.
    pub fn username(&self) -> &str {
        match self {
            NewAccount::Student(s) => &s.student_id,
            NewAccount::Teacher(t) => &t.teacher_id,
            NewAccount::Admin(a) => &a.admin_id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            NewAccount::Student(_) => Role::Student,
            NewAccount::Teacher(_) => Role::Teacher,
            NewAccount::Admin(_) => Role::Admin,
        }
    }

    pub fn into_profile(self) -> Profile {
        match self {
            NewAccount::Student(s) => Profile::Student(Student {
                student_id: s.student_id,
                first_name: s.first_name,
                last_name: s.last_name,
                email: s.email,
                curriculum_id: s.curriculum_id,
                status: StudentStatus::Studying,
            }),
            NewAccount::Teacher(t) => Profile::Teacher(Teacher {
                teacher_id: t.teacher_id,
                first_name: t.first_name,
                last_name: t.last_name,
                email: t.email,
                position: t.position,
            }),
            NewAccount::Admin(a) => Profile::Admin(Admin {
                admin_id: a.admin_id,
                first_name: a.first_name,
                last_name: a.last_name,
                email: a.email,
            }),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// SignInRequest (POST /login).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

/// ChangePasswordRequest (PUT /me/password).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// ResetPasswordRequest (POST /admin/password-reset).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub username: String,
    pub new_password: String,
}

/// CreateAccountRequest (POST /admin/accounts).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    #[serde(flatten)]
    pub account: NewAccount,
    pub password: String,
}

/// CreateGraduationRequest (POST /graduations).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateGraduationRequest {
    pub curriculum_id: String,
}

/// UpdateGraduationRequest (PUT /graduations/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateGraduationRequest {
    pub status: GraduationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

impl UpdateGraduationRequest {
    /// Converts the payload into a decision. `None` when the target status is
    /// `pending`, which is not a decision.
    pub fn decision(self) -> Option<GraduationDecision> {
        match self.status {
            GraduationStatus::Pending => None,
            GraduationStatus::Approved => Some(GraduationDecision::Approve),
            GraduationStatus::Rejected => Some(GraduationDecision::Reject {
                reason: self.reject_reason.filter(|r| !r.trim().is_empty()),
            }),
        }
    }
}

/// RegistrationRequest (POST /registrations).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegistrationRequest {
    pub student_id: String,
    pub entries: Vec<EnrollmentEntry>,
}

/// CreateReportRequest (POST /reports).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReportRequest {
    pub title: String,
    pub details: String,
    #[serde(default)]
    pub attachment: Option<NewAttachment>,
}

// --- Response Payloads ---

/// SignInResponse
///
/// The role-specific profile merged with the bearer token.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignInResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub token: String,
    pub token_type: String,
}

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// RegistrationResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegistrationResponse {
    pub message: String,
    pub count: u64,
}
