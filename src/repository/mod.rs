use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Admin, Enrollment, EnrollmentEntry, GraduationDecision, GraduationRequest, Identity,
    NewAccount, NewAttachment, NewReport, Profile, Report, Role, Student, Teacher,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist. Nothing was written.
    #[error("{0}")]
    NotFound(String),

    /// The request conflicts with current state. Nothing was written.
    #[error("{0}")]
    Conflict(String),

    /// A write inside a workflow violated a constraint. The unit was rolled back.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A workflow step failed for another reason. The unit was rolled back.
    #[error("transaction aborted: {0}")]
    Transaction(String),

    /// A stored value could not be mapped onto the domain model.
    #[error("corrupt row: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository Trait
///
/// The persistence contract behind every handler. Methods documented as workflows
/// are atomic: they either apply every write or none, on every exit path.
///
/// **Send + Sync + async_trait** keep `Arc<dyn Repository>` usable across axum tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    async fn find_identity(&self, username: &str) -> StoreResult<Option<Identity>>;
    // Returns false when no identity has that username.
    async fn set_password_hash(&self, username: &str, password_hash: &str) -> StoreResult<bool>;
    /// Workflow: inserts the identity and the matching person row.
    async fn create_account(&self, account: NewAccount, password_hash: String) -> StoreResult<Profile>;

    // --- Profiles ---
    async fn get_student(&self, student_id: &str) -> StoreResult<Option<Student>>;
    async fn get_teacher(&self, teacher_id: &str) -> StoreResult<Option<Teacher>>;
    async fn get_admin(&self, admin_id: &str) -> StoreResult<Option<Admin>>;

    /// Loads the role-specific person record for an identity.
    async fn find_profile(&self, username: &str, role: Role) -> StoreResult<Option<Profile>> {
        Ok(match role {
            Role::Student => self.get_student(username).await?.map(Profile::Student),
            Role::Teacher => self.get_teacher(username).await?.map(Profile::Teacher),
            Role::Admin => self.get_admin(username).await?.map(Profile::Admin),
        })
    }

    // --- Graduation ---
    /// Workflow: inserts a pending request and marks the student `pending_graduation`.
    async fn create_graduation_request(
        &self,
        student_id: &str,
        curriculum_id: &str,
    ) -> StoreResult<GraduationRequest>;
    async fn get_graduation_request(&self, id: Uuid) -> StoreResult<Option<GraduationRequest>>;
    async fn list_graduation_requests(&self) -> StoreResult<Vec<GraduationRequest>>;
    /// Workflow: decides a pending request and writes the student's status.
    async fn decide_graduation(
        &self,
        id: Uuid,
        decision: &GraduationDecision,
    ) -> StoreResult<GraduationRequest>;

    // --- Registration ---
    /// Workflow: inserts every entry for the student, returning the count.
    async fn register_batch(&self, student_id: &str, entries: &[EnrollmentEntry]) -> StoreResult<u64>;
    async fn list_enrollments(&self, student_id: &str) -> StoreResult<Vec<Enrollment>>;

    // --- Reports ---
    /// Workflow: inserts the report and, when given, its attachment.
    async fn create_report(
        &self,
        report: NewReport,
        attachment: Option<NewAttachment>,
    ) -> StoreResult<Report>;
    async fn list_reports(&self) -> StoreResult<Vec<Report>>;
}

/// RepositoryState
///
/// The shared persistence handle stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;
