use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Repository, StoreError, StoreResult};
use crate::models::{
    Admin, Attachment, Enrollment, EnrollmentEntry, GraduationDecision, GraduationRequest,
    GraduationStatus, Identity, NewAccount, NewAttachment, NewReport, Profile, Report, Student,
    StudentStatus, Teacher,
};

const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, email, curriculum_id, status";
const GRADUATION_COLUMNS: &str =
    "id, student_id, curriculum_id, status, reject_reason, created_at, decided_at";

// --- Joined rows ---

/// One report joined with its optional attachment; the attachment columns are all
/// NULL when the report has none.
#[derive(FromRow)]
struct ReportListingRow {
    id: Uuid,
    student_id: String,
    title: String,
    details: String,
    created_at: DateTime<Utc>,
    attachment_id: Option<Uuid>,
    file_name: Option<String>,
    file_path: Option<String>,
}

impl From<ReportListingRow> for Report {
    fn from(row: ReportListingRow) -> Self {
        let attachment = match (row.attachment_id, row.file_name, row.file_path) {
            (Some(id), Some(file_name), Some(file_path)) => Some(Attachment {
                id,
                report_id: row.id,
                file_name,
                file_path,
            }),
            _ => None,
        };
        Report {
            id: row.id,
            student_id: row.student_id,
            title: row.title,
            details: row.details,
            created_at: row.created_at,
            attachment,
        }
    }
}

// --- Row mappings for tables with enum-valued TEXT columns ---

#[derive(FromRow)]
struct IdentityRow {
    username: String,
    password_hash: String,
    role: String,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = StoreError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Identity {
            role: row.role.parse().map_err(|e| StoreError::Decode(format!("{}", e)))?,
            username: row.username,
            password_hash: row.password_hash,
        })
    }
}

#[derive(FromRow)]
struct StudentRow {
    student_id: String,
    first_name: String,
    last_name: String,
    email: String,
    curriculum_id: Option<String>,
    status: String,
}

impl TryFrom<StudentRow> for Student {
    type Error = StoreError;

    fn try_from(row: StudentRow) -> Result<Self, Self::Error> {
        Ok(Student {
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Decode(format!("{}", e)))?,
            student_id: row.student_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            curriculum_id: row.curriculum_id,
        })
    }
}

#[derive(FromRow)]
struct GraduationRow {
    id: Uuid,
    student_id: String,
    curriculum_id: String,
    status: String,
    reject_reason: Option<String>,
    created_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
}

impl TryFrom<GraduationRow> for GraduationRequest {
    type Error = StoreError;

    fn try_from(row: GraduationRow) -> Result<Self, Self::Error> {
        Ok(GraduationRequest {
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Decode(format!("{}", e)))?,
            id: row.id,
            student_id: row.student_id,
            curriculum_id: row.curriculum_id,
            reject_reason: row.reject_reason,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

fn is_constraint_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation()
        }
        _ => false,
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Maps a failure inside an open transaction. The caller returns right after,
/// dropping the transaction, which rolls it back.
fn workflow_error(step: &str, e: sqlx::Error) -> StoreError {
    tracing::warn!(step, error = %e, "Workflow step failed; rolling back");
    if is_constraint_violation(&e) {
        StoreError::Constraint(format!("{}: {}", step, e))
    } else {
        StoreError::Transaction(format!("{}: {}", step, e))
    }
}

/// PostgresRepository
///
/// `Repository` over a PostgreSQL pool. Every workflow opens a `sqlx::Transaction`
/// and commits it as its last step; any early return, panic or cancelled future
/// drops the transaction and the driver rolls it back.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("begin: {}", e)))
    }

    /// Locks and returns the student row for the rest of the transaction.
    async fn lock_student(
        tx: &mut Transaction<'static, Postgres>,
        student_id: &str,
    ) -> StoreResult<Student> {
        let row = sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE student_id = $1 FOR UPDATE",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| workflow_error("lock_student", e))?;

        row.map(Student::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound("student".to_string()))
    }

    async fn commit(tx: Transaction<'static, Postgres>) -> StoreResult<()> {
        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("commit: {}", e)))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_identity(&self, username: &str) -> StoreResult<Option<Identity>> {
        sqlx::query_as::<_, IdentityRow>(
            "SELECT username, password_hash, role FROM identities WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(Identity::try_from)
        .transpose()
    }

    async fn set_password_hash(&self, username: &str, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE identities SET password_hash = $2 WHERE username = $1")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_account
    ///
    /// Identity first (the person tables reference it), then the person row.
    async fn create_account(&self, account: NewAccount, password_hash: String) -> StoreResult<Profile> {
        let mut tx = self.begin().await?;

        sqlx::query("INSERT INTO identities (username, password_hash, role) VALUES ($1, $2, $3)")
            .bind(account.username())
            .bind(&password_hash)
            .bind(account.role().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict(format!("username '{}' already exists", account.username()))
                } else {
                    workflow_error("insert_identity", e)
                }
            })?;

        let inserted = match &account {
            NewAccount::Student(s) => sqlx::query(
                "INSERT INTO students (student_id, first_name, last_name, email, curriculum_id, status) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&s.student_id)
            .bind(&s.first_name)
            .bind(&s.last_name)
            .bind(&s.email)
            .bind(&s.curriculum_id)
            .bind(StudentStatus::Studying.as_str())
            .execute(&mut *tx)
            .await,
            NewAccount::Teacher(t) => sqlx::query(
                "INSERT INTO teachers (teacher_id, first_name, last_name, email, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(&t.teacher_id)
            .bind(&t.first_name)
            .bind(&t.last_name)
            .bind(&t.email)
            .bind(&t.position)
            .execute(&mut *tx)
            .await,
            NewAccount::Admin(a) => sqlx::query(
                "INSERT INTO admins (admin_id, first_name, last_name, email) VALUES ($1, $2, $3, $4)",
            )
            .bind(&a.admin_id)
            .bind(&a.first_name)
            .bind(&a.last_name)
            .bind(&a.email)
            .execute(&mut *tx)
            .await,
        };
        inserted.map_err(|e| workflow_error("insert_person", e))?;

        Self::commit(tx).await?;
        tracing::info!(username = account.username(), role = %account.role(), "Account created");
        Ok(account.into_profile())
    }

    async fn get_student(&self, student_id: &str) -> StoreResult<Option<Student>> {
        sqlx::query_as::<_, StudentRow>(&format!(
            "SELECT {} FROM students WHERE student_id = $1",
            STUDENT_COLUMNS
        ))
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Student::try_from)
        .transpose()
    }

    async fn get_teacher(&self, teacher_id: &str) -> StoreResult<Option<Teacher>> {
        Ok(sqlx::query_as::<_, Teacher>(
            "SELECT teacher_id, first_name, last_name, email, position FROM teachers WHERE teacher_id = $1",
        )
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_admin(&self, admin_id: &str) -> StoreResult<Option<Admin>> {
        Ok(sqlx::query_as::<_, Admin>(
            "SELECT admin_id, first_name, last_name, email FROM admins WHERE admin_id = $1",
        )
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// create_graduation_request
    ///
    /// The student row is locked first so two concurrent submissions serialize; the
    /// partial unique index on pending requests backs the same rule.
    async fn create_graduation_request(
        &self,
        student_id: &str,
        curriculum_id: &str,
    ) -> StoreResult<GraduationRequest> {
        let mut tx = self.begin().await?;

        let student = Self::lock_student(&mut tx, student_id).await?;
        match student.status {
            StudentStatus::Graduated => {
                return Err(StoreError::Conflict("student has already graduated".to_string()));
            }
            StudentStatus::PendingGraduation => {
                return Err(StoreError::Conflict(
                    "a graduation request is already pending".to_string(),
                ));
            }
            StudentStatus::Studying => {}
        }

        let curriculum_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM curriculums WHERE curriculum_id = $1)",
        )
        .bind(curriculum_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| workflow_error("check_curriculum", e))?;
        if !curriculum_exists {
            return Err(StoreError::NotFound("curriculum".to_string()));
        }

        let row = sqlx::query_as::<_, GraduationRow>(&format!(
            "INSERT INTO graduation_requests (id, student_id, curriculum_id, status, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) RETURNING {}",
            GRADUATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(curriculum_id)
        .bind(GraduationStatus::Pending.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| workflow_error("insert_graduation_request", e))?;

        sqlx::query("UPDATE students SET status = $2 WHERE student_id = $1")
            .bind(student_id)
            .bind(StudentStatus::PendingGraduation.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| workflow_error("update_student_status", e))?;

        Self::commit(tx).await?;
        GraduationRequest::try_from(row)
    }

    async fn get_graduation_request(&self, id: Uuid) -> StoreResult<Option<GraduationRequest>> {
        sqlx::query_as::<_, GraduationRow>(&format!(
            "SELECT {} FROM graduation_requests WHERE id = $1",
            GRADUATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(GraduationRequest::try_from)
        .transpose()
    }

    async fn list_graduation_requests(&self) -> StoreResult<Vec<GraduationRequest>> {
        sqlx::query_as::<_, GraduationRow>(&format!(
            "SELECT {} FROM graduation_requests ORDER BY created_at DESC",
            GRADUATION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(GraduationRequest::try_from)
        .collect()
    }

    /// decide_graduation
    ///
    /// Request row (locked) is written before the student row. If the student write
    /// touches no row or fails, the request write is rolled back with it.
    async fn decide_graduation(
        &self,
        id: Uuid,
        decision: &GraduationDecision,
    ) -> StoreResult<GraduationRequest> {
        let mut tx = self.begin().await?;

        let current = sqlx::query_as::<_, GraduationRow>(&format!(
            "SELECT {} FROM graduation_requests WHERE id = $1 FOR UPDATE",
            GRADUATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| workflow_error("lock_graduation_request", e))?
        .map(GraduationRequest::try_from)
        .transpose()?
        .ok_or_else(|| StoreError::NotFound("graduation request".to_string()))?;

        if current.status != GraduationStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "graduation request is already {}",
                current.status.as_str()
            )));
        }

        let updated = sqlx::query_as::<_, GraduationRow>(&format!(
            "UPDATE graduation_requests SET status = $2, reject_reason = $3, decided_at = NOW() \
             WHERE id = $1 RETURNING {}",
            GRADUATION_COLUMNS
        ))
        .bind(id)
        .bind(decision.request_status().as_str())
        .bind(decision.reason())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| workflow_error("update_graduation_request", e))?;

        let student_rows = sqlx::query("UPDATE students SET status = $2 WHERE student_id = $1")
            .bind(&current.student_id)
            .bind(decision.student_status().as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| workflow_error("update_student_status", e))?
            .rows_affected();
        if student_rows == 0 {
            tracing::warn!(request_id = %id, student_id = %current.student_id, "Student row missing; rolling back");
            return Err(StoreError::Constraint(format!(
                "student '{}' for graduation request not found",
                current.student_id
            )));
        }

        Self::commit(tx).await?;
        GraduationRequest::try_from(updated)
    }

    /// register_batch
    ///
    /// Entries are inserted in submission order; the first failure aborts the batch.
    async fn register_batch(&self, student_id: &str, entries: &[EnrollmentEntry]) -> StoreResult<u64> {
        let mut tx = self.begin().await?;
        Self::lock_student(&mut tx, student_id).await?;

        let mut created = 0u64;
        for (index, entry) in entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO enrollments (student_id, subject_id, semester, created_at) \
                 VALUES ($1, $2, $3, NOW())",
            )
            .bind(student_id)
            .bind(&entry.subject_id)
            .bind(&entry.semester)
            .execute(&mut *tx)
            .await
            .map_err(|e| workflow_error(&format!("insert_enrollment[{}]", index), e))?;
            created += 1;
        }

        Self::commit(tx).await?;
        Ok(created)
    }

    async fn list_enrollments(&self, student_id: &str) -> StoreResult<Vec<Enrollment>> {
        Ok(sqlx::query_as::<_, Enrollment>(
            "SELECT id, student_id, subject_id, semester, created_at FROM enrollments \
             WHERE student_id = $1 ORDER BY id ASC",
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_report(
        &self,
        report: NewReport,
        attachment: Option<NewAttachment>,
    ) -> StoreResult<Report> {
        let mut tx = self.begin().await?;

        let mut created = sqlx::query_as::<_, Report>(
            "INSERT INTO reports (id, student_id, title, details, created_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             RETURNING id, student_id, title, details, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&report.student_id)
        .bind(&report.title)
        .bind(&report.details)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| workflow_error("insert_report", e))?;

        if let Some(file) = attachment {
            let stored = sqlx::query_as::<_, Attachment>(
                "INSERT INTO report_attachments (id, report_id, file_name, file_path) \
                 VALUES ($1, $2, $3, $4) RETURNING id, report_id, file_name, file_path",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(&file.file_name)
            .bind(&file.file_path)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| workflow_error("insert_attachment", e))?;
            created.attachment = Some(stored);
        }

        Self::commit(tx).await?;
        Ok(created)
    }

    async fn list_reports(&self) -> StoreResult<Vec<Report>> {
        let rows = sqlx::query_as::<_, ReportListingRow>(
            "SELECT r.id, r.student_id, r.title, r.details, r.created_at, \
                    a.id AS attachment_id, a.file_name, a.file_path \
             FROM reports r \
             LEFT JOIN report_attachments a ON a.report_id = r.id \
             ORDER BY r.created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Report::from).collect())
    }
}
