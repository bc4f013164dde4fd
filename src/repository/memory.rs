use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Repository, StoreError, StoreResult};
use crate::models::{
    Admin, Attachment, Curriculum, Enrollment, EnrollmentEntry, GraduationDecision,
    GraduationRequest, GraduationStatus, Identity, NewAccount, NewAttachment, NewReport, Profile,
    Report, Student, StudentStatus, Subject, Teacher,
};

#[derive(Clone, Default)]
struct Tables {
    identities: BTreeMap<String, Identity>,
    students: BTreeMap<String, Student>,
    teachers: BTreeMap<String, Teacher>,
    admins: BTreeMap<String, Admin>,
    curriculums: BTreeMap<String, Curriculum>,
    subjects: BTreeMap<String, Subject>,
    enrollments: Vec<Enrollment>,
    next_enrollment_id: i64,
    graduations: BTreeMap<Uuid, GraduationRequest>,
    reports: Vec<Report>,
}

impl Tables {
    fn insert_enrollment(&mut self, student_id: &str, entry: &EnrollmentEntry) -> StoreResult<()> {
        if !self.students.contains_key(student_id) {
            return Err(StoreError::Constraint(format!("unknown student '{}'", student_id)));
        }
        if !self.subjects.contains_key(&entry.subject_id) {
            return Err(StoreError::Constraint(format!("unknown subject '{}'", entry.subject_id)));
        }
        if entry.semester.is_empty() {
            return Err(StoreError::Constraint("semester must not be empty".to_string()));
        }
        let duplicate = self.enrollments.iter().any(|e| {
            e.student_id == student_id && e.subject_id == entry.subject_id && e.semester == entry.semester
        });
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "'{}' already enrolled in '{}' for {}",
                student_id, entry.subject_id, entry.semester
            )));
        }

        self.next_enrollment_id += 1;
        self.enrollments.push(Enrollment {
            id: self.next_enrollment_id,
            student_id: student_id.to_string(),
            subject_id: entry.subject_id.clone(),
            semester: entry.semester.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }
}

/// MemoryTx
///
/// A transaction over `Tables`: holds the lock for its whole lifetime and works on a
/// private copy. `commit` publishes the copy; dropping the guard any other way
/// (error return, panic, cancelled future) discards it.
struct MemoryTx<'a> {
    committed: MutexGuard<'a, Tables>,
    work: Tables,
}

impl<'a> MemoryTx<'a> {
    async fn begin(tables: &'a Mutex<Tables>) -> MemoryTx<'a> {
        let committed = tables.lock().await;
        let work = committed.clone();
        MemoryTx { committed, work }
    }

    fn commit(self) {
        let MemoryTx { mut committed, work } = self;
        *committed = work;
    }
}

/// MemoryRepository
///
/// In-process `Repository` enforcing the same keys, references and checks as the
/// SQL schema, with fully serialized transactions. Used by the test suites.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    /// When true, every write to a student's status column fails like a rejected
    /// constraint would.
    fail_student_status_writes: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated failure of student status writes.
    pub fn set_fail_student_status_writes(&self, fail: bool) {
        self.fail_student_status_writes.store(fail, Ordering::SeqCst);
    }

    /// Catalog rows are maintained outside this service; tests seed them directly.
    pub async fn seed_curriculum(&self, curriculum: Curriculum) {
        let mut tables = self.tables.lock().await;
        tables
            .curriculums
            .insert(curriculum.curriculum_id.clone(), curriculum);
    }

    pub async fn seed_subject(&self, subject: Subject) {
        let mut tables = self.tables.lock().await;
        tables.subjects.insert(subject.subject_id.clone(), subject);
    }

    fn write_student_status(
        &self,
        tables: &mut Tables,
        student_id: &str,
        status: StudentStatus,
    ) -> StoreResult<()> {
        if self.fail_student_status_writes.load(Ordering::SeqCst) {
            tracing::warn!(student_id, "Simulated student status write failure");
            return Err(StoreError::Constraint(format!(
                "status write rejected for student '{}'",
                student_id
            )));
        }
        let student = tables.students.get_mut(student_id).ok_or_else(|| {
            StoreError::Constraint(format!("student '{}' not found", student_id))
        })?;
        student.status = status;
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_identity(&self, username: &str) -> StoreResult<Option<Identity>> {
        Ok(self.tables.lock().await.identities.get(username).cloned())
    }

    async fn set_password_hash(&self, username: &str, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.identities.get_mut(username) {
            Some(identity) => {
                identity.password_hash = password_hash.to_string();
                true
            }
            None => false,
        })
    }

    async fn create_account(&self, account: NewAccount, password_hash: String) -> StoreResult<Profile> {
        let mut tx = MemoryTx::begin(&self.tables).await;
        let username = account.username().to_string();

        if tx.work.identities.contains_key(&username) {
            return Err(StoreError::Conflict(format!("username '{}' already exists", username)));
        }
        tx.work.identities.insert(
            username.clone(),
            Identity {
                username: username.clone(),
                password_hash,
                role: account.role(),
            },
        );

        let profile = account.into_profile();
        match &profile {
            Profile::Student(student) => {
                if let Some(curriculum_id) = &student.curriculum_id {
                    if !tx.work.curriculums.contains_key(curriculum_id) {
                        return Err(StoreError::Constraint(format!(
                            "unknown curriculum '{}'",
                            curriculum_id
                        )));
                    }
                }
                tx.work.students.insert(username, student.clone());
            }
            Profile::Teacher(teacher) => {
                tx.work.teachers.insert(username, teacher.clone());
            }
            Profile::Admin(admin) => {
                tx.work.admins.insert(username, admin.clone());
            }
        }

        tx.commit();
        Ok(profile)
    }

    async fn get_student(&self, student_id: &str) -> StoreResult<Option<Student>> {
        Ok(self.tables.lock().await.students.get(student_id).cloned())
    }

    async fn get_teacher(&self, teacher_id: &str) -> StoreResult<Option<Teacher>> {
        Ok(self.tables.lock().await.teachers.get(teacher_id).cloned())
    }

    async fn get_admin(&self, admin_id: &str) -> StoreResult<Option<Admin>> {
        Ok(self.tables.lock().await.admins.get(admin_id).cloned())
    }

    async fn create_graduation_request(
        &self,
        student_id: &str,
        curriculum_id: &str,
    ) -> StoreResult<GraduationRequest> {
        let mut tx = MemoryTx::begin(&self.tables).await;

        let student = tx
            .work
            .students
            .get(student_id)
            .ok_or_else(|| StoreError::NotFound("student".to_string()))?;
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
        if !tx.work.curriculums.contains_key(curriculum_id) {
            return Err(StoreError::NotFound("curriculum".to_string()));
        }

        let request = GraduationRequest {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            curriculum_id: curriculum_id.to_string(),
            status: GraduationStatus::Pending,
            reject_reason: None,
            created_at: Utc::now(),
            decided_at: None,
        };
        tx.work.graduations.insert(request.id, request.clone());
        self.write_student_status(&mut tx.work, student_id, StudentStatus::PendingGraduation)?;

        tx.commit();
        Ok(request)
    }

    async fn get_graduation_request(&self, id: Uuid) -> StoreResult<Option<GraduationRequest>> {
        Ok(self.tables.lock().await.graduations.get(&id).cloned())
    }

    async fn list_graduation_requests(&self) -> StoreResult<Vec<GraduationRequest>> {
        let mut requests: Vec<GraduationRequest> =
            self.tables.lock().await.graduations.values().cloned().collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn decide_graduation(
        &self,
        id: Uuid,
        decision: &GraduationDecision,
    ) -> StoreResult<GraduationRequest> {
        let mut tx = MemoryTx::begin(&self.tables).await;

        let request = tx
            .work
            .graduations
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("graduation request".to_string()))?;
        if request.status != GraduationStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "graduation request is already {}",
                request.status.as_str()
            )));
        }

        request.status = decision.request_status();
        request.reject_reason = decision.reason().map(str::to_string);
        request.decided_at = Some(Utc::now());
        let updated = request.clone();

        self.write_student_status(&mut tx.work, &updated.student_id, decision.student_status())?;

        tx.commit();
        Ok(updated)
    }

    async fn register_batch(&self, student_id: &str, entries: &[EnrollmentEntry]) -> StoreResult<u64> {
        let mut tx = MemoryTx::begin(&self.tables).await;

        if !tx.work.students.contains_key(student_id) {
            return Err(StoreError::NotFound("student".to_string()));
        }
        for (index, entry) in entries.iter().enumerate() {
            if let Err(e) = tx.work.insert_enrollment(student_id, entry) {
                tracing::warn!(student_id, index, error = %e, "Registration batch rolled back");
                return Err(e);
            }
        }

        tx.commit();
        Ok(entries.len() as u64)
    }

    async fn list_enrollments(&self, student_id: &str) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .tables
            .lock()
            .await
            .enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn create_report(
        &self,
        report: NewReport,
        attachment: Option<NewAttachment>,
    ) -> StoreResult<Report> {
        let mut tx = MemoryTx::begin(&self.tables).await;

        if !tx.work.students.contains_key(&report.student_id) {
            return Err(StoreError::Constraint(format!(
                "unknown student '{}'",
                report.student_id
            )));
        }
        if report.title.is_empty() {
            return Err(StoreError::Constraint("report title must not be empty".to_string()));
        }

        let mut created = Report {
            id: Uuid::new_v4(),
            student_id: report.student_id,
            title: report.title,
            details: report.details,
            created_at: Utc::now(),
            attachment: None,
        };

        if let Some(file) = attachment {
            if file.file_path.is_empty() {
                return Err(StoreError::Constraint(
                    "attachment file path must not be empty".to_string(),
                ));
            }
            created.attachment = Some(Attachment {
                id: Uuid::new_v4(),
                report_id: created.id,
                file_name: file.file_name,
                file_path: file.file_path,
            });
        }

        tx.work.reports.push(created.clone());
        tx.commit();
        Ok(created)
    }

    async fn list_reports(&self) -> StoreResult<Vec<Report>> {
        let mut reports = self.tables.lock().await.reports.clone();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }
}
