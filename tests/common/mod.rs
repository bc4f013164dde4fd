// Shared fixtures. Not every test binary uses every item.
#![allow(dead_code)]

use academic_portal::{
    AppConfig, AppState, MemoryRepository,
    credentials,
    models::{Curriculum, NewAccount, NewAdmin, NewStudent, NewTeacher, Role, Subject},
    repository::{Repository, RepositoryState},
};
use std::sync::Arc;

pub const STUDENT_ID: &str = "B6616052";
pub const STUDENT_PASSWORD: &str = "student-pass";
pub const OTHER_STUDENT_ID: &str = "B6600001";
pub const OTHER_STUDENT_PASSWORD: &str = "other-pass";
pub const TEACHER_ID: &str = "T1001";
pub const TEACHER_PASSWORD: &str = "teacher-pass";
pub const ADMIN_ID: &str = "A0001";
pub const ADMIN_PASSWORD: &str = "admin-pass";

pub const CURRICULUM_ID: &str = "CPE-2567";
pub const SUBJECT_IDS: [&str; 3] = ["ENG23-3001", "ENG23-3002", "ENG23-3003"];
pub const SEMESTER: &str = "1/2567";

/// A repository with one curriculum, three subjects, two students, a teacher and
/// an admin.
pub async fn seeded_repo() -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();

    repo.seed_curriculum(Curriculum {
        curriculum_id: CURRICULUM_ID.to_string(),
        name: "Computer Engineering".to_string(),
    })
    .await;
    for subject_id in SUBJECT_IDS {
        repo.seed_subject(Subject {
            subject_id: subject_id.to_string(),
            name: format!("Subject {}", subject_id),
            credit: 3,
        })
        .await;
    }

    let accounts = [
        (student(STUDENT_ID, "Somchai", "Jaidee"), STUDENT_PASSWORD),
        (student(OTHER_STUDENT_ID, "Suda", "Rakdee"), OTHER_STUDENT_PASSWORD),
        (
            NewAccount::Teacher(NewTeacher {
                teacher_id: TEACHER_ID.to_string(),
                first_name: "Anan".to_string(),
                last_name: "Sukjai".to_string(),
                email: "anan@example.ac.th".to_string(),
                position: Some("Lecturer".to_string()),
            }),
            TEACHER_PASSWORD,
        ),
        (
            NewAccount::Admin(NewAdmin {
                admin_id: ADMIN_ID.to_string(),
                first_name: "Malee".to_string(),
                last_name: "Thongdee".to_string(),
                email: "registrar@example.ac.th".to_string(),
            }),
            ADMIN_PASSWORD,
        ),
    ];
    for (account, password) in accounts {
        let digest = credentials::hash(password).unwrap();
        repo.create_account(account, digest).await.unwrap();
    }

    Arc::new(repo)
}

pub fn student(id: &str, first_name: &str, last_name: &str) -> NewAccount {
    NewAccount::Student(NewStudent {
        student_id: id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}@example.ac.th", id.to_lowercase()),
        curriculum_id: Some(CURRICULUM_ID.to_string()),
    })
}

pub fn state_for(repo: Arc<MemoryRepository>) -> AppState {
    AppState::new(repo as RepositoryState, AppConfig::default())
}

/// A valid token for `username` signed with the state's key.
pub fn bearer(state: &AppState, username: &str, role: Role) -> String {
    format!("Bearer {}", state.tokens.issue(username, role).unwrap())
}
