mod common;

use academic_portal::{
    AppState, PolicyTable, TokenService,
    auth::AuthUser,
    create_router,
    models::Role,
    repository::Repository,
};
use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use common::*;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn request(method: Method, uri: &str, authorization: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn registration_body() -> Value {
    json!({
        "student_id": STUDENT_ID,
        "entries": [{ "subject_id": SUBJECT_IDS[0], "semester": SEMESTER }]
    })
}

// --- Authentication Gate ---

#[tokio::test]
async fn public_routes_need_no_token() {
    let state = state_for(seeded_repo().await);
    let app = create_router(state);

    let (status, _) = send(&app, request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_or_malformed_authorization_is_401() {
    let state = state_for(seeded_repo().await);
    let valid = bearer(&state, STUDENT_ID, Role::Student);
    let app = create_router(state);

    let token_only = valid.trim_start_matches("Bearer ").to_string();
    let bad_headers = [
        None,
        Some("Basic dXNlcjpwYXNz"),
        Some("Bearer"),
        Some("Bearer "),
        Some(token_only.as_str()),
    ];
    for authorization in bad_headers {
        let (status, body) = send(&app, request(Method::GET, "/me", authorization, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{:?}", authorization);
        assert!(body["error"].as_str().unwrap().starts_with("unauthorized"));
    }
}

#[tokio::test]
async fn duplicate_authorization_headers_are_401() {
    let state = state_for(seeded_repo().await);
    let valid = bearer(&state, STUDENT_ID, Role::Student);
    let app = create_router(state);

    let req = Request::builder()
        .uri("/me")
        .header(header::AUTHORIZATION, valid.as_str())
        .header(header::AUTHORIZATION, valid.as_str())
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_token_is_401() {
    let state = state_for(seeded_repo().await);
    let forger = TokenService::new(b"not-the-server-key", state.tokens.issuer(), Duration::hours(1));
    let forged = format!("Bearer {}", forger.issue(ADMIN_ID, Role::Admin).unwrap());
    let app = create_router(state);

    let (status, body) = send(&app, request(Method::GET, "/reports", Some(forged.as_str()), None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized: token signature is invalid");
}

#[tokio::test]
async fn expired_token_is_401_and_the_handler_never_runs() {
    let repo = seeded_repo().await;
    let state = state_for(repo.clone());
    let issued_long_ago = Utc::now() - Duration::hours(25);
    let expired = format!(
        "Bearer {}",
        state
            .tokens
            .issue_at(STUDENT_ID, Role::Student, issued_long_ago)
            .unwrap()
    );
    let app = create_router(state);

    let (status, body) = send(
        &app,
        request(Method::POST, "/registrations", Some(expired.as_str()), Some(registration_body())),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized: token has expired");
    assert!(repo.list_enrollments(STUDENT_ID).await.unwrap().is_empty());
}

// --- Authorization Gate ---

#[tokio::test]
async fn role_outside_policy_is_403_before_the_handler() {
    let repo = seeded_repo().await;
    let state = state_for(repo.clone());
    let teacher = bearer(&state, TEACHER_ID, Role::Teacher);
    let student = bearer(&state, STUDENT_ID, Role::Student);
    let app = create_router(state);

    // Teacher may not register anyone.
    let (status, body) = send(
        &app,
        request(Method::POST, "/registrations", Some(teacher.as_str()), Some(registration_body())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
    assert!(repo.list_enrollments(STUDENT_ID).await.unwrap().is_empty());

    // Student may not list every graduation request.
    let (status, _) = send(&app, request(Method::GET, "/graduations", Some(student.as_str()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Teacher may not decide one.
    let (status, _) = send(
        &app,
        request(
            Method::PUT,
            "/graduations/6f1c2a9e-3b7d-4c55-9a55-1c2d3e4f5a6b",
            Some(teacher.as_str()),
            Some(json!({ "status": "approved" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn permitted_role_reaches_the_handler() {
    let state = state_for(seeded_repo().await);
    let admin = bearer(&state, ADMIN_ID, Role::Admin);
    let teacher = bearer(&state, TEACHER_ID, Role::Teacher);
    let app = create_router(state);

    let (status, body) = send(&app, request(Method::GET, "/reports", Some(admin.as_str()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(&app, request(Method::GET, "/me", Some(teacher.as_str()), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "teacher");
    assert_eq!(body["TeacherID"], TEACHER_ID);
}

#[tokio::test]
async fn route_without_policy_entry_is_denied_for_everyone() {
    let state = state_for(seeded_repo().await)
        .with_policy(PolicyTable::new().allow(Method::GET, "/me", &Role::ALL));
    let tokens: Vec<String> = [
        (STUDENT_ID, Role::Student),
        (TEACHER_ID, Role::Teacher),
        (ADMIN_ID, Role::Admin),
    ]
    .iter()
    .map(|(username, role)| bearer(&state, username, *role))
    .collect();
    let app = create_router(state);

    for token in &tokens {
        let (status, _) = send(&app, request(Method::GET, "/me", Some(token.as_str()), None)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, request(Method::GET, "/reports", Some(token.as_str()), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }
}

#[tokio::test]
async fn authorization_uses_the_route_pattern_not_the_path() {
    let state = state_for(seeded_repo().await);
    let student = bearer(&state, STUDENT_ID, Role::Student);
    let app = create_router(state);

    // Allowed by the `/students/{id}/enrollments` entry, then ownership applies.
    let own = format!("/students/{}/enrollments", STUDENT_ID);
    let (status, _) = send(&app, request(Method::GET, &own, Some(student.as_str()), None)).await;
    assert_eq!(status, StatusCode::OK);

    let other = format!("/students/{}/enrollments", OTHER_STUDENT_ID);
    let (status, body) = send(&app, request(Method::GET, &other, Some(student.as_str()), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn auth_user_extraction_outside_the_gates_is_401() {
    let state: AppState = state_for(seeded_repo().await);
    let (mut parts, _) = Request::builder()
        .uri("/me")
        .body(())
        .unwrap()
        .into_parts();

    let result = AuthUser::from_request_parts(&mut parts, &state).await;

    let error = result.unwrap_err();
    assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_user_is_read_from_request_extensions() {
    let state: AppState = state_for(seeded_repo().await);
    let (mut parts, _) = Request::builder()
        .uri("/me")
        .body(())
        .unwrap()
        .into_parts();
    parts.extensions.insert(AuthUser {
        username: ADMIN_ID.to_string(),
        role: Role::Admin,
    });

    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();

    assert_eq!(user.username, ADMIN_ID);
    assert_eq!(user.role, Role::Admin);
}
