use crate::{
    AppState,
    auth::AuthUser,
    credentials,
    error::{ApiError, ApiResult, ErrorBody},
    models::{
        ChangePasswordRequest, CreateAccountRequest, CreateGraduationRequest,
        CreateReportRequest, Enrollment, GraduationRequest, MessageResponse, NewReport, Profile,
        RegistrationRequest, RegistrationResponse, Report, ResetPasswordRequest, SignInRequest,
        SignInResponse, UpdateGraduationRequest,
    },
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

const TOKEN_TYPE: &str = "Bearer";

fn require_non_blank(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

// --- Sign-in & Account ---

/// login
///
/// [Public Route] Verifies a username/password pair and returns the role-specific
/// profile merged with a bearer token.
///
/// Unknown usernames and wrong passwords produce the same 401, and an unknown
/// username still pays for one Argon2 verification.
#[utoipa::path(
    post,
    path = "/login",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Invalid username or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<SignInResponse>> {
    let Json(SignInRequest { username, password }) = payload?;

    // Pending -> Verified
    let Some(identity) = state.repo.find_identity(&username).await? else {
        credentials::verify_dummy_blocking(password).await?;
        tracing::debug!(username = %username, "Sign-in for unknown username");
        return Err(ApiError::bad_sign_in());
    };
    if !credentials::verify_blocking(password, identity.password_hash.clone()).await? {
        tracing::warn!(username = %identity.username, "Sign-in with wrong password");
        return Err(ApiError::bad_sign_in());
    }

    // Verified -> Tokenized
    let token = state.tokens.issue(&identity.username, identity.role)?;

    // Tokenized -> RoleDispatched
    let profile = state
        .repo
        .find_profile(&identity.username, identity.role)
        .await?
        .ok_or_else(|| {
            ApiError::internal(format!(
                "identity '{}' has no {} record",
                identity.username, identity.role
            ))
        })?;

    tracing::info!(username = %identity.username, role = %identity.role, "Signed in");
    Ok(Json(SignInResponse {
        profile,
        token,
        token_type: TOKEN_TYPE.to_string(),
    }))
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Own profile", body = Profile),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> ApiResult<Json<Profile>> {
    let profile = state
        .repo
        .find_profile(&user.username, user.role)
        .await?
        .ok_or_else(|| ApiError::not_found("profile"))?;
    Ok(Json(profile))
}

/// change_password
///
/// [Authenticated Route] Replaces the caller's password after checking the old one.
#[utoipa::path(
    put,
    path = "/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid new password", body = ErrorBody),
        (status = 401, description = "Old password does not match", body = ErrorBody)
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(ChangePasswordRequest {
        old_password,
        new_password,
    }) = payload?;
    require_non_blank("new_password", &new_password)?;

    let identity = state
        .repo
        .find_identity(&user.username)
        .await?
        .ok_or_else(|| ApiError::not_found("account"))?;
    if !credentials::verify_blocking(old_password, identity.password_hash).await? {
        tracing::warn!(username = %user.username, "Password change with wrong old password");
        return Err(ApiError::credential_invalid("old password is incorrect"));
    }

    let digest = credentials::hash_blocking(new_password).await?;
    if !state.repo.set_password_hash(&user.username, &digest).await? {
        return Err(ApiError::not_found("account"));
    }

    tracing::info!(username = %user.username, "Password changed");
    Ok(Json(MessageResponse::new("password changed")))
}

/// reset_password
///
/// [Admin Route] Sets another identity's password without knowing the old one.
#[utoipa::path(
    post,
    path = "/admin/password-reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Unknown username", body = ErrorBody)
    )
)]
pub async fn reset_password(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(ResetPasswordRequest {
        username,
        new_password,
    }) = payload?;
    require_non_blank("username", &username)?;
    require_non_blank("new_password", &new_password)?;

    let digest = credentials::hash_blocking(new_password).await?;
    if !state.repo.set_password_hash(&username, &digest).await? {
        return Err(ApiError::not_found("account"));
    }

    tracing::info!(admin = %user.username, username = %username, "Password reset");
    Ok(Json(MessageResponse::new("password reset")))
}

/// create_account
///
/// [Admin Route] Creates a student, teacher or admin together with its identity.
/// The username is the person's id and the role is fixed here for good.
#[utoipa::path(
    post,
    path = "/admin/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Profile),
        (status = 409, description = "Username taken", body = ErrorBody),
        (status = 500, description = "Rolled back", body = ErrorBody)
    )
)]
pub async fn create_account(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    let Json(CreateAccountRequest { account, password }) = payload?;
    require_non_blank("username", account.username())?;
    require_non_blank("password", &password)?;

    let digest = credentials::hash_blocking(password).await?;
    let profile = state.repo.create_account(account, digest).await?;

    tracing::info!(admin = %user.username, role = %profile.role(), "Account created");
    Ok((StatusCode::CREATED, Json(profile)))
}

// --- Graduation ---

/// create_graduation
///
/// [Student Route] Files a graduation request for the caller and marks them
/// `pending_graduation`, atomically.
#[utoipa::path(
    post,
    path = "/graduations",
    request_body = CreateGraduationRequest,
    responses(
        (status = 201, description = "Request filed", body = GraduationRequest),
        (status = 404, description = "Unknown curriculum", body = ErrorBody),
        (status = 409, description = "Already pending or graduated", body = ErrorBody)
    )
)]
pub async fn create_graduation(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateGraduationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GraduationRequest>)> {
    let Json(CreateGraduationRequest { curriculum_id }) = payload?;
    require_non_blank("curriculum_id", &curriculum_id)?;

    let request = state
        .repo
        .create_graduation_request(&user.username, &curriculum_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// list_graduations
#[utoipa::path(
    get,
    path = "/graduations",
    responses((status = 200, description = "All graduation requests", body = [GraduationRequest]))
)]
pub async fn list_graduations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<GraduationRequest>>> {
    Ok(Json(state.repo.list_graduation_requests().await?))
}

/// get_graduation
///
/// [Authenticated Route] One request. Students only see their own.
#[utoipa::path(
    get,
    path = "/graduations/{id}",
    params(("id" = Uuid, Path, description = "Graduation request id")),
    responses(
        (status = 200, description = "Graduation request", body = GraduationRequest),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn get_graduation(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<GraduationRequest>> {
    let Path(id) = id?;
    let request = state
        .repo
        .get_graduation_request(id)
        .await?
        .ok_or_else(|| ApiError::not_found("graduation request"))?;
    user.require_owner_or_staff(&request.student_id)?;
    Ok(Json(request))
}

/// update_graduation
///
/// [Admin Route] Approves or rejects a pending request. The request row and the
/// student's status are written in one transaction; if either write fails neither
/// is kept.
#[utoipa::path(
    put,
    path = "/graduations/{id}",
    params(("id" = Uuid, Path, description = "Graduation request id")),
    request_body = UpdateGraduationRequest,
    responses(
        (status = 200, description = "Decision applied", body = MessageResponse),
        (status = 400, description = "Status is not a decision", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
        (status = 409, description = "Already decided", body = ErrorBody),
        (status = 500, description = "Rolled back", body = ErrorBody)
    )
)]
pub async fn update_graduation(
    user: AuthUser,
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateGraduationRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let decision = payload
        .decision()
        .ok_or_else(|| ApiError::validation("status must be 'approved' or 'rejected'"))?;

    let updated = state.repo.decide_graduation(id, &decision).await?;

    tracing::info!(
        admin = %user.username,
        request_id = %updated.id,
        student_id = %updated.student_id,
        status = updated.status.as_str(),
        "Graduation request decided"
    );
    Ok(Json(MessageResponse::new(format!(
        "graduation request {}",
        updated.status.as_str()
    ))))
}

// --- Registration ---

/// register
///
/// [Authenticated Route] Enrolls one student in every entry of the batch, or in
/// none of them. Students may only register themselves.
#[utoipa::path(
    post,
    path = "/registrations",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Batch registered", body = RegistrationResponse),
        (status = 400, description = "Empty batch", body = ErrorBody),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 500, description = "Rolled back", body = ErrorBody)
    )
)]
pub async fn register(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegistrationResponse>)> {
    let Json(RegistrationRequest {
        student_id,
        entries,
    }) = payload?;
    require_non_blank("student_id", &student_id)?;
    if entries.is_empty() {
        return Err(ApiError::validation("entries must not be empty"));
    }
    user.require_owner_or_staff(&student_id)?;

    let count = state.repo.register_batch(&student_id, &entries).await?;

    tracing::info!(by = %user.username, student_id = %student_id, count, "Registration batch committed");
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "registration completed".to_string(),
            count,
        }),
    ))
}

/// list_enrollments
#[utoipa::path(
    get,
    path = "/students/{id}/enrollments",
    params(("id" = String, Path, description = "Student id")),
    responses(
        (status = 200, description = "Enrollments", body = [Enrollment]),
        (status = 403, description = "Not the owner", body = ErrorBody)
    )
)]
pub async fn list_enrollments(
    user: AuthUser,
    State(state): State<AppState>,
    student_id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    let Path(student_id) = student_id?;
    user.require_owner_or_staff(&student_id)?;
    Ok(Json(state.repo.list_enrollments(&student_id).await?))
}

// --- Reports ---

/// create_report
///
/// [Student Route] Files a report and, when supplied, its attachment record in one
/// transaction.
#[utoipa::path(
    post,
    path = "/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 201, description = "Report filed", body = Report),
        (status = 400, description = "Invalid report", body = ErrorBody),
        (status = 500, description = "Rolled back", body = ErrorBody)
    )
)]
pub async fn create_report(
    user: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    let Json(CreateReportRequest {
        title,
        details,
        attachment,
    }) = payload?;
    require_non_blank("title", &title)?;
    if let Some(file) = &attachment {
        require_non_blank("attachment.file_path", &file.file_path)?;
    }

    let report = state
        .repo
        .create_report(
            NewReport {
                student_id: user.username,
                title,
                details,
            },
            attachment,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// list_reports
#[utoipa::path(
    get,
    path = "/reports",
    responses((status = 200, description = "All reports", body = [Report]))
)]
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<Json<Vec<Report>>> {
    Ok(Json(state.repo.list_reports().await?))
}
