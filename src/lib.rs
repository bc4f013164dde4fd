use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod models;
pub mod policy;
pub mod repository;
pub mod token;

// Public (no token) and authenticated (both gates) routers.
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use policy::PolicyTable;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::TokenService;

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers and `ToSchema`
/// models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::get_me, handlers::change_password,
        handlers::reset_password, handlers::create_account, handlers::create_graduation,
        handlers::list_graduations, handlers::get_graduation, handlers::update_graduation,
        handlers::register, handlers::list_enrollments, handlers::create_report,
        handlers::list_reports
    ),
    components(
        schemas(
            models::Role, models::StudentStatus, models::Student, models::Teacher, models::Admin,
            models::Profile, models::GraduationStatus, models::GraduationRequest,
            models::EnrollmentEntry, models::Enrollment, models::Attachment, models::Report,
            models::NewAttachment, models::NewStudent, models::NewTeacher, models::NewAdmin,
            models::NewAccount, models::SignInRequest, models::SignInResponse,
            models::ChangePasswordRequest, models::ResetPasswordRequest,
            models::CreateAccountRequest, models::CreateGraduationRequest,
            models::UpdateGraduationRequest, models::RegistrationRequest,
            models::RegistrationResponse, models::CreateReportRequest, models::MessageResponse,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "academic-portal", description = "Academic records portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once at startup and shared read-only.
/// The token service and policy table are injected here rather than held in
/// globals so tests can substitute their own keys and tables.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub tokens: Arc<TokenService>,
    pub policy: Arc<PolicyTable>,
    pub config: AppConfig,
}

impl AppState {
    /// State with the token service derived from `config` and the portal's policy table.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            tokens: Arc::new(TokenService::from_config(&config)),
            policy: Arc::new(PolicyTable::reference()),
            config,
        }
    }

    pub fn with_policy(mut self, policy: PolicyTable) -> Self {
        self.policy = Arc::new(policy);
        self
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(app_state: &AppState) -> Arc<TokenService> {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for Arc<PolicyTable> {
    fn from_ref(app_state: &AppState) -> Arc<PolicyTable> {
        app_state.policy.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routers, the two gates and the observability stack.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Protected Routes
    // route_layer so MatchedPath is already set when the gates run. The layer
    // added last runs first: authenticate, then authorize, then the handler.
    let protected = authenticated::authenticated_routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authorize,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    // 3. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, carrying the `x-request-id` so all log lines of one
/// request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
