use academic_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router, credentials,
    repository::{PostgresRepository, RepositoryState},
    routes,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, connects and migrates the database,
/// checks the policy table against the protected routes and serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "academic_portal=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // Pay for the unknown-user digest now rather than on the first failed sign-in.
    tokio::task::spawn_blocking(credentials::dummy_digest)
        .await
        .expect("FATAL: failed to derive the sign-in dummy digest.");

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(repo, config);

    // 6. Policy Completeness (Fail-Closed at startup too)
    let uncovered = routes::uncovered_routes(&app_state.policy);
    if !uncovered.is_empty() {
        for (method, route) in &uncovered {
            tracing::error!(%method, route = %route, "Protected route has no policy entry");
        }
        panic!("FATAL: {} protected route(s) have no policy entry.", uncovered.len());
    }
    tracing::info!(entries = app_state.policy.len(), "Policy table loaded");

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
