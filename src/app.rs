use std::sync::Arc;

use axum::{Router, http::StatusCode, response::IntoResponse};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cache::{TestCaseCache, redis::RedisStore},
    common::{config::Config, state::AppState},
    errors::Result,
    repositories::{
        language::LanguageRepository, problem::ProblemRepository,
        submission::SubmissionRepository, test_case::TestCaseRepository,
    },
    routes,
    services::submission::SubmissionService,
};

pub async fn run() -> Result<()> {
    setup_tracing();

    let config = Config::from_env()?;
    let pool = setup_database(&config).await?;
    sqlx::migrate!().run(&pool).await?;

    let store = RedisStore::connect(&config.redis_url).await?;
    let state = setup_app_state(pool, store, config.clone());

    let addr = format!("{}:{}", config.service_host, config.service_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(routes::submission::router())
        .merge(routes::ws::router())
        .fallback(fallback)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

pub async fn fallback() -> Result<impl IntoResponse> {
    Ok((StatusCode::NOT_FOUND, "Not Found"))
}

pub fn setup_tracing() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_target(true)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
        )
        .init();
}

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.postgres_connection_pool)
        .connect(&config.database_url)
        .await?;

    Ok(pool)
}

/// Wire repositories, caches and services once at startup; everything
/// downstream receives its dependencies explicitly.
pub fn setup_app_state(pool: PgPool, store: RedisStore, config: Config) -> AppState {
    let store = Arc::new(store);

    let submission_repository = Arc::new(SubmissionRepository::new(pool.clone()));
    let problem_repository = Arc::new(ProblemRepository::new(pool.clone()));
    let language_repository = Arc::new(LanguageRepository::new(pool.clone()));
    let test_case_repository = Arc::new(TestCaseRepository::new(pool));

    let test_case_cache = Arc::new(TestCaseCache::new(store.clone(), test_case_repository));

    let submission_service = Arc::new(SubmissionService::new(
        submission_repository,
        problem_repository,
        language_repository,
        test_case_cache,
        store.clone(),
    ));

    AppState::new(config, submission_service, store)
}
