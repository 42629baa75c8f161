use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clinica_core::audit::{AuditLogObserver, AuditTableObserver, ObserverSet};
use clinica_core::db::open_database;
use clinica_core::logs::LogFiles;
use clinica_core::CoreConfig;

mod error;
mod routes;
mod state;

use routes::auth::{LoginRequest, LoginResponse};
use routes::HealthResponse;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(routes::health, routes::auth::login),
    components(schemas(HealthResponse, LoginRequest, LoginResponse))
)]
struct ApiDoc;

/// Main entry point for the clinic records service.
///
/// Serves the REST API on port 3000 by default.
///
/// # Environment Variables
/// - `CLINICA_ADDR`: listen address (default: "0.0.0.0:3000")
/// - `CLINICA_DB`: SQLite database path (default: "clinica.db")
/// - `CLINICA_LOG_DIR`: application log directory (default: "logs")
/// - `CLINICA_SESSION_TTL_SECS`: session lifetime (default: 900)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinica=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    let conn = open_database(config.database_path())?;
    let logs = LogFiles::new(config.log_dir())?;

    let mut observers = ObserverSet::new();
    observers.register(Box::new(AuditLogObserver::new(logs.clone())));
    observers.register(Box::new(AuditTableObserver));

    let addr = std::env::var("CLINICA_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting clinica REST on {}", addr);

    let app = routes::router(AppState::new(conn, config, logs, observers))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
