use std::collections::HashMap;
use std::sync::Arc;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenvy::dotenv;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use finserver::api_router::configure_api_routes;
use finserver::config::AppConfig;
use finserver::flows::OpenAiClient;
use finserver::shared::state::AppState;
use finserver::shared::utils::create_conn;
use finserver::store::Store;
use finserver::web_server::configure_static_routes;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("finserver=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let pool = match create_conn() {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to create database pool: {}", e);
            return Err(e);
        }
    };

    {
        let mut conn = pool.get()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    }

    let state = Arc::new(AppState {
        store: Store::new(pool.clone()),
        conn: pool,
        llm: Arc::new(OpenAiClient::new(&config.llm)),
        pending_replies: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = configure_api_routes(state.clone())
        .merge(configure_static_routes(&config.site_path))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
