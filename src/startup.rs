use crate::components::google_calendar::auth::FileCredentialProvider;
use crate::components::google_calendar::client::GoogleCalendarClient;
use crate::config::Config;
use crate::error::Error;
use crate::handlers::{create_event_handler, health_handler, index_handler, AppState};
use crate::shutdown;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and validate the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Wire the production collaborators into handler state
pub fn build_state(config: Config) -> AppState {
    AppState {
        credentials: Arc::new(FileCredentialProvider::new(&config)),
        calendar: Arc::new(GoogleCalendarClient::new(&config)),
        config: Arc::new(config),
    }
}

/// Build the router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/create-event", post(create_event_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listener and serve until a shutdown signal arrives
pub async fn serve(config: Config) -> miette::Result<()> {
    let addr = config.listen_addr();
    let app = build_router(build_state(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(Error::from)?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .map_err(Error::from)?;

    info!("Server shut down");
    Ok(())
}
