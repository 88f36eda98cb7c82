use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use almacen_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool)
            .await
            .context("failed to run migrations")?;
    }
    let db = Arc::new(db_pool);

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    let project_phase = Arc::new(api::services::projects::LoggedProjectPhase);
    let pickings = api::services::pickings::PickingService::new(
        db.clone(),
        event_sender.clone(),
        project_phase,
        cfg.company_code.clone(),
    );

    let state = api::AppState {
        db,
        config: cfg.clone(),
        event_sender,
        pickings,
    };

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::handlers::routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = cfg.server_addr();
    info!(%addr, environment = %cfg.environment, "starting almacen-api");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown signal received");
}
