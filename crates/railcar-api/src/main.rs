mod routes;
mod state;

use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use railcar_repository::PostgresRepository;
use routes::{list_trips, trip_detail, upload_events};
use state::AppState;
use tokio::net::TcpListener;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);

    let repository = PostgresRepository::connect(&database_url, 5).await?;
    repository.run_migrations().await?;

    let app_state = Arc::new(AppState::new(repository));

    let router = Router::new()
        .route("/api/uploads/events", post(upload_events))
        .route("/api/trips", get(list_trips))
        .route("/api/trips/{id}", get(trip_detail))
        .with_state(app_state);

    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
