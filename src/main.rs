mod config;
mod db;
mod guard;
mod pages;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() {
    // A missing .env is normal outside local development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")))
        .init();

    let config = config::Config::from_env().expect("invalid configuration");

    let pool = match config.database_url.as_deref() {
        Some(url) => Some(db::init_pool(url).await.expect("database init failed")),
        None => {
            tracing::warn!("DATABASE_URL not set; users and sessions are kept in memory");
            None
        }
    };

    let auth = state::build_auth_backend(&config, pool.clone())
        .await
        .expect("auth backend init failed");

    let _purge = pool.map(|pool| services::session::spawn_purge_task(pool, SESSION_PURGE_INTERVAL));

    let port = config.port;
    let state = state::AppState::new(config, auth);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "photostudio listening");
    axum::serve(listener, app).await.expect("server failed");
}
