use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vitafit::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use vitafit::services::{BackgroundJobService, Mailer};
use vitafit::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(environment = %config.environment, "Starting VitaFit API");

    let database = DatabaseConfig::from_env()?;
    let pool = database
        .create_pool()
        .await
        .context("Failed to connect to the database")?;

    if config.run_migrations {
        run_migrations(&pool).await.context("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    if config.seed_database {
        DatabaseSeeder::new(pool.clone(), &config.auth).seed_all().await?;
    }

    let mailer = Mailer::from_config(&config.mail, &config.app_url)?;
    let address = config.server_address();
    let state = AppState::new(pool, config, mailer);

    let mut jobs = BackgroundJobService::new(
        state.auth_service.clone(),
        state.subscription_service.clone(),
        state.rate_limiters.clone(),
    )
    .await?;
    jobs.start().await?;

    let app = create_app(state);

    let listener = TcpListener::bind(&address).await?;
    info!("VitaFit API listening on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Err(e) = jobs.stop().await {
        warn!("Failed to stop background jobs: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
