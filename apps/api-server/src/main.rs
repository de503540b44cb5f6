//! # Ratewise API Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use handlers::EXEMPT_PATHS;
use middleware::RateLimitMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env()?;

    tracing::info!(
        "Starting Ratewise API Server on {}:{}",
        config.host,
        config.port
    );

    // Build application state; picks the counter backend
    let state = AppState::new(&config).await?;

    #[cfg(feature = "scheduler")]
    let scheduler = background::start_counter_sweep(
        &background::SchedulerConfig::from_env(),
        state.local_store.clone(),
        config.rate_limit.sweep_interval,
    )
    .await?;

    #[cfg(not(feature = "scheduler"))]
    let _sweeper = state
        .local_store
        .spawn_sweeper(config.rate_limit.sweep_interval);

    let server_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(
                RateLimitMiddleware::new(
                    server_state.limiter.clone(),
                    server_state.key_extractor.clone(),
                )
                .exempt(EXEMPT_PATHS.iter().copied()),
            )
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
            .default_service(web::to(handlers::not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    if let Some(mut scheduler) = scheduler {
        scheduler.shutdown().await?;
    }

    Ok(())
}
