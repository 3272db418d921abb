// Scheduler host binary: axum server with leader-gated cron jobs

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod routes;

use leadcron::{JobSpec, RequestSpec, RouterDispatcher, Scheduler, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "server=info,leadcron=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Starting leadcron server");

    // Load configuration
    let settings = Settings::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;
    settings.validate().map_err(anyhow::Error::msg)?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        lock_url = %settings.lock.url,
        "Configuration loaded"
    );

    // Internal routes that both the network listener and the job
    // dispatcher serve.
    let internal = routes::internal_router();
    let dispatcher = Arc::new(RouterDispatcher::new(internal.clone()));

    // Register jobs. Registration is atomic: a bad job aborts startup here
    // with nothing armed.
    let jobs = vec![
        JobSpec::new("daily-report", "0 0 6 * * *", "Europe/London")
            .request(RequestSpec::post("/internal/reports/daily"))
            .on_complete(|| async {
                tracing::info!("daily report dispatched");
                Ok(())
            }),
        JobSpec::new("cache-sweep", "0 */15 * * * *", "UTC")
            .request(RequestSpec::post("/internal/cache/sweep")),
        JobSpec::new("heartbeat", "*/30 * * * * *", "UTC").execute(|| async {
            tracing::info!("scheduler heartbeat");
            Ok(())
        }),
    ];

    let scheduler = Arc::new(Scheduler::register(settings.lock.clone(), jobs, dispatcher)?);
    tracing::info!(jobs = scheduler.jobs().len(), "Jobs registered");

    // Serve the internal routes plus runtime job introspection.
    let app = routes::with_introspection(internal, Arc::clone(&scheduler));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");

    // Host-ready hook: connect leadership and arm every trigger. A
    // coordination connection failure is fatal to startup.
    scheduler.on_ready().await?;
    tracing::info!("Scheduler ready, triggers armed");

    // Shutdown-begin runs before the listener stops serving.
    let shutdown = {
        let scheduler = Arc::clone(&scheduler);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, stopping job triggers");
            scheduler.on_shutdown_begin().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
