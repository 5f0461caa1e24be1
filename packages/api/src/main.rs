use api::{AppState, Config, StartupError};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    api::telemetry::init();

    let config = Config::from_env()?;
    let pipeline = api::start_pipeline(&config).await?;
    let app = api::router(AppState::from_pipeline(&pipeline));

    let listener = tokio::net::TcpListener::bind(config.addr()).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    pipeline.shutdown().await?;
    Ok(())
}
