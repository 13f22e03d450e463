use anyhow::Result;
use smartgallery::{
    api::{self, ApiOptions},
    config::Config,
    db::Database,
    detector::RemoteDetector,
    service::GalleryService,
};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartgallery=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Smart Gallery");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let db = Database::new(&config.database.url).await?;
    info!("Database initialized");

    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;

    let mut gallery = GalleryService::new(db, config.storage.upload_dir.clone())
        .with_match_threshold(config.detector.match_threshold);

    match RemoteDetector::from_config(&config.detector)? {
        Some(detector) => {
            info!("Face detection enabled via {}", config.detector.url.as_deref().unwrap_or_default());
            gallery = gallery.with_detector(Arc::new(detector));
        }
        None => info!("Face detection disabled, set DETECTOR_URL to enable it"),
    }

    if config.auth.api_token.is_some() {
        info!("API token required for gallery routes");
    }

    let app = api::create_app(
        Arc::new(gallery),
        ApiOptions {
            api_token: config.auth.api_token.clone(),
            max_upload_bytes: config.storage.max_upload_bytes,
        },
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
