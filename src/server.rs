use anyhow::{Context, Result};
use axum::Router;
use std::{
    future::Future,
    net::{IpAddr, SocketAddr},
};
use tokio::net::TcpListener;

use crate::{
    config::Config, logger::Logger, repository::DocumentStore, router::create_router,
    signals::shutdown_signal,
};

/// Start the service
///
/// This function:
/// 1. Connects the document store when one is configured (fatal on failure)
/// 2. Builds the router
/// 3. Binds to the configured address
/// 4. Serves until SIGTERM/SIGINT, then drains and disconnects the store
pub async fn start_server(config: Config, logger: Logger) -> Result<()> {
    logger.in_scope(|| {
        tracing::info!(
            service = %config.service_name,
            run_mode = %config.server.run_mode,
            "Service starting..."
        )
    });

    let store = match &config.database {
        Some(db) => Some(DocumentStore::connect(db, &logger).await?),
        None => {
            logger.in_scope(|| {
                tracing::info!("No document store configured, skipping connection")
            });
            None
        }
    };

    let app = create_router(logger.clone(), &config);

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid SERVER_HOST '{}'", config.server.host))?;
    let addr = SocketAddr::from((ip, config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let result = serve(listener, app, &logger, shutdown_signal()).await;

    if let Some(store) = store {
        store.disconnect().await;
    }

    match result {
        Ok(()) => {
            logger.in_scope(|| tracing::info!("Server stopped gracefully"));
            Ok(())
        }
        Err(e) => {
            logger.in_scope(|| tracing::error!(error = %e, "failed to run server"));
            Err(e.into())
        }
    }
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// Peer addresses are exposed to handlers through `ConnectInfo<SocketAddr>`.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    logger: &Logger,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    logger.in_scope(|| tracing::info!("Listening on {}", local_addr));

    let shutdown_logger = logger.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_logger.bind(shutdown).await;
        shutdown_logger.in_scope(|| tracing::info!("Shutdown signal received, draining connections..."));
    })
    .await
}
