use crate::config::{Config, DataPaths};
use crate::ingest::{IngestCoordinator, IngestSettings};
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use nepenthe_av::{FfmpegThumbnailer, FfprobeProber, MetadataProbe, ThumbnailSource};
use nepenthe_db::pool::{init_pool, DbPool};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

mod error;
pub mod routes_library;
pub mod routes_videos;

pub use error::AppError;
pub use routes_videos::THUMBNAIL_URL_PREFIX;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Data locations resolved once at startup
    pub paths: Arc<DataPaths>,
    pub pool: DbPool,
    pub ingest: IngestCoordinator,
}

impl AppContext {
    /// Assemble a context from already-built parts.
    pub fn new(
        config: Config,
        paths: Arc<DataPaths>,
        pool: DbPool,
        prober: Arc<dyn MetadataProbe>,
        thumbnailer: Arc<dyn ThumbnailSource>,
    ) -> Self {
        let ingest = IngestCoordinator::new(
            pool.clone(),
            paths.clone(),
            prober,
            thumbnailer,
            IngestSettings::from(&config),
        );
        Self {
            config: Arc::new(config),
            paths,
            pool,
            ingest,
        }
    }

    /// Build the production context: data directories, database, and the
    /// ffprobe/ffmpeg backed prober and thumbnailer.
    pub fn from_config(config: Config) -> Result<Self> {
        let paths = Arc::new(DataPaths::resolve(&config.library)?);

        tracing::info!("Initializing database at {}", paths.database_str());
        let pool = init_pool(&paths.database_str())
            .with_context(|| format!("Failed to open database {:?}", paths.database))?;

        let tools = config.tools.resolve_paths();
        tracing::info!(ffprobe = %tools.ffprobe.display(), ffmpeg = %tools.ffmpeg.display(), "Resolved media tools");

        let prober = Arc::new(FfprobeProber::new(
            tools.ffprobe.clone(),
            config.tools.probe_timeout(),
        ));
        let thumbnailer = Arc::new(FfmpegThumbnailer::new(
            tools.ffmpeg,
            config.tools.thumbnail_settings(),
        ));

        Ok(Self::new(config, paths, pool, prober, thumbnailer))
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = cors_layer(&ctx.config.server.cors_origins);
    let static_dir = ctx.config.server.static_dir.clone();

    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .nest_service(THUMBNAIL_URL_PREFIX, ServeDir::new(&ctx.paths.thumbnails))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve static files if directory is provided
    // Uses SPA fallback: serves index.html for any route that doesn't match a file
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        } else {
            tracing::warn!("Static directory does not exist: {:?}", dir);
        }
    }

    app
}

fn api_routes() -> Router<AppContext> {
    routes_library::library_routes().merge(routes_videos::video_routes())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
        ]);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Start the HTTP server and run until a shutdown signal arrives
pub async fn start_server(ctx: AppContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .context("Invalid server address")?;

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve(listener, ctx, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// A running ingestion unit is asked to cancel on shutdown.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let ingest = ctx.ingest.clone();
    let app = create_router(ctx);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            ingest.cancel();
        })
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
