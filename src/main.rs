use std::sync::Arc;

use anyhow::anyhow;
use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use empathic::{
    api::{self, AppState, Readiness, ReadinessHandle},
    config::AppConfig,
    generator::ChatCompletionsClient,
    inference::EmotionClassifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------
    // Logging
    // -----------------------------
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!("🚀 Starting empathic server...");

    // -----------------------------
    // Shared state
    // -----------------------------
    let (readiness, readiness_rx) = ReadinessHandle::new();
    let generator = Arc::new(ChatCompletionsClient::new(&config.generator)?);
    info!("💬 response generator → {}", generator.endpoint());

    let state = AppState {
        readiness: readiness_rx.clone(),
        generator,
        llm_timeout: config.generator.timeout,
    };

    // -----------------------------
    // Classifier loads in the background; /health reports progress
    // -----------------------------
    let classifier_cfg = config.classifier.clone();
    tokio::spawn(async move {
        let loaded = tokio::task::spawn_blocking(move || EmotionClassifier::load(&classifier_cfg))
            .await
            .map_err(|e| anyhow!("classifier loader panicked: {e}"))
            .and_then(|res| res);
        match loaded {
            Ok(classifier) => {
                readiness.mark_ready(Arc::new(classifier));
                info!("✅ emotion classifier ready");
            }
            Err(err) => {
                error!("❌ emotion classifier failed to load: {err:#}");
                readiness.mark_failed(format!("{err:#}"));
            }
        }
    });

    // -----------------------------
    // Routers
    // -----------------------------
    let app = Router::new()
        .merge(api::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state);

    let addr = config.addr.as_str();
    info!("🌐 HTTP listening on http://{addr}");
    info!("🗨  Chat UI at http://{addr}/");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(readiness_rx.clone()))
        .await?;

    // A load failure stops the server; report it as a process failure.
    if let Readiness::Failed(reason) = &*readiness_rx.borrow() {
        return Err(anyhow!("emotion classifier failed to load: {reason}"));
    }
    Ok(())
}

/// Resolves on Ctrl-C or once the classifier has failed to load.
async fn shutdown_signal(mut readiness: watch::Receiver<Readiness>) {
    let load_failed = async move {
        let failed = readiness
            .wait_for(|state| matches!(state, Readiness::Failed(_)))
            .await
            .is_ok();
        if !failed {
            // loader dropped without failing; only Ctrl-C can stop us now
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
        _ = load_failed => error!("shutting down: emotion classifier unavailable"),
    }
}
