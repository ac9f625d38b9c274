use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use launchpad::app::{AppServices, build_router};
use launchpad::config::AppConfig;
use launchpad::llm::{LlmProvider, create_provider};
use launchpad::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("🚀 Launchpad v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}/api", config.bind_addr());
    eprintln!("   Database: {}", config.db_path.display());

    // ── LLM ─────────────────────────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match &config.llm {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            Some(create_provider(llm_config).context("failed to create LLM provider")?)
        }
        None => {
            eprintln!("   Model: none (set ANTHROPIC_API_KEY or OPENAI_API_KEY to enable flows)");
            None
        }
    };

    // ── Database ────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open database at {}", config.db_path.display()))?,
    );
    match db.prune_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => tracing::info!(count = n, "Removed expired sessions at startup"),
        Err(e) => tracing::warn!("Failed to prune sessions at startup: {}", e),
    }

    // ── HTTP ────────────────────────────────────────────────────────────
    let services = AppServices::new(db, llm, &config);
    let app = build_router(&services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "Launchpad server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Launchpad server stopped");
    Ok(())
}

/// stderr logging, plus a daily rolling file when `log_dir` is configured.
fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "launchpad.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
