use std::net::SocketAddr;
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{info, warn};

use fern_backend::{AgentCoordinator, ArchivalHook, MockBackend, PromptBuilder};
use fern_channels::{ChannelManager, LoggingChannel, LoopbackChannel};
use fern_core::config::FernConfig;
use fern_memory::{HashEmbedder, MemoryStore};
use fern_scheduler::{SchedulerEngine, SchedulerHandle};
use fern_sessions::{ThreadSessionRegistry, TodoManager};
use fern_subagent::SubagentManager;

mod app;
mod auth;
mod error;
mod http;

/// How often the `done`/`cancelled` task retention pass runs.
const TODO_PURGE_INTERVAL_SECS: u64 = 6 * 60 * 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fern_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("FERN_CONFIG").ok();
    let config = FernConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        FernConfig::default()
    });

    std::fs::create_dir_all(&config.storage_path)?;

    // No configuration surface names a concrete backend subprocess to spawn
    // (`model` only carries provider/model/base_url, meant for a backend
    // that speaks to a hosted API rather than a local CLI). Run against the
    // in-process mock backend until a real adapter is wired in.
    let backend: fern_backend::SharedBackend = MockBackend::new();

    let sessions = Arc::new(ThreadSessionRegistry::new());
    let prompt_builder = PromptBuilder::load(None);
    let coordinator = Arc::new(AgentCoordinator::new(
        Arc::clone(&backend),
        Arc::clone(&sessions),
        prompt_builder,
        "fern",
    ));

    let memory_conn = Connection::open(config.db_path())?;
    let memory = Arc::new(MemoryStore::new(
        memory_conn,
        Arc::new(HashEmbedder),
        backend,
        Arc::clone(&coordinator),
    )?);
    coordinator.set_archival_hook(Arc::clone(&memory) as Arc<dyn ArchivalHook>);

    let scheduler_conn = Connection::open(config.db_path())?;
    let scheduler = SchedulerHandle::new(scheduler_conn)?;
    let scheduler_engine = SchedulerEngine::new(
        &scheduler,
        Arc::clone(&coordinator),
        config.scheduler.max_concurrent,
        config.scheduler.tick_interval_ms,
    );
    let reset = scheduler_engine.recover_stale().await?;
    if reset > 0 {
        info!(count = reset, "reset stale scheduled jobs back to pending");
    }

    let subagent_conn = Connection::open(config.db_path())?;
    let subagent = Arc::new(SubagentManager::new(
        subagent_conn,
        Arc::clone(&coordinator),
        config.subagent.max_concurrent,
    )?);
    let failed = subagent.recover_stale().await?;
    if failed > 0 {
        info!(count = failed, "failed stale subagent tasks left running across a restart");
    }

    let todo_conn = Connection::open(config.db_path())?;
    let todos = Arc::new(TodoManager::new(todo_conn));

    let mut channels = ChannelManager::new();
    channels.register(Box::new(LoggingChannel::new("log")));
    channels.register(Box::new(LoopbackChannel::new("loopback")));
    channels.connect_all().await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(scheduler_engine.run(shutdown_rx));
    tokio::spawn(run_todo_retention(Arc::clone(&todos), shutdown_tx.subscribe()));

    let state = Arc::new(app::AppState::new(
        config.clone(),
        coordinator,
        memory,
        scheduler,
        subagent,
        todos,
        channels,
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("fern gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining scheduler and subagent pools");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

/// Periodic maintenance pass enforcing the `done`/`cancelled` task
/// retention window, alongside the scheduler's own tick loop.
async fn run_todo_retention(todos: Arc<TodoManager>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(TODO_PURGE_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match todos.purge_old() {
                    Ok(n) if n > 0 => info!(count = n, "purged stale done/cancelled tasks"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "task retention pass failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
