use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use fern_backend::AgentCoordinator;
use fern_channels::ChannelManager;
use fern_core::FernConfig;
use fern_memory::MemoryStore;
use fern_scheduler::SchedulerHandle;
use fern_sessions::TodoManager;
use fern_subagent::SubagentManager;

/// Central shared state, passed as `Arc<AppState>` to every handler.
///
/// Each field is the entry point into one component from §4 of the system
/// design: the turn coordinator, memory archivist, scheduler, subagent
/// manager, thread-scoped checklists, and outbound channel adapters.
pub struct AppState {
    pub config: FernConfig,
    pub coordinator: Arc<AgentCoordinator>,
    pub memory: Arc<MemoryStore>,
    pub scheduler: SchedulerHandle,
    pub subagent: Arc<SubagentManager>,
    pub todos: Arc<TodoManager>,
    pub channels: ChannelManager,
}

impl AppState {
    pub fn new(
        config: FernConfig,
        coordinator: Arc<AgentCoordinator>,
        memory: Arc<MemoryStore>,
        scheduler: SchedulerHandle,
        subagent: Arc<SubagentManager>,
        todos: Arc<TodoManager>,
        channels: ChannelManager,
    ) -> Self {
        Self {
            config,
            coordinator,
            memory,
            scheduler,
            subagent,
            todos,
            channels,
        }
    }
}

/// Assemble the full Axum router.
///
/// `/health` is unauthenticated. `/api/*` and `/internal/*` sit behind the
/// `X-Fern-Secret` guard from [`crate::auth`]. `/webhooks/{channel}` is
/// reached directly by external transports, which cannot supply that header
/// — it authenticates itself per-request via the transport's own signature
/// header instead (see [`crate::http::webhooks`]).
pub fn build_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route("/api/chat", post(crate::http::chat::chat_handler))
        .route("/internal/memory/write", post(crate::http::memory::write_handler))
        .route("/internal/memory/search", post(crate::http::memory::search_handler))
        .route("/internal/memory/read", post(crate::http::memory::read_handler))
        .route("/internal/memory/delete/{id}", delete(crate::http::memory::delete_handler))
        .route("/internal/scheduler/create", post(crate::http::scheduler::create_handler))
        .route("/internal/scheduler/list", post(crate::http::scheduler::list_handler))
        .route("/internal/scheduler/get/{id}", get(crate::http::scheduler::get_handler))
        .route("/internal/scheduler/cancel/{id}", post(crate::http::scheduler::cancel_handler))
        .route("/internal/subagent/spawn", post(crate::http::subagent::spawn_handler))
        .route("/internal/subagent/get/{id}", get(crate::http::subagent::get_handler))
        .route("/internal/subagent/cancel/{id}", post(crate::http::subagent::cancel_handler))
        .route("/internal/channel/send", post(crate::http::channel::send_handler))
        .route("/internal/tasks/create", post(crate::http::tasks::create_handler))
        .route("/internal/tasks/list", post(crate::http::tasks::list_handler))
        .route("/internal/tasks/update/{id}", post(crate::http::tasks::update_handler))
        .route("/internal/tasks/next", get(crate::http::tasks::next_handler))
        .layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_secret));

    let webhooks = Router::new()
        .route("/webhooks/{channel}", post(crate::http::webhooks::webhook_handler));

    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .merge(guarded)
        .merge(webhooks)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
