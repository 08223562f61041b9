/// Fire-and-forget notification sent after a turn completes. Implemented
/// by the memory archivist; kept as a trait here (rather than a direct
/// dependency on `fern-memory`) so `fern-backend` doesn't need to know
/// about archival at all — it only needs somewhere to call back into.
pub trait ArchivalHook: Send + Sync {
    fn on_turn_complete(&self, thread_id: String, backend_session_id: String);
}
