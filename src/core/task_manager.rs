use tokio::runtime::{Handle, Runtime};

/// Worker runtime for blocking network calls. The UI thread stays
/// synchronous and only talks to it through the completion bus.
pub fn build_worker_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("simkit-worker")
        .enable_all()
        .build()
}

/// Run `func` on the blocking pool of `handle`.
pub fn spawn_blocking_task<F, R>(handle: &Handle, func: F) -> tokio::task::JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    handle.spawn_blocking(func)
}
