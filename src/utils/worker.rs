use crate::models::error::SError;
use tokio::task::spawn_blocking;

/// Runs blocking filesystem work on tokio's blocking pool so async callers never stall.
pub async fn run_blocking<F, R>(f: F) -> Result<R, SError>
where
    F: FnOnce() -> Result<R, SError> + Send + 'static,
    R: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| SError::Unexpected(Some(format!("Worker task failed: {e}"))))?
}
