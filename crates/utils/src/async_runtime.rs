use pdict_core::{Error, Result};
use std::future::Future;
use tokio::runtime::{Builder, Runtime};

/// Async runtime manager that avoids creating runtime in async contexts
pub struct AsyncRuntime {
    runtime: Option<Runtime>,
}

impl AsyncRuntime {
    /// Create a new async runtime manager
    #[must_use]
    pub fn new() -> Self {
        Self { runtime: None }
    }

    /// Get or create a runtime
    fn get_or_create_runtime(&mut self) -> Result<&Runtime> {
        if self.runtime.is_none() {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| Error::runtime(format!("failed to create tokio runtime: {e}")))?;
            self.runtime = Some(runtime);
        }

        self.runtime
            .as_ref()
            .ok_or_else(|| Error::runtime("runtime unexpectedly missing after initialization"))
    }

    /// Execute an async function on the private runtime
    pub fn block_on<F, T>(&mut self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let runtime = self.get_or_create_runtime()?;

        runtime.block_on(future)
    }

    /// Check if we're already in an async context
    #[must_use]
    pub fn is_in_async_context() -> bool {
        tokio::runtime::Handle::try_current().is_ok()
    }
}

impl Default for AsyncRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a future on the current runtime without waiting for it.
///
/// Failures are logged under `operation`. Returns `false` when no runtime is
/// running, in which case nothing was spawned.
pub fn spawn_detached<F>(operation: &'static str, future: F) -> bool
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = future.await {
                    tracing::error!("Background {} failed: {}", operation, e);
                }
            });
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_context_execution() -> Result<()> {
        let mut runtime = AsyncRuntime::new();

        let result = runtime.block_on(async { Ok::<i32, Error>(42) });

        assert_eq!(result?, 42);

        Ok(())
    }

    #[tokio::test]
    async fn test_detects_async_context() {
        assert!(AsyncRuntime::is_in_async_context());
    }

    #[test]
    fn test_outside_async_context() {
        assert!(!AsyncRuntime::is_in_async_context());
    }

    #[tokio::test]
    async fn test_spawn_detached_runs_inside_runtime() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let spawned = spawn_detached("test", async move {
            let _ = tx.send(7);
            Ok(())
        });
        assert!(spawned);
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[test]
    fn test_spawn_detached_without_runtime() {
        assert!(!spawn_detached("test", async { Ok(()) }));
    }
}
