use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{DiError, DiResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for services that need async initialization after injection
#[async_trait]
pub trait AsyncInitializable: Send + Sync {
    /// Initialize the service asynchronously
    async fn initialize(&self) -> Result<(), DiError>;
}

/// Trait for services that need proper disposal/cleanup at shutdown
#[async_trait]
pub trait Disposable: Send + Sync {
    /// Dispose of the service and clean up resources
    async fn dispose(&self) -> Result<(), DiError>;
}

type FinalizerAction = Box<dyn FnOnce() -> BoxFuture<'static, DiResult<()>> + Send>;

/// Deferred teardown action for one constructed service
pub struct Finalizer {
    service: String,
    action: FinalizerAction,
}

impl Finalizer {
    pub fn new<F, Fut>(service: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        Self {
            service: service.into(),
            action: Box::new(move || -> BoxFuture<'static, DiResult<()>> { Box::pin(action()) }),
        }
    }

    /// Finalizer whose body blocks; it runs on the blocking thread pool
    pub fn blocking<F>(service: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> DiResult<()> + Send + 'static,
    {
        let service = service.into();
        let label = service.clone();
        Self::new(service, move || async move {
            tokio::task::spawn_blocking(action)
                .await
                .map_err(|e| DiError::creation_failed(label, e))?
        })
    }

    /// Service the finalizer belongs to
    pub fn service(&self) -> &str {
        &self.service
    }

    async fn run(self) -> DiResult<()> {
        (self.action)().await
    }
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("service", &self.service)
            .finish()
    }
}

/// Finalizers in creation order, torn down last-in first-out
#[derive(Debug, Default)]
pub struct FinalizerStack {
    finalizers: Mutex<Vec<Finalizer>>,
}

impl FinalizerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, finalizer: Finalizer) -> DiResult<()> {
        self.finalizers
            .lock()
            .map_err(|_| DiError::lock("finalizers"))?
            .push(finalizer);
        Ok(())
    }

    /// Number of finalizers waiting to run
    pub fn len(&self) -> usize {
        self.finalizers.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every pending finalizer in reverse order and clear the stack
    ///
    /// Failures and timeouts are logged and do not stop the remaining
    /// finalizers. Returns how many finalizers failed. Running an empty stack
    /// is a no-op.
    pub async fn run_all(&self, timeout: Option<Duration>) -> DiResult<usize> {
        let pending = {
            let mut finalizers = self
                .finalizers
                .lock()
                .map_err(|_| DiError::lock("finalizers"))?;
            std::mem::take(&mut *finalizers)
        };

        let mut failed = 0;

        for finalizer in pending.into_iter().rev() {
            let service = finalizer.service.clone();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, finalizer.run()).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(service = %service, timeout = ?limit, "finalizer timed out");
                        failed += 1;
                        continue;
                    }
                },
                None => finalizer.run().await,
            };

            if let Err(error) = outcome {
                tracing::error!(service = %service, error = %error, "finalizer failed");
                failed += 1;
            }
        }

        Ok(failed)
    }
}
