use std::sync::Arc;

use async_trait::async_trait;

use crate::container::descriptor::ServiceId;
use crate::container::instance::Instance;
use crate::error::{DiError, DiResult};

/// Hook invoked after every service is constructed
///
/// Interceptors are themselves services, registered under `dyn Interceptor`
/// and resolved through the container, so they may have dependencies of
/// their own. They observe the instance; the cached reference is never
/// replaced. An error aborts the resolution that produced the instance.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    async fn intercept(&self, instance: &Instance, service: &ServiceId) -> DiResult<()>;
}

/// Synchronous interceptor hook
pub trait BlockingInterceptor: Send + Sync + 'static {
    fn intercept(&self, instance: &Instance, service: &ServiceId) -> DiResult<()>;
}

/// Runs a [`BlockingInterceptor`] on the blocking thread pool
#[derive(Default)]
pub struct Blocking<T>(Arc<T>);

impl<T> Blocking<T> {
    pub fn new(hook: T) -> Self {
        Self(Arc::new(hook))
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

#[async_trait]
impl<T: BlockingInterceptor> Interceptor for Blocking<T> {
    async fn intercept(&self, instance: &Instance, service: &ServiceId) -> DiResult<()> {
        let hook = self.0.clone();
        let instance = instance.clone();
        let target = service.clone();
        tokio::task::spawn_blocking(move || hook.intercept(&instance, &target))
            .await
            .map_err(|e| DiError::creation_failed(service.to_string(), e))?
    }
}
