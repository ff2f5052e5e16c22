use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for container operations
pub type DiResult<T> = Result<T, DiError>;

/// Errors raised while registering or resolving services
#[derive(Debug, Error)]
pub enum DiError {
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    #[error("Dependency loop detected: {path} (loop at: {service})")]
    DependencyLoop { path: String, service: String },

    #[error("Injectable '{injectable}' is not marked as a service; call .service(..) on its descriptor")]
    ServiceWithoutDecorator { injectable: String },

    #[error("'{injectable}' is neither a class nor a factory and cannot be registered; use Container::define for pre-built instances")]
    NonInjectableType { injectable: String },

    #[error("Invalid service type '{injectable}': {reason}")]
    InvalidServiceType { injectable: String, reason: String },

    #[error("Scope mismatch: {service_scope} service '{service}' cannot depend on {dependency_scope} service '{dependency}'")]
    ScopeMismatch {
        service: String,
        service_scope: String,
        dependency: String,
        dependency_scope: String,
    },

    #[error("Failed to create service '{service}': {source}")]
    ServiceCreationFailed {
        service: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Service '{service}' did not finish within {timeout:?}")]
    Timeout { service: String, timeout: Duration },

    #[error("Lock error on resource: {resource}")]
    LockError { resource: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DiError {
    /// Create a service not found error
    pub fn service_not_found(service: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service: service.into(),
        }
    }

    /// Create an invalid service type error
    pub fn invalid_service_type(injectable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServiceType {
            injectable: injectable.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failure raised by a factory, initializer or finalizer
    pub fn creation_failed(
        service: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ServiceCreationFailed {
            service: service.into(),
            source: source.into(),
        }
    }

    pub(crate) fn lock(resource: impl Into<String>) -> Self {
        Self::LockError {
            resource: resource.into(),
        }
    }

    /// Check if the error is a missing service
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Check if the error is a dependency loop
    pub fn is_dependency_loop(&self) -> bool {
        matches!(self, Self::DependencyLoop { .. })
    }

    /// Check if the error is a scope compatibility violation
    pub fn is_scope_mismatch(&self) -> bool {
        matches!(self, Self::ScopeMismatch { .. })
    }

    /// Check if the error was raised by registration-time misuse
    pub fn is_registration(&self) -> bool {
        matches!(
            self,
            Self::ServiceWithoutDecorator { .. }
                | Self::NonInjectableType { .. }
                | Self::InvalidServiceType { .. }
        )
    }
}
