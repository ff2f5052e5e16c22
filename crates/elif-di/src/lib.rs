//! Async dependency injection for elif.rs applications
//!
//! Services are described with [`ClassInjectable`] or [`FactoryInjectable`],
//! marked with [`ServiceInfo`] and registered on a [`Container`], which
//! resolves them by interface type and optional name:
//!
//! ```no_run
//! use std::sync::Arc;
//! use elif_di::{Container, FactoryInjectable, ServiceInfo};
//!
//! # async fn run() -> Result<(), elif_di::DiError> {
//! let mut container = Container::new();
//! container.register(
//!     FactoryInjectable::<String>::new(|_| async { Ok(Arc::new("postgres://db".to_string())) })
//!         .service(ServiceInfo::new().startup()),
//! )?;
//!
//! container.run_startup().await?;
//! let dsn = container.get::<String>().await?;
//! assert_eq!(dsn.as_str(), "postgres://db");
//! container.run_finalizers().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod container;
pub mod error;

pub use config::{ConfigError, ContainerConfig};
pub use container::{
    AsyncInitializable, Blocking, BlockingInterceptor, ClassInjectable, Container, ContainerStatistics, Disposable,
    FactoryInjectable, Inject, Injectable, Instance, Interceptor, ProviderKind, Resource,
    ResolvedDependencies, ServiceDefinition, ServiceDependency, ServiceId, ServiceInfo,
    ServiceScope, ServiceSpec, ServiceType,
};
pub use error::{DiError, DiResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
