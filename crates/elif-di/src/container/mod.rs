#[allow(clippy::module_inception)]
pub mod container;
pub mod descriptor;
pub mod injectable;
pub mod instance;
pub mod interceptor;
pub mod lifecycle;
pub mod parse;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod spec;

pub use container::{Container, ContainerStatistics};
pub use descriptor::{ServiceDependency, ServiceId, ServiceType};
pub use injectable::{ClassInjectable, FactoryInjectable, Injectable, Resource, ServiceInfo};
pub use instance::{Inject, Instance};
pub use interceptor::{Blocking, BlockingInterceptor, Interceptor};
pub use lifecycle::{AsyncInitializable, BoxFuture, Disposable, Finalizer, FinalizerStack};
pub use parse::parse_service_spec;
pub use registry::{LookupMiss, ServiceRegistry};
pub use resolver::ResolutionPath;
pub use scope::ServiceScope;
pub use spec::{ProviderKind, ResolvedDependencies, ServiceDefinition, ServiceSpec};
