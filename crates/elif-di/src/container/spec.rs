use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::{ServiceDependency, ServiceId, ServiceType};
use crate::container::instance::Instance;
use crate::container::lifecycle::{BoxFuture, Finalizer};
use crate::container::scope::ServiceScope;
use crate::error::{DiError, DiResult};

/// How instances of a service are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// A factory invoked with its dependencies already resolved
    Factory,
    /// A bare value populated through attribute injection
    Class,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Factory => f.write_str("factory"),
            ProviderKind::Class => f.write_str("class"),
        }
    }
}

/// Registration summary of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub provides: ServiceType,
    pub scope: ServiceScope,
    pub provider: ProviderKind,
    pub implementation: &'static str,
}

impl ServiceDefinition {
    /// Whether this provider may be injected into a service of `scope`
    pub fn accepts_scope(&self, scope: ServiceScope) -> bool {
        scope.accepts(self.scope)
    }
}

/// Dependencies handed to a factory, keyed by parameter name
#[derive(Debug, Clone)]
pub struct ResolvedDependencies {
    service: &'static str,
    values: HashMap<String, Option<Instance>>,
}

impl ResolvedDependencies {
    pub(crate) fn new(service: &'static str) -> Self {
        Self {
            service,
            values: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, parameter: String, value: Option<Instance>) {
        self.values.insert(parameter, value);
    }

    /// Typed access to a required dependency
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, parameter: &str) -> DiResult<Arc<T>> {
        let instance = self
            .values
            .get(parameter)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                DiError::service_not_found(format!(
                    "parameter '{}' of {}",
                    parameter, self.service
                ))
            })?;

        instance.downcast::<T>().ok_or_else(|| {
            DiError::service_not_found(format!(
                "parameter '{}' of {} as {} (registered as {})",
                parameter,
                self.service,
                std::any::type_name::<T>(),
                instance.type_name()
            ))
        })
    }

    /// Typed access to an optional dependency; `None` when it had no provider
    pub fn get_optional<T: ?Sized + Send + Sync + 'static>(&self, parameter: &str) -> Option<Arc<T>> {
        self.values
            .get(parameter)
            .and_then(Option::as_ref)
            .and_then(|instance| instance.downcast::<T>())
    }

    pub fn contains(&self, parameter: &str) -> bool {
        matches!(self.values.get(parameter), Some(Some(_)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub(crate) type FinalizerSeed = Box<dyn FnOnce(String) -> Finalizer + Send>;

/// Output of a factory: the value plus an optional teardown continuation
pub(crate) struct Constructed {
    pub instance: Instance,
    pub finalizer: Option<FinalizerSeed>,
}

pub(crate) type FactoryFn =
    Arc<dyn Fn(ResolvedDependencies) -> BoxFuture<'static, DiResult<Constructed>> + Send + Sync>;
pub(crate) type Constructor = Arc<dyn Fn() -> (Instance, Arc<dyn Any + Send + Sync>) + Send + Sync>;
pub(crate) type Injector = Arc<dyn Fn(&(dyn Any + Send + Sync), &Instance) -> DiResult<()> + Send + Sync>;
pub(crate) type Hook =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> BoxFuture<'static, DiResult<()>> + Send + Sync>;

/// Dependencies resolved first, factory invoked, result cached only after
/// the factory has returned. Such services can never take part in a cycle.
pub(crate) struct FactoryStrategy {
    pub factory: FactoryFn,
}

/// Bare value constructed and cached immediately, then populated. Caching
/// before population is what lets two such services depend on each other.
pub(crate) struct AttributeStrategy {
    pub construct: Constructor,
    /// Parallel to `ServiceSpec::dependencies`
    pub injectors: Vec<Injector>,
    pub initializer: Option<Hook>,
    pub finalizer: Option<Hook>,
}

pub(crate) enum ConstructionStrategy {
    Factory(FactoryStrategy),
    Attribute(AttributeStrategy),
}

/// Parsed, registrable description of a service
pub struct ServiceSpec {
    pub service: ServiceType,
    pub name: Option<String>,
    pub scope: ServiceScope,
    pub startup: bool,
    pub implementation: &'static str,
    /// Attribute or parameter name paired with the dependency, in declaration order
    pub dependencies: Vec<(String, ServiceDependency)>,
    pub(crate) strategy: ConstructionStrategy,
}

impl ServiceSpec {
    pub fn id(&self) -> ServiceId {
        ServiceId::new(self.service, self.name.clone())
    }

    pub fn kind(&self) -> ProviderKind {
        match self.strategy {
            ConstructionStrategy::Factory(_) => ProviderKind::Factory,
            ConstructionStrategy::Attribute(_) => ProviderKind::Class,
        }
    }

    pub fn definition(&self) -> ServiceDefinition {
        ServiceDefinition {
            provides: self.service,
            scope: self.scope,
            provider: self.kind(),
            implementation: self.implementation,
        }
    }

    pub fn has_initializer(&self) -> bool {
        matches!(&self.strategy, ConstructionStrategy::Attribute(a) if a.initializer.is_some())
    }

    pub fn has_finalizer(&self) -> bool {
        matches!(&self.strategy, ConstructionStrategy::Attribute(a) if a.finalizer.is_some())
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("service", &self.service)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("startup", &self.startup)
            .field("implementation", &self.implementation)
            .field("provider", &self.kind())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}
