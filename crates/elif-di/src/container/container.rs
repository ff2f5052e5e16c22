use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;

use crate::config::ContainerConfig;
use crate::container::descriptor::{ServiceDependency, ServiceId, ServiceType};
use crate::container::injectable::{ClassInjectable, Injectable, ServiceInfo};
use crate::container::instance::Instance;
use crate::container::interceptor::{Blocking, BlockingInterceptor, Interceptor};
use crate::container::lifecycle::FinalizerStack;
use crate::container::parse::parse_service_spec;
use crate::container::registry::ServiceRegistry;
use crate::container::resolver::ResolutionPath;
use crate::container::scope::ServiceScope;
use crate::container::spec::{ConstructionStrategy, ServiceDefinition, ServiceSpec};
use crate::error::{DiError, DiResult};

/// Async dependency injection container
///
/// Services are registered up front through `&mut self`; resolution only
/// needs `&self`, so a fully registered container is typically wrapped in an
/// `Arc` and shared between tasks.
#[derive(Debug)]
pub struct Container {
    pub(crate) registry: ServiceRegistry,
    /// Singleton and defined instances
    pub(crate) store: RwLock<HashMap<ServiceId, Instance>>,
    /// One async lock per singleton key, held while it is first built
    pub(crate) construction_locks: Mutex<HashMap<ServiceId, Arc<tokio::sync::Mutex<()>>>>,
    pub(crate) finalizers: FinalizerStack,
    /// Keys resolved by `run_startup`, in registration order
    startup: Vec<ServiceId>,
    pub(crate) interceptors: Vec<ServiceId>,
    config: ContainerConfig,
}

impl Container {
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            registry: ServiceRegistry::new(),
            store: RwLock::new(HashMap::new()),
            construction_locks: Mutex::new(HashMap::new()),
            finalizers: FinalizerStack::new(),
            startup: Vec::new(),
            interceptors: Vec::new(),
            config,
        }
    }

    /// Create a container configured from `ELIF_DI_*` environment variables
    pub fn from_env() -> DiResult<Self> {
        Ok(Self::with_config(ContainerConfig::from_env()?))
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Register a service descriptor
    ///
    /// A later registration under the same type and name replaces the earlier
    /// one, including any instance already cached for it. Scope compatibility
    /// is checked against whatever is already registered, in both directions.
    pub fn register(&mut self, injectable: impl Into<Injectable>) -> DiResult<()> {
        let injectable = injectable.into();
        if injectable.is_value() {
            return Err(DiError::NonInjectableType {
                injectable: injectable.label().to_string(),
            });
        }
        if !injectable.is_service() {
            return Err(DiError::ServiceWithoutDecorator {
                injectable: injectable.label().to_string(),
            });
        }

        let spec = parse_service_spec(injectable)?;
        self.check_registration_scopes(&spec)?;

        let id = spec.id();
        let startup = spec.startup;
        tracing::debug!(
            service = %id,
            scope = %spec.scope,
            provider = %spec.kind(),
            implementation = spec.implementation,
            "service registered"
        );

        if self.registry.register(spec).is_some() {
            self.store
                .get_mut()
                .map_err(|_| DiError::lock("service_instances"))?
                .remove(&id);
        }

        if startup {
            if !self.startup.contains(&id) {
                self.startup.push(id);
            }
        } else {
            self.startup.retain(|existing| existing != &id);
        }

        Ok(())
    }

    fn check_registration_scopes(&self, spec: &ServiceSpec) -> DiResult<()> {
        for (_, dependency) in &spec.dependencies {
            self.check_scope(spec, dependency)?;
        }

        let id = spec.id();
        for dependent in self.registry.specs() {
            let depends_on_new = dependent.dependencies.iter().any(|(_, dep)| dep.id == id);
            if depends_on_new && !dependent.scope.accepts(spec.scope) {
                return Err(DiError::ScopeMismatch {
                    service: dependent.id().to_string(),
                    service_scope: dependent.scope.to_string(),
                    dependency: id.to_string(),
                    dependency_scope: spec.scope.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Store a pre-built instance as the default provider of `I`
    pub fn define<I: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<I>) -> DiResult<()> {
        self.define_id(ServiceId::of::<I>(), Instance::new(value))
    }

    pub fn define_named<I: ?Sized + Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        value: Arc<I>,
    ) -> DiResult<()> {
        self.define_id(ServiceId::named::<I>(name), Instance::new(value))
    }

    fn define_id(&mut self, id: ServiceId, instance: Instance) -> DiResult<()> {
        tracing::debug!(service = %id, "service defined");
        self.store
            .get_mut()
            .map_err(|_| DiError::lock("service_instances"))?
            .insert(id, instance);
        Ok(())
    }

    /// Register an interceptor built from `T::default()`
    pub fn register_interceptor<T: Interceptor + Default>(&mut self) -> DiResult<()> {
        self.register_interceptor_with(ClassInjectable::<dyn Interceptor, T>::with_interface(|i| i))
    }

    /// Register a synchronous interceptor, run on the blocking thread pool
    pub fn register_blocking_interceptor<T: BlockingInterceptor + Default>(
        &mut self,
    ) -> DiResult<()> {
        self.register_interceptor::<Blocking<T>>()
    }

    /// Register an interceptor whose descriptor declares its own dependencies
    pub fn register_interceptor_with<T: Interceptor + Default>(
        &mut self,
        interceptor: ClassInjectable<dyn Interceptor, T>,
    ) -> DiResult<()> {
        let name = std::any::type_name::<T>();
        self.register(interceptor.service(ServiceInfo::new().named(name)))?;

        let id = ServiceId::named::<dyn Interceptor>(name);
        if !self.interceptors.contains(&id) {
            self.interceptors.push(id);
        }
        tracing::debug!(interceptor = name, "interceptor registered");
        Ok(())
    }

    /// Get the default provider of `I`
    pub async fn get<I: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<I>> {
        self.require::<I>(ServiceDependency::of::<I>()).await
    }

    /// Get the provider of `I` registered under `name`
    pub async fn get_named<I: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<I>> {
        self.require::<I>(ServiceDependency::named::<I>(name)).await
    }

    /// Like [`get`](Self::get), with `None` when no provider is registered
    pub async fn get_optional<I: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<I>>> {
        self.resolve::<I>(ServiceDependency::of::<I>().optional()).await
    }

    pub async fn get_optional_named<I: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> DiResult<Option<Arc<I>>> {
        self.resolve::<I>(ServiceDependency::named::<I>(name).optional()).await
    }

    /// Resolve an arbitrary dependency and view the result as `I`
    ///
    /// Returns `None` only for an optional dependency with no provider. A
    /// provider registered under a type other than `I` is reported as not
    /// found.
    pub async fn resolve<I: ?Sized + Send + Sync + 'static>(
        &self,
        dependency: ServiceDependency,
    ) -> DiResult<Option<Arc<I>>> {
        let Some(instance) = self.resolve_instance(&dependency).await? else {
            return Ok(None);
        };

        instance.downcast::<I>().map(Some).ok_or_else(|| {
            DiError::service_not_found(format!(
                "{} as {} (registered as {})",
                dependency.id,
                std::any::type_name::<I>(),
                instance.type_name()
            ))
        })
    }

    async fn require<I: ?Sized + Send + Sync + 'static>(
        &self,
        dependency: ServiceDependency,
    ) -> DiResult<Arc<I>> {
        let id = dependency.id.clone();
        self.resolve::<I>(dependency)
            .await?
            .ok_or_else(|| DiError::service_not_found(id.to_string()))
    }

    /// Check whether a default provider or defined instance of `I` exists
    pub fn has<I: ?Sized + 'static>(&self) -> bool {
        self.has_id(&ServiceId::of::<I>())
    }

    pub fn has_named<I: ?Sized + 'static>(&self, name: &str) -> bool {
        self.has_id(&ServiceId::named::<I>(name))
    }

    fn has_id(&self, id: &ServiceId) -> bool {
        self.registry.contains(id) || self.is_cached(id)
    }

    /// Whether an instance for `id` is held by the container
    pub fn is_cached(&self, id: &ServiceId) -> bool {
        self.cached(id).map(|cached| cached.is_some()).unwrap_or(false)
    }

    /// Providers registered for `I` as `(name, definition)`
    pub fn iter_service<I: ?Sized + 'static>(&self) -> DiResult<Vec<(Option<String>, ServiceDefinition)>> {
        let providers = self.registry.list_providers(&ServiceType::of::<I>());
        if providers.is_empty() {
            return Err(DiError::service_not_found(std::any::type_name::<I>()));
        }
        Ok(providers)
    }

    /// Every registered provider as `(name, definition)`
    pub fn iter_all_services(&self) -> Vec<(Option<String>, ServiceDefinition)> {
        self.registry.list_all()
    }

    /// Check the registered graph without constructing anything
    ///
    /// Reports missing required dependencies, scope violations and loops that
    /// can never resolve (every member is a factory or a transient class).
    pub fn validate(&self) -> Result<(), Vec<DiError>> {
        let mut errors = Vec::new();

        for spec in self.registry.specs() {
            for (_, dependency) in &spec.dependencies {
                if !dependency.optional && !self.has_id(&dependency.id) {
                    errors.push(DiError::service_not_found(format!(
                        "{} (required by {})",
                        dependency.id,
                        spec.id()
                    )));
                    continue;
                }
                if let Err(error) = self.check_scope(spec, dependency) {
                    errors.push(error);
                }
            }
        }

        let mut reported = HashSet::new();
        for spec in self.registry.specs() {
            let mut path = ResolutionPath::new();
            if let Some(error) = self.find_loop(spec, &mut path, &mut reported) {
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Depth-first search for loops among services that are never cached
    /// before their dependencies are resolved
    fn find_loop(
        &self,
        spec: &ServiceSpec,
        path: &mut ResolutionPath,
        reported: &mut HashSet<ServiceId>,
    ) -> Option<DiError> {
        let eager = matches!(spec.strategy, ConstructionStrategy::Factory(_))
            || spec.scope == ServiceScope::Transient;
        if !eager {
            return None;
        }

        let id = spec.id();
        if path.contains(&id) {
            if !reported.insert(id.clone()) {
                return None;
            }
            path.push(id.clone());
            let error = DiError::DependencyLoop {
                path: path.path_string(),
                service: id.to_string(),
            };
            path.pop();
            return Some(error);
        }

        path.push(id);
        let mut found = None;
        for (_, dependency) in &spec.dependencies {
            if let Some(next) = self.registry.get(&dependency.id) {
                found = self.find_loop(next, path, reported);
                if found.is_some() {
                    break;
                }
            }
        }
        path.pop();
        found
    }

    /// Eagerly resolve every service marked `startup`, in registration order
    pub async fn run_startup(&self) -> DiResult<()> {
        if self.config.validate_on_startup {
            if let Err(errors) = self.validate() {
                for error in &errors {
                    tracing::error!(error = %error, "container validation failed");
                }
                if let Some(first) = errors.into_iter().next() {
                    return Err(first);
                }
            }
        }

        tracing::info!(count = self.startup.len(), "running startup services");

        for id in &self.startup {
            let dependency = ServiceDependency::new(id.clone(), false);
            let pending = self.resolve_instance(&dependency);
            match self.config.startup_timeout() {
                Some(limit) => match tokio::time::timeout(limit, pending).await {
                    Ok(result) => {
                        result?;
                    }
                    Err(_) => {
                        tracing::warn!(service = %id, timeout = ?limit, "startup service timed out");
                        return Err(DiError::Timeout {
                            service: id.to_string(),
                            timeout: limit,
                        });
                    }
                },
                None => {
                    pending.await?;
                }
            }
        }

        Ok(())
    }

    /// Run pending finalizers last-in first-out and return how many failed
    ///
    /// Failures are logged and do not stop teardown; calling this again with
    /// nothing new constructed is a no-op.
    pub async fn run_finalizers(&self) -> DiResult<usize> {
        tracing::info!(count = self.finalizers.len(), "running finalizers");
        let failed = self
            .finalizers
            .run_all(self.config.finalizer_timeout())
            .await?;
        if failed > 0 {
            tracing::warn!(failed, "finalizers completed with failures");
        }
        Ok(failed)
    }

    /// Keys resolved by `run_startup`, in order
    pub fn startup_services(&self) -> &[ServiceId] {
        &self.startup
    }

    /// Get service statistics for monitoring and debugging
    pub fn statistics(&self) -> ContainerStatistics {
        let mut stats = ContainerStatistics {
            total_services: self.registry.len(),
            startup_services: self.startup.len(),
            interceptors: self.interceptors.len(),
            pending_finalizers: self.finalizers.len(),
            ..ContainerStatistics::default()
        };

        for spec in self.registry.specs() {
            match spec.scope {
                ServiceScope::Singleton => stats.singleton_services += 1,
                ServiceScope::Dependent => stats.dependent_services += 1,
                ServiceScope::Transient => stats.transient_services += 1,
            }
        }

        if let Ok(store) = self.store.read() {
            stats.cached_instances = store.len();
        }

        stats
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Service statistics for monitoring and debugging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerStatistics {
    pub total_services: usize,
    pub singleton_services: usize,
    pub dependent_services: usize,
    pub transient_services: usize,
    /// Singletons built so far plus defined instances
    pub cached_instances: usize,
    pub startup_services: usize,
    pub interceptors: usize,
    pub pending_finalizers: usize,
}
