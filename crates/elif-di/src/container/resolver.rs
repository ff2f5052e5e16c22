use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::container::container::Container;
use crate::container::descriptor::{ServiceDependency, ServiceId};
use crate::container::instance::Instance;
use crate::container::interceptor::Interceptor;
use crate::container::lifecycle::{BoxFuture, Finalizer};
use crate::container::registry::LookupMiss;
use crate::container::scope::ServiceScope;
use crate::container::spec::{
    AttributeStrategy, ConstructionStrategy, ResolvedDependencies, ServiceSpec,
};
use crate::error::{DiError, DiResult};

/// Dependency resolution path for error reporting
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    pub services: Vec<ServiceId>,
}

impl ResolutionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service to the resolution path
    pub fn push(&mut self, service_id: ServiceId) {
        self.services.push(service_id);
    }

    /// Remove the last service from the resolution path
    pub fn pop(&mut self) -> Option<ServiceId> {
        self.services.pop()
    }

    /// Check if the path contains a service (for cycle detection)
    pub fn contains(&self, service_id: &ServiceId) -> bool {
        self.services.contains(service_id)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Get the path as a string for error messages
    pub fn path_string(&self) -> String {
        self.services
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// State of one top-level resolution request
///
/// Dependent-scoped instances live here, so every `get` call gets its own
/// set and nested lookups within the call share it.
///
/// Singletons built while an attribute-injected service is still being
/// populated are held in `singletons` together with their construction
/// locks, and only reach the shared store once the outermost population
/// finishes. Dropping the context (an error or a cancelled future) releases
/// the locks and publishes nothing.
#[derive(Debug)]
pub(crate) struct ResolutionContext {
    pub id: Uuid,
    pub path: ResolutionPath,
    pub dependents: HashMap<ServiceId, Instance>,
    pub singletons: HashMap<ServiceId, Instance>,
    /// Attribute-injected instances currently being populated
    pub populating: usize,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            path: ResolutionPath::new(),
            dependents: HashMap::new(),
            singletons: HashMap::new(),
            populating: 0,
            guards: Vec::new(),
        }
    }

    /// Instance built earlier in this request and not yet shared
    fn local(&self, id: &ServiceId) -> Option<Instance> {
        self.singletons
            .get(id)
            .or_else(|| self.dependents.get(id))
            .cloned()
    }
}

impl Container {
    /// Resolve a dependency with a fresh resolution context
    pub(crate) async fn resolve_instance(
        &self,
        dependency: &ServiceDependency,
    ) -> DiResult<Option<Instance>> {
        let mut ctx = ResolutionContext::new();
        tracing::trace!(request = %ctx.id, service = %dependency.id, "resolving service");
        self.resolve_in(dependency, &mut ctx).await
    }

    /// Resolve within an ongoing request. `None` only for an optional
    /// dependency without provider.
    pub(crate) fn resolve_in<'a>(
        &'a self,
        dependency: &'a ServiceDependency,
        ctx: &'a mut ResolutionContext,
    ) -> BoxFuture<'a, DiResult<Option<Instance>>> {
        Box::pin(async move {
            let id = &dependency.id;

            if let Some(instance) = self.cached(id)? {
                return Ok(Some(instance));
            }
            if let Some(instance) = ctx.local(id) {
                return Ok(Some(instance));
            }

            let spec = match self.registry.lookup(&id.service, id.name()) {
                Ok(spec) => spec.clone(),
                Err(_) if dependency.optional => return Ok(None),
                Err(miss) => return Err(not_found(id, miss)),
            };

            if ctx.path.contains(id) {
                let mut path = ctx.path.clone();
                path.push(id.clone());
                return Err(DiError::DependencyLoop {
                    path: path.path_string(),
                    service: id.to_string(),
                });
            }

            ctx.path.push(id.clone());
            let outcome = self.construct(&spec, ctx).await;
            ctx.path.pop();

            let (instance, created) = outcome?;
            if created {
                self.run_interceptors(&instance, id, ctx).await?;
            }
            Ok(Some(instance))
        })
    }

    /// Build an instance, serialising first-time construction of singletons.
    /// The flag is `false` when another task finished the singleton first.
    ///
    /// A singleton's lock is held until it is published, so other tasks
    /// wait for a fully populated instance instead of seeing a bare one.
    async fn construct(
        &self,
        spec: &Arc<ServiceSpec>,
        ctx: &mut ResolutionContext,
    ) -> DiResult<(Instance, bool)> {
        let id = spec.id();

        if !spec.scope.is_singleton() {
            return Ok((self.build(spec, &id, ctx).await?, true));
        }

        let guard = self.construction_lock(&id)?.lock_owned().await;
        if let Some(instance) = self.cached(&id)? {
            return Ok((instance, false));
        }

        let instance = self.build(spec, &id, ctx).await?;
        ctx.singletons.insert(id, instance.clone());
        ctx.guards.push(guard);
        if ctx.populating == 0 {
            self.publish(ctx)?;
        }
        Ok((instance, true))
    }

    /// Move every finished singleton of this request into the shared store
    /// and release their construction locks
    fn publish(&self, ctx: &mut ResolutionContext) -> DiResult<()> {
        {
            let mut store = self
                .store
                .write()
                .map_err(|_| DiError::lock("service_instances"))?;
            for (id, instance) in ctx.singletons.drain() {
                tracing::trace!(service = %id, request = %ctx.id, "singleton published");
                store.insert(id, instance);
            }
        }
        ctx.guards.clear();
        Ok(())
    }

    async fn build(
        &self,
        spec: &Arc<ServiceSpec>,
        id: &ServiceId,
        ctx: &mut ResolutionContext,
    ) -> DiResult<Instance> {
        let instance = match &spec.strategy {
            ConstructionStrategy::Factory(strategy) => {
                let dependencies = self.resolve_dependencies(spec, ctx).await?;
                let constructed = (strategy.factory)(dependencies).await?;
                if spec.scope == ServiceScope::Dependent {
                    ctx.dependents.insert(id.clone(), constructed.instance.clone());
                }
                if let Some(seed) = constructed.finalizer {
                    self.finalizers.push(seed(id.to_string()))?;
                }
                constructed.instance
            }
            ConstructionStrategy::Attribute(strategy) => {
                let (instance, target) = (strategy.construct)();
                self.stage(spec, id, &instance, ctx);

                ctx.populating += 1;
                let populated = self.populate(spec, strategy, id, target, ctx).await;
                ctx.populating -= 1;

                if let Err(error) = populated {
                    ctx.singletons.remove(id);
                    ctx.dependents.remove(id);
                    return Err(error);
                }
                if ctx.populating == 0 && !spec.scope.is_singleton() {
                    self.publish(ctx)?;
                }
                instance
            }
        };

        tracing::trace!(
            service = %id,
            scope = %spec.scope,
            strategy = %spec.kind(),
            request = %ctx.id,
            "service created"
        );
        Ok(instance)
    }

    async fn resolve_dependencies(
        &self,
        spec: &ServiceSpec,
        ctx: &mut ResolutionContext,
    ) -> DiResult<ResolvedDependencies> {
        let mut resolved = ResolvedDependencies::new(spec.implementation);
        for (parameter, dependency) in &spec.dependencies {
            self.check_scope(spec, dependency)?;
            let value = self.resolve_in(dependency, ctx).await?;
            resolved.insert(parameter.clone(), value);
        }
        Ok(resolved)
    }

    /// Inject attributes into a staged bare value, then initialise it
    async fn populate(
        &self,
        spec: &ServiceSpec,
        strategy: &AttributeStrategy,
        id: &ServiceId,
        target: Arc<dyn std::any::Any + Send + Sync>,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        for ((_, dependency), injector) in spec.dependencies.iter().zip(&strategy.injectors) {
            self.check_scope(spec, dependency)?;
            if let Some(value) = self.resolve_in(dependency, ctx).await? {
                injector(&*target, &value)?;
            }
        }

        if let Some(initializer) = &strategy.initializer {
            initializer(target.clone()).await?;
        }

        if let Some(finalizer) = &strategy.finalizer {
            let hook = finalizer.clone();
            self.finalizers
                .push(Finalizer::new(id.to_string(), move || hook(target)))?;
        }

        Ok(())
    }

    /// Fail if `spec` may not hold `dependency` given their scopes. Defined
    /// instances count as singletons; unknown dependencies are left to
    /// resolution.
    pub(crate) fn check_scope(
        &self,
        spec: &ServiceSpec,
        dependency: &ServiceDependency,
    ) -> DiResult<()> {
        let defined = self.is_cached(&dependency.id) && !self.registry.contains(&dependency.id);
        let dependency_scope = if defined {
            ServiceScope::Singleton
        } else {
            match self.registry.get(&dependency.id) {
                Some(registered) => registered.scope,
                None => return Ok(()),
            }
        };

        if spec.scope.accepts(dependency_scope) {
            Ok(())
        } else {
            Err(DiError::ScopeMismatch {
                service: spec.id().to_string(),
                service_scope: spec.scope.to_string(),
                dependency: dependency.id.to_string(),
                dependency_scope: dependency_scope.to_string(),
            })
        }
    }

    /// Make a bare attribute instance visible to the rest of this request
    /// so injection cycles close on it
    fn stage(
        &self,
        spec: &ServiceSpec,
        id: &ServiceId,
        instance: &Instance,
        ctx: &mut ResolutionContext,
    ) {
        match spec.scope {
            ServiceScope::Singleton => {
                ctx.singletons.insert(id.clone(), instance.clone());
            }
            ServiceScope::Dependent => {
                ctx.dependents.insert(id.clone(), instance.clone());
            }
            ServiceScope::Transient => {}
        }
    }

    /// Run every registered interceptor over a freshly built instance.
    /// Interceptors still under construction in this request are skipped.
    async fn run_interceptors(
        &self,
        instance: &Instance,
        id: &ServiceId,
        ctx: &mut ResolutionContext,
    ) -> DiResult<()> {
        if id.service.is::<dyn Interceptor>() {
            return Ok(());
        }

        for interceptor_id in &self.interceptors {
            if ctx.path.contains(interceptor_id) {
                continue;
            }

            let dependency = ServiceDependency::new(interceptor_id.clone(), false);
            let interceptor = self
                .resolve_in(&dependency, ctx)
                .await?
                .and_then(|resolved| resolved.downcast::<dyn Interceptor>())
                .ok_or_else(|| DiError::service_not_found(interceptor_id.to_string()))?;

            interceptor.intercept(instance, id).await?;
        }

        Ok(())
    }

    pub(crate) fn cached(&self, id: &ServiceId) -> DiResult<Option<Instance>> {
        let store = self
            .store
            .read()
            .map_err(|_| DiError::lock("service_instances"))?;
        Ok(store.get(id).cloned())
    }

    fn construction_lock(&self, id: &ServiceId) -> DiResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .construction_locks
            .lock()
            .map_err(|_| DiError::lock("construction_locks"))?;
        Ok(locks.entry(id.clone()).or_default().clone())
    }
}

fn not_found(id: &ServiceId, miss: LookupMiss) -> DiError {
    match miss {
        LookupMiss::NoProviders => DiError::service_not_found(id.to_string()),
        LookupMiss::NameNotFound { available } => {
            let available = available
                .iter()
                .map(|name| name.as_deref().unwrap_or("default"))
                .collect::<Vec<_>>()
                .join(", ");
            DiError::service_not_found(format!("{} (registered names: {})", id, available))
        }
    }
}
