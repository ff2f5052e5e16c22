//! Registration descriptors
//!
//! A service is described by a [`ClassInjectable`] (a `Default` value whose
//! `Inject<T>` fields are populated after construction) or a
//! [`FactoryInjectable`] (an async or blocking function receiving its
//! dependencies). Calling `.service(..)` attaches the [`ServiceInfo`] marker
//! and turns the descriptor into a registrable [`Injectable`].

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::container::descriptor::{ServiceDependency, ServiceId, ServiceType};
use crate::container::instance::{Inject, Instance};
use crate::container::lifecycle::{AsyncInitializable, BoxFuture, Disposable, Finalizer};
use crate::container::scope::ServiceScope;
use crate::container::spec::{
    Constructed, Constructor, FactoryFn, FinalizerSeed, Hook, Injector, ResolvedDependencies,
};
use crate::error::{DiError, DiResult};

/// Service metadata attached to a descriptor when it is marked as a service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: Option<String>,
    pub scope: ServiceScope,
    pub startup: bool,
}

impl ServiceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under a name instead of as the default provider
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn scope(mut self, scope: ServiceScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(ServiceScope::Singleton)
    }

    pub fn dependent(self) -> Self {
        self.scope(ServiceScope::Dependent)
    }

    pub fn transient(self) -> Self {
        self.scope(ServiceScope::Transient)
    }

    /// Resolve eagerly during [`Container::run_startup`](crate::Container::run_startup)
    pub fn startup(mut self) -> Self {
        self.startup = true;
        self
    }
}

pub(crate) struct ClassDeclaration {
    pub service: ServiceType,
    pub implementation: &'static str,
    pub construct: Constructor,
    pub dependencies: Vec<(String, ServiceDependency, Injector)>,
    pub initializer: Option<Hook>,
    pub finalizer: Option<Hook>,
}

pub(crate) struct FactoryDeclaration {
    pub service: ServiceType,
    pub implementation: &'static str,
    pub factory: FactoryFn,
    pub dependencies: Vec<(String, ServiceDependency)>,
}

pub(crate) enum InjectableKind {
    Class(ClassDeclaration),
    Factory(FactoryDeclaration),
    Value { type_name: &'static str },
}

/// Type-erased registrable descriptor
pub struct Injectable {
    pub(crate) kind: InjectableKind,
    pub(crate) info: Option<ServiceInfo>,
}

impl Injectable {
    /// Implementation name used in logs and errors
    pub fn label(&self) -> &'static str {
        match &self.kind {
            InjectableKind::Class(class) => class.implementation,
            InjectableKind::Factory(factory) => factory.implementation,
            InjectableKind::Value { type_name } => *type_name,
        }
    }

    /// Whether the descriptor carries service metadata
    pub fn is_service(&self) -> bool {
        self.info.is_some()
    }

    pub fn info(&self) -> Option<&ServiceInfo> {
        self.info.as_ref()
    }

    /// Key the descriptor registers under; `None` for values
    pub fn service_id(&self) -> Option<ServiceId> {
        let name = self.info.as_ref().and_then(|info| info.name.clone());
        match &self.kind {
            InjectableKind::Class(class) => Some(ServiceId::new(class.service, name)),
            InjectableKind::Factory(factory) => Some(ServiceId::new(factory.service, name)),
            InjectableKind::Value { .. } => None,
        }
    }

    pub(crate) fn is_value(&self) -> bool {
        matches!(self.kind, InjectableKind::Value { .. })
    }
}

impl std::fmt::Debug for Injectable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injectable")
            .field("label", &self.label())
            .field("info", &self.info)
            .finish()
    }
}

/// A pre-built value is not injectable; registering one is rejected
impl<T: Send + Sync + 'static> From<Arc<T>> for Injectable {
    fn from(_: Arc<T>) -> Self {
        Self {
            kind: InjectableKind::Value {
                type_name: std::any::type_name::<T>(),
            },
            info: None,
        }
    }
}

fn identity<T: ?Sized>(value: Arc<T>) -> Arc<T> {
    value
}

fn type_mismatch<T: ?Sized>() -> DiError {
    DiError::invalid_service_type(
        std::any::type_name::<T>(),
        "container handed a value of an unexpected type to this service",
    )
}

/// Descriptor for a service built by attribute injection
pub struct ClassInjectable<I: ?Sized, Impl> {
    cast: fn(Arc<Impl>) -> Arc<I>,
    dependencies: Vec<(String, ServiceDependency, Injector)>,
    initializer: Option<Hook>,
    finalizer: Option<Hook>,
}

impl<Impl> ClassInjectable<Impl, Impl>
where
    Impl: Default + Send + Sync + 'static,
{
    /// Describe `Impl` provided as itself
    pub fn new() -> Self {
        Self::with_interface(identity::<Impl>)
    }
}

impl<Impl> Default for ClassInjectable<Impl, Impl>
where
    Impl: Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, Impl> ClassInjectable<I, Impl>
where
    I: ?Sized + Send + Sync + 'static,
    Impl: Default + Send + Sync + 'static,
{
    /// Describe `Impl` provided as interface `I`, e.g. `|c| c` coercing to a trait object
    pub fn with_interface(cast: fn(Arc<Impl>) -> Arc<I>) -> Self {
        Self {
            cast,
            dependencies: Vec::new(),
            initializer: None,
            finalizer: None,
        }
    }

    /// Inject the default provider of `D` into the given field
    pub fn inject<D>(self, field: &str, slot: fn(&Impl) -> &Inject<D>) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.with_dependency(field, ServiceDependency::of::<D>(), slot)
    }

    /// Inject the provider of `D` registered under `name`
    pub fn inject_named<D>(self, field: &str, name: &str, slot: fn(&Impl) -> &Inject<D>) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.with_dependency(field, ServiceDependency::named::<D>(name), slot)
    }

    /// Inject `D` if it is registered; the slot stays empty otherwise
    pub fn inject_optional<D>(self, field: &str, slot: fn(&Impl) -> &Inject<D>) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.with_dependency(field, ServiceDependency::of::<D>().optional(), slot)
    }

    pub fn inject_optional_named<D>(
        self,
        field: &str,
        name: &str,
        slot: fn(&Impl) -> &Inject<D>,
    ) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        self.with_dependency(field, ServiceDependency::named::<D>(name).optional(), slot)
    }

    fn with_dependency<D>(
        mut self,
        field: &str,
        dependency: ServiceDependency,
        slot: fn(&Impl) -> &Inject<D>,
    ) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
    {
        let injector: Injector = Arc::new(move |target: &(dyn Any + Send + Sync), value: &Instance| {
            let target = target
                .downcast_ref::<Impl>()
                .ok_or_else(type_mismatch::<Impl>)?;
            let value = value.downcast::<D>().ok_or_else(|| {
                DiError::service_not_found(format!(
                    "{} as {}",
                    value.type_name(),
                    std::any::type_name::<D>()
                ))
            })?;
            slot(target).set(value);
            Ok(())
        });

        self.dependencies.push((field.to_string(), dependency, injector));
        self
    }

    /// Async hook run once all attributes are injected
    pub fn on_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<Impl>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.initializer = Some(async_hook::<Impl, F, Fut>(hook));
        self
    }

    /// Blocking hook run on the blocking thread pool once all attributes are injected
    pub fn on_init_blocking<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Impl) -> DiResult<()> + Send + Sync + 'static,
    {
        self.initializer = Some(blocking_hook::<Impl, F>(hook));
        self
    }

    /// Async hook run during [`Container::run_finalizers`](crate::Container::run_finalizers)
    pub fn on_dispose<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<Impl>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.finalizer = Some(async_hook::<Impl, F, Fut>(hook));
        self
    }

    pub fn on_dispose_blocking<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Impl) -> DiResult<()> + Send + Sync + 'static,
    {
        self.finalizer = Some(blocking_hook::<Impl, F>(hook));
        self
    }

    /// Use [`AsyncInitializable::initialize`] as the initializer
    pub fn async_initializable(self) -> Self
    where
        Impl: AsyncInitializable,
    {
        self.on_init(|service: Arc<Impl>| async move { service.initialize().await })
    }

    /// Use [`Disposable::dispose`] as the finalizer
    pub fn disposable(self) -> Self
    where
        Impl: Disposable,
    {
        self.on_dispose(|service: Arc<Impl>| async move { service.dispose().await })
    }

    /// Mark as a service with the given metadata
    pub fn service(self, info: ServiceInfo) -> Injectable {
        Injectable {
            kind: InjectableKind::Class(self.into_declaration()),
            info: Some(info),
        }
    }

    fn into_declaration(self) -> ClassDeclaration {
        let cast = self.cast;
        let construct: Constructor = Arc::new(move || {
            let value = Arc::new(Impl::default());
            let target: Arc<dyn Any + Send + Sync> = value.clone();
            (Instance::new(cast(value)), target)
        });

        ClassDeclaration {
            service: ServiceType::of::<I>(),
            implementation: std::any::type_name::<Impl>(),
            construct,
            dependencies: self.dependencies,
            initializer: self.initializer,
            finalizer: self.finalizer,
        }
    }
}

/// Without `.service(..)` the descriptor is not marked and registration fails
impl<I, Impl> From<ClassInjectable<I, Impl>> for Injectable
where
    I: ?Sized + Send + Sync + 'static,
    Impl: Default + Send + Sync + 'static,
{
    fn from(class: ClassInjectable<I, Impl>) -> Self {
        Injectable {
            kind: InjectableKind::Class(class.into_declaration()),
            info: None,
        }
    }
}

fn async_hook<Impl, F, Fut>(hook: F) -> Hook
where
    Impl: Send + Sync + 'static,
    F: Fn(Arc<Impl>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DiResult<()>> + Send + 'static,
{
    Arc::new(
        move |target: Arc<dyn Any + Send + Sync>| -> BoxFuture<'static, DiResult<()>> {
            match target.downcast::<Impl>() {
                Ok(service) => Box::pin(hook(service)),
                Err(_) => Box::pin(async { Err(type_mismatch::<Impl>()) }),
            }
        },
    )
}

fn blocking_hook<Impl, F>(hook: F) -> Hook
where
    Impl: Send + Sync + 'static,
    F: Fn(&Impl) -> DiResult<()> + Send + Sync + 'static,
{
    let hook = Arc::new(hook);
    Arc::new(
        move |target: Arc<dyn Any + Send + Sync>| -> BoxFuture<'static, DiResult<()>> {
            let hook = hook.clone();
            Box::pin(async move {
                let service = target
                    .downcast::<Impl>()
                    .map_err(|_| type_mismatch::<Impl>())?;
                tokio::task::spawn_blocking(move || hook(&service))
                    .await
                    .map_err(|e| DiError::creation_failed(std::any::type_name::<Impl>(), e))?
            })
        },
    )
}

/// A value together with the cleanup that must run when the container shuts down
pub struct Resource<I: ?Sized> {
    value: Arc<I>,
    cleanup: Option<FinalizerSeed>,
}

impl<I: ?Sized + Send + Sync + 'static> Resource<I> {
    pub fn new(value: Arc<I>) -> Self {
        Self {
            value,
            cleanup: None,
        }
    }

    /// Async cleanup, run once during teardown
    pub fn on_cleanup<F, Fut>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = DiResult<()>> + Send + 'static,
    {
        self.cleanup = Some(Box::new(move |service| Finalizer::new(service, cleanup)));
        self
    }

    /// Blocking cleanup, run once on the blocking thread pool during teardown
    pub fn on_cleanup_blocking<F>(mut self, cleanup: F) -> Self
    where
        F: FnOnce() -> DiResult<()> + Send + 'static,
    {
        self.cleanup = Some(Box::new(move |service| Finalizer::blocking(service, cleanup)));
        self
    }

    pub fn value(&self) -> &Arc<I> {
        &self.value
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    fn into_constructed(self) -> Constructed {
        Constructed {
            instance: Instance::new(self.value),
            finalizer: self.cleanup,
        }
    }
}

/// Descriptor for a service produced by a factory function
pub struct FactoryInjectable<I: ?Sized> {
    service: ServiceType,
    implementation: &'static str,
    factory: FactoryFn,
    dependencies: Vec<(String, ServiceDependency)>,
    _marker: std::marker::PhantomData<fn() -> Arc<I>>,
}

impl<I: ?Sized + Send + Sync + 'static> FactoryInjectable<I> {
    fn from_factory(implementation: &'static str, factory: FactoryFn) -> Self {
        Self {
            service: ServiceType::of::<I>(),
            implementation,
            factory,
            dependencies: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Async factory
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn(ResolvedDependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<Arc<I>>> + Send + 'static,
    {
        let wrapped: FactoryFn = Arc::new(
            move |deps: ResolvedDependencies| -> BoxFuture<'static, DiResult<Constructed>> {
                let pending = factory(deps);
                Box::pin(async move { Ok(Resource::new(pending.await?).into_constructed()) })
            },
        );
        Self::from_factory(std::any::type_name::<F>(), wrapped)
    }

    /// Blocking factory, run on the blocking thread pool
    pub fn blocking<F>(factory: F) -> Self
    where
        F: Fn(ResolvedDependencies) -> DiResult<Arc<I>> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        let wrapped: FactoryFn = Arc::new(
            move |deps: ResolvedDependencies| -> BoxFuture<'static, DiResult<Constructed>> {
                let factory = factory.clone();
                Box::pin(async move {
                    let value = tokio::task::spawn_blocking(move || factory(deps))
                        .await
                        .map_err(|e| DiError::creation_failed(std::any::type_name::<F>(), e))??;
                    Ok(Resource::new(value).into_constructed())
                })
            },
        );
        Self::from_factory(std::any::type_name::<F>(), wrapped)
    }

    /// Async factory producing a value with teardown
    pub fn resource<F, Fut>(factory: F) -> Self
    where
        F: Fn(ResolvedDependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<Resource<I>>> + Send + 'static,
    {
        let wrapped: FactoryFn = Arc::new(
            move |deps: ResolvedDependencies| -> BoxFuture<'static, DiResult<Constructed>> {
                let pending = factory(deps);
                Box::pin(async move { Ok(pending.await?.into_constructed()) })
            },
        );
        Self::from_factory(std::any::type_name::<F>(), wrapped)
    }

    /// Blocking factory producing a value with teardown
    pub fn blocking_resource<F>(factory: F) -> Self
    where
        F: Fn(ResolvedDependencies) -> DiResult<Resource<I>> + Send + Sync + 'static,
    {
        let factory = Arc::new(factory);
        let wrapped: FactoryFn = Arc::new(
            move |deps: ResolvedDependencies| -> BoxFuture<'static, DiResult<Constructed>> {
                let factory = factory.clone();
                Box::pin(async move {
                    let resource = tokio::task::spawn_blocking(move || factory(deps))
                        .await
                        .map_err(|e| DiError::creation_failed(std::any::type_name::<F>(), e))??;
                    Ok(resource.into_constructed())
                })
            },
        );
        Self::from_factory(std::any::type_name::<F>(), wrapped)
    }

    /// Pass the default provider of `D` as `parameter`
    pub fn depends_on<D: ?Sized + 'static>(self, parameter: &str) -> Self {
        self.with_dependency(parameter, ServiceDependency::of::<D>())
    }

    pub fn depends_on_named<D: ?Sized + 'static>(self, parameter: &str, name: &str) -> Self {
        self.with_dependency(parameter, ServiceDependency::named::<D>(name))
    }

    /// Pass `D` if registered; the parameter is absent otherwise
    pub fn depends_on_optional<D: ?Sized + 'static>(self, parameter: &str) -> Self {
        self.with_dependency(parameter, ServiceDependency::of::<D>().optional())
    }

    pub fn depends_on_optional_named<D: ?Sized + 'static>(self, parameter: &str, name: &str) -> Self {
        self.with_dependency(parameter, ServiceDependency::named::<D>(name).optional())
    }

    /// Declare a dependency on an arbitrary service key
    pub fn with_dependency(mut self, parameter: &str, dependency: ServiceDependency) -> Self {
        self.dependencies.push((parameter.to_string(), dependency));
        self
    }

    /// Mark as a service with the given metadata
    pub fn service(self, info: ServiceInfo) -> Injectable {
        Injectable {
            kind: InjectableKind::Factory(self.into_declaration()),
            info: Some(info),
        }
    }

    fn into_declaration(self) -> FactoryDeclaration {
        FactoryDeclaration {
            service: self.service,
            implementation: self.implementation,
            factory: self.factory,
            dependencies: self.dependencies,
        }
    }
}

impl<I: ?Sized + Send + Sync + 'static> From<FactoryInjectable<I>> for Injectable {
    fn from(factory: FactoryInjectable<I>) -> Self {
        Injectable {
            kind: InjectableKind::Factory(factory.into_declaration()),
            info: None,
        }
    }
}
