use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// Type-erased handle to a constructed service
///
/// Holds an `Arc<I>` for the interface `I` the service was registered under,
/// so trait-object interfaces can be stored and handed back without knowing
/// the concrete implementation.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Instance {
    pub fn new<I: ?Sized + Send + Sync + 'static>(value: Arc<I>) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<I>(),
        }
    }

    /// Recover the typed handle; `None` if `I` is not the registered interface
    pub fn downcast<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        self.inner.downcast_ref::<Arc<I>>().cloned()
    }

    /// Check if the instance was stored under interface `I`
    pub fn is<I: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.inner.is::<Arc<I>>()
    }

    /// Interface type name the instance was stored under
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity comparison of the erased handles
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Attribute slot populated by the container after construction
///
/// Services built through attribute injection declare their dependencies as
/// `Inject<T>` fields. The bare value is cached before its slots are filled,
/// which is what lets two such services refer to each other.
pub struct Inject<T: ?Sized> {
    slot: OnceLock<Arc<T>>,
}

impl<T: ?Sized> Inject<T> {
    pub fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Get the injected dependency, if it has been set
    pub fn get(&self) -> Option<&Arc<T>> {
        self.slot.get()
    }

    pub fn is_injected(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Fill the slot; returns `false` if it was already filled
    pub fn set(&self, value: Arc<T>) -> bool {
        self.slot.set(value).is_ok()
    }
}

impl<T: ?Sized> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Deref for Inject<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the dependency has not been injected, e.g. an optional
    /// dependency that had no provider.
    fn deref(&self) -> &T {
        match self.slot.get() {
            Some(value) => value,
            None => panic!(
                "Inject<{}> read before the container injected it",
                std::any::type_name::<T>()
            ),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("type_name", &std::any::type_name::<T>())
            .field("injected", &self.is_injected())
            .finish()
    }
}
