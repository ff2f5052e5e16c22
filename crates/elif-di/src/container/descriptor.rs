use std::any::TypeId;
use std::fmt;

/// Interface type a service is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ServiceType {
    /// Create the service type for `T` (trait objects included)
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Check if this is the service type of `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Service identifier combining type and optional name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub service: ServiceType,
    pub name: Option<String>,
}

impl ServiceId {
    /// Create a service ID for a type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            service: ServiceType::of::<T>(),
            name: None,
        }
    }

    /// Create a named service ID for a type
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self {
            service: ServiceType::of::<T>(),
            name: Some(name.into()),
        }
    }

    pub fn new(service: ServiceType, name: Option<String>) -> Self {
        Self { service, name }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        self.service.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.service.type_name,
            self.name.as_deref().unwrap_or("default")
        )
    }
}

/// A request for a service, as declared by a dependent or passed to `get`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceDependency {
    pub id: ServiceId,
    pub optional: bool,
}

impl ServiceDependency {
    pub fn new(id: ServiceId, optional: bool) -> Self {
        Self { id, optional }
    }

    /// Required dependency on `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(ServiceId::of::<T>(), false)
    }

    /// Required dependency on the provider of `T` registered under `name`
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::new(ServiceId::named::<T>(name), false)
    }

    /// Mark the dependency as optional (resolves to nothing when absent)
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
