use serde::{Deserialize, Serialize};

/// Service lifetime, ordered from longest- to shortest-lived
///
/// The ordering is significant: a service may only depend on services whose
/// scope is less than or equal to its own, see [`ServiceScope::accepts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ServiceScope {
    /// One instance for the container's lifetime
    Singleton = 1,
    /// One instance per top-level resolution request
    Dependent = 2,
    /// A fresh instance every time it is requested
    Transient = 3,
}

impl ServiceScope {
    pub fn is_singleton(&self) -> bool {
        matches!(self, ServiceScope::Singleton)
    }

    pub fn is_dependent(&self) -> bool {
        matches!(self, ServiceScope::Dependent)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceScope::Transient)
    }

    /// Ordinal value (1 = singleton, 3 = transient)
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// Whether a service in this scope may hold a dependency of the given scope
    pub fn accepts(&self, dependency: ServiceScope) -> bool {
        dependency <= *self
    }

    /// Get the scope name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceScope::Singleton => "singleton",
            ServiceScope::Dependent => "dependent",
            ServiceScope::Transient => "transient",
        }
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        ServiceScope::Singleton
    }
}

impl std::fmt::Display for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ServiceScope {
    type Err = crate::config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "singleton" => Ok(ServiceScope::Singleton),
            "dependent" => Ok(ServiceScope::Dependent),
            "transient" => Ok(ServiceScope::Transient),
            _ => Err(crate::config::ConfigError::invalid_value(
                "scope",
                s,
                "singleton, dependent or transient",
            )),
        }
    }
}
