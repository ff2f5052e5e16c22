use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{ServiceId, ServiceType};
use crate::container::spec::{ServiceDefinition, ServiceSpec};

/// Providers registered for one interface type
#[derive(Debug)]
struct ServiceRecord {
    service: ServiceType,
    /// Keyed by provider name, in first-registration order
    providers: Vec<(Option<String>, Arc<ServiceSpec>)>,
}

/// Why a lookup found nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// No provider of any name is registered for the type
    NoProviders,
    /// The type has providers, just not under the requested name
    NameNotFound { available: Vec<Option<String>> },
}

/// Registered specs indexed by interface type, then by name
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, ServiceRecord>,
    order: Vec<TypeId>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a spec; an existing provider under the same key is replaced in
    /// place and returned
    pub fn register(&mut self, spec: ServiceSpec) -> Option<Arc<ServiceSpec>> {
        let type_id = spec.service.type_id;
        if !self.services.contains_key(&type_id) {
            self.order.push(type_id);
        }
        let record = self.services.entry(type_id).or_insert_with(|| ServiceRecord {
            service: spec.service,
            providers: Vec::new(),
        });

        let name = spec.name.clone();
        let spec = Arc::new(spec);
        match record.providers.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, spec)),
            None => {
                record.providers.push((name, spec));
                None
            }
        }
    }

    pub fn get(&self, id: &ServiceId) -> Option<&Arc<ServiceSpec>> {
        self.lookup(&id.service, id.name()).ok()
    }

    /// Find the provider of `service` registered under `name`
    pub fn lookup(
        &self,
        service: &ServiceType,
        name: Option<&str>,
    ) -> Result<&Arc<ServiceSpec>, LookupMiss> {
        let record = self
            .services
            .get(&service.type_id)
            .filter(|record| !record.providers.is_empty())
            .ok_or(LookupMiss::NoProviders)?;

        record
            .providers
            .iter()
            .find(|(n, _)| n.as_deref() == name)
            .map(|(_, spec)| spec)
            .ok_or_else(|| LookupMiss::NameNotFound {
                available: record.providers.iter().map(|(n, _)| n.clone()).collect(),
            })
    }

    pub fn contains(&self, id: &ServiceId) -> bool {
        self.get(id).is_some()
    }

    /// Providers of one type as `(name, definition)`
    pub fn list_providers(&self, service: &ServiceType) -> Vec<(Option<String>, ServiceDefinition)> {
        self.services
            .get(&service.type_id)
            .map(|record| {
                record
                    .providers
                    .iter()
                    .map(|(name, spec)| (name.clone(), spec.definition()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every provider as `(name, definition)`, types in registration order
    pub fn list_all(&self) -> Vec<(Option<String>, ServiceDefinition)> {
        self.order
            .iter()
            .filter_map(|type_id| self.services.get(type_id))
            .flat_map(|record| {
                record
                    .providers
                    .iter()
                    .map(|(name, spec)| (name.clone(), spec.definition()))
            })
            .collect()
    }

    /// Every spec, types in registration order
    pub fn specs(&self) -> impl Iterator<Item = &Arc<ServiceSpec>> {
        self.order
            .iter()
            .filter_map(|type_id| self.services.get(type_id))
            .flat_map(|record| record.providers.iter().map(|(_, spec)| spec))
    }

    /// Interface types with at least one provider
    pub fn service_types(&self) -> Vec<ServiceType> {
        self.order
            .iter()
            .filter_map(|type_id| self.services.get(type_id))
            .map(|record| record.service)
            .collect()
    }

    /// Total number of providers
    pub fn len(&self) -> usize {
        self.services.values().map(|r| r.providers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
