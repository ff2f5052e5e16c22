use std::collections::HashSet;

use crate::container::descriptor::ServiceDependency;
use crate::container::injectable::{Injectable, InjectableKind, ServiceInfo};
use crate::container::spec::{AttributeStrategy, ConstructionStrategy, FactoryStrategy, ServiceSpec};
use crate::error::{DiError, DiResult};

/// Turn a descriptor into a registrable [`ServiceSpec`]
///
/// Only descriptors marked with `.service(..)` are accepted; pre-built values
/// are not injectable.
pub fn parse_service_spec(injectable: Injectable) -> DiResult<ServiceSpec> {
    let label = injectable.label();
    if let InjectableKind::Value { type_name } = injectable.kind {
        return Err(DiError::invalid_service_type(
            type_name,
            "a value is neither a class nor a factory",
        ));
    }
    let info = injectable.info.ok_or_else(|| {
        DiError::invalid_service_type(label, "descriptor is not marked as a service")
    })?;
    validate_info(label, &info)?;

    match injectable.kind {
        InjectableKind::Class(class) => {
            let mut dependencies = Vec::with_capacity(class.dependencies.len());
            let mut injectors = Vec::with_capacity(class.dependencies.len());
            for (field, dependency, injector) in class.dependencies {
                dependencies.push((field, dependency));
                injectors.push(injector);
            }
            validate_dependencies(label, &dependencies)?;

            Ok(ServiceSpec {
                service: class.service,
                name: info.name,
                scope: info.scope,
                startup: info.startup,
                implementation: class.implementation,
                dependencies,
                strategy: ConstructionStrategy::Attribute(AttributeStrategy {
                    construct: class.construct,
                    injectors,
                    initializer: class.initializer,
                    finalizer: class.finalizer,
                }),
            })
        }
        InjectableKind::Factory(factory) => {
            validate_dependencies(label, &factory.dependencies)?;

            Ok(ServiceSpec {
                service: factory.service,
                name: info.name,
                scope: info.scope,
                startup: info.startup,
                implementation: factory.implementation,
                dependencies: factory.dependencies,
                strategy: ConstructionStrategy::Factory(FactoryStrategy {
                    factory: factory.factory,
                }),
            })
        }
        InjectableKind::Value { type_name } => Err(DiError::invalid_service_type(
            type_name,
            "a value is neither a class nor a factory",
        )),
    }
}

fn validate_info(label: &str, info: &ServiceInfo) -> DiResult<()> {
    if let Some(name) = &info.name {
        if name.trim().is_empty() {
            return Err(DiError::invalid_service_type(
                label,
                "service name must not be blank",
            ));
        }
    }
    Ok(())
}

fn validate_dependencies(label: &str, dependencies: &[(String, ServiceDependency)]) -> DiResult<()> {
    let mut seen = HashSet::new();
    for (parameter, _) in dependencies {
        if parameter.trim().is_empty() {
            return Err(DiError::invalid_service_type(
                label,
                "dependency names must not be empty",
            ));
        }
        if !seen.insert(parameter.as_str()) {
            return Err(DiError::invalid_service_type(
                label,
                format!("dependency '{}' declared more than once", parameter),
            ));
        }
    }
    Ok(())
}
