//! The sole constructor of Resources and Relationships.

use concerto_core::{ClassDeclaration, DeclarationKind, ModelManager, PropertyKind};
use rand::Rng;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::RuntimeError;
use crate::relationship::Relationship;
use crate::resource::Resource;
use crate::value::Value;

/// Instance construction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceOptions {
    /// Return a plain unchecked resource instead of a live-validated one.
    pub disable_validation: bool,
}

/// Constructs typed instances and relationships from the registry,
/// enforcing declaration existence and abstractness. Borrows the live
/// ModelManager; all lookups run against the current registry state.
pub struct Factory<'a> {
    model_manager: &'a ModelManager,
}

impl<'a> Factory<'a> {
    pub fn new(model_manager: &'a ModelManager) -> Self {
        Factory { model_manager }
    }

    // -- Instances ----------------------------------------------------

    /// Create an instance of a declared asset, participant, transaction,
    /// or event. Fails if the namespace is unregistered, the type is
    /// undeclared, the declaration is an enum or concept, or the type is
    /// abstract. Field defaults are applied, then the supplied id is
    /// written into the identifier field unconditionally.
    pub fn new_resource(
        &self,
        namespace: &str,
        type_name: &str,
        id: &str,
        options: ResourceOptions,
    ) -> Result<Resource, RuntimeError> {
        let decl = self.lookup(namespace, type_name)?;
        match decl.kind() {
            DeclarationKind::Enum => {
                return Err(RuntimeError::invalid_data(format!(
                    "cannot instantiate enum '{}'",
                    decl.fully_qualified_name()
                )));
            }
            DeclarationKind::Concept => {
                return Err(RuntimeError::invalid_data(format!(
                    "use new_concept to create '{}'",
                    decl.fully_qualified_name()
                )));
            }
            _ => {}
        }
        if decl.is_abstract() {
            return Err(RuntimeError::AbstractClass {
                type_name: decl.fully_qualified_name(),
            });
        }

        let mut resource = Resource::new(
            namespace,
            type_name,
            Some(id),
            !options.disable_validation,
        );
        self.assign_field_defaults(&mut resource, decl)?;

        // the supplied id wins over any default on the identifier field
        if let Some(id_field) = decl.identifier_field_name(self.model_manager)? {
            let id_field = id_field.to_owned();
            resource.set_raw(self.model_manager, &id_field, Value::String(id.to_owned()));
        }

        Ok(resource)
    }

    /// Create an instance of a concept declaration (no identifier).
    pub fn new_concept(
        &self,
        namespace: &str,
        type_name: &str,
        options: ResourceOptions,
    ) -> Result<Resource, RuntimeError> {
        let decl = self.lookup(namespace, type_name)?;
        if !decl.is_concept() {
            return Err(RuntimeError::invalid_data(format!(
                "'{}' is not a concept",
                decl.fully_qualified_name()
            )));
        }
        if decl.is_abstract() {
            return Err(RuntimeError::AbstractClass {
                type_name: decl.fully_qualified_name(),
            });
        }

        let mut resource = Resource::new(namespace, type_name, None, !options.disable_validation);
        self.assign_field_defaults(&mut resource, decl)?;
        Ok(resource)
    }

    /// Create a relationship to an instance of a declared type. The target
    /// type must exist and be identifiable; the target instance need not
    /// exist.
    pub fn new_relationship(
        &self,
        namespace: &str,
        type_name: &str,
        id: &str,
    ) -> Result<Relationship, RuntimeError> {
        let decl = self.lookup(namespace, type_name)?;
        if decl.identifier_field_name(self.model_manager)?.is_none() {
            return Err(RuntimeError::invalid_data(format!(
                "cannot relate to '{}': the type has no identifier",
                decl.fully_qualified_name()
            )));
        }
        Ok(Relationship::new(namespace, type_name, id))
    }

    /// Create a transaction instance. When no id is supplied a fresh
    /// v4-format UUID is minted. Stamps the `timestamp` property with the
    /// current time when the declaration carries one.
    pub fn new_transaction(
        &self,
        namespace: &str,
        type_name: &str,
        id: Option<&str>,
        options: ResourceOptions,
    ) -> Result<Resource, RuntimeError> {
        self.new_stamped(namespace, type_name, id, options, DeclarationKind::Transaction)
    }

    /// Create an event instance; same shape as `new_transaction`.
    pub fn new_event(
        &self,
        namespace: &str,
        type_name: &str,
        id: Option<&str>,
        options: ResourceOptions,
    ) -> Result<Resource, RuntimeError> {
        self.new_stamped(namespace, type_name, id, options, DeclarationKind::Event)
    }

    fn new_stamped(
        &self,
        namespace: &str,
        type_name: &str,
        id: Option<&str>,
        options: ResourceOptions,
        expected: DeclarationKind,
    ) -> Result<Resource, RuntimeError> {
        let decl = self.lookup(namespace, type_name)?;
        if decl.kind() != expected {
            return Err(RuntimeError::invalid_data(format!(
                "'{}' is not a {}",
                decl.fully_qualified_name(),
                expected.keyword()
            )));
        }

        let generated;
        let id = match id {
            Some(id) => id,
            None => {
                generated = new_uuid_v4();
                &generated
            }
        };
        let mut resource = self.new_resource(namespace, type_name, id, options)?;

        if let Some(p) = decl.get_property(self.model_manager, "timestamp")? {
            if p.type_name == "DateTime" {
                resource.set_raw(
                    self.model_manager,
                    "timestamp",
                    Value::DateTime(OffsetDateTime::now_utc()),
                );
            }
        }
        Ok(resource)
    }

    // -- Internals ----------------------------------------------------

    fn lookup(&self, namespace: &str, type_name: &str) -> Result<&'a ClassDeclaration, RuntimeError> {
        let file = self
            .model_manager
            .get_model_file(namespace)
            .ok_or_else(|| {
                RuntimeError::from(concerto_core::ModelError::NamespaceNotFound {
                    namespace: namespace.to_owned(),
                    context: Some("factory".to_owned()),
                })
            })?;
        file.get_type(type_name).ok_or_else(|| {
            RuntimeError::from(concerto_core::ModelError::TypeNotFound {
                namespace: namespace.to_owned(),
                type_name: type_name.to_owned(),
                context: Some("factory".to_owned()),
            })
        })
    }

    /// Coerce and assign every own+inherited field default. The raw default
    /// text is interpreted per the field's declared type; enum-typed
    /// defaults pass through as strings.
    fn assign_field_defaults(
        &self,
        resource: &mut Resource,
        decl: &ClassDeclaration,
    ) -> Result<(), RuntimeError> {
        let mm = self.model_manager;
        let defaults: Vec<(String, String, String)> = decl
            .properties(mm)?
            .iter()
            .filter(|p| !p.array)
            .filter_map(|p| match &p.kind {
                PropertyKind::Field {
                    default_value: Some(raw),
                    ..
                } => Some((p.name.clone(), p.type_name.clone(), raw.clone())),
                _ => None,
            })
            .collect();

        for (name, type_name, raw) in defaults {
            let value = coerce_default(&type_name, &raw).map_err(|msg| {
                RuntimeError::validation(
                    resource.fully_qualified_identifier(),
                    format!("invalid default for field '{}': {}", name, msg),
                )
            })?;
            resource.set_raw(mm, &name, value);
        }
        Ok(())
    }
}

fn coerce_default(type_name: &str, raw: &str) -> Result<Value, String> {
    match type_name {
        "String" => Ok(Value::String(raw.to_owned())),
        "Integer" | "Long" => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("'{}' is not an integer", raw)),
        "Double" => raw
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| format!("'{}' is not a number", raw)),
        "Boolean" => Ok(Value::Boolean(raw == "true")),
        "DateTime" => OffsetDateTime::parse(raw, &Rfc3339)
            .map(Value::DateTime)
            .map_err(|_| format!("'{}' is not an RFC 3339 date-time", raw)),
        // enum-typed default; membership is checked by the validator
        _ => Ok(Value::String(raw.to_owned())),
    }
}

/// A version-4 UUID string minted from the thread-local RNG.
fn new_uuid_v4() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        bytes[6], bytes[7],
        bytes[8], bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_v4_format() {
        let id = new_uuid_v4();
        assert_eq!(id.len(), 36);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 5);
        assert!(parts[2].starts_with('4'));
        assert!(matches!(
            parts[3].chars().next().unwrap(),
            '8' | '9' | 'a' | 'b'
        ));
        assert_ne!(new_uuid_v4(), id);
    }
}
