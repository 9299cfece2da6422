//! The runtime object model: typed, mutable instances of declared classes.

use std::collections::BTreeMap;

use concerto_core::{modelutil, ClassDeclaration, ModelManager};

use crate::error::RuntimeError;
use crate::validator;
use crate::value::Value;

/// A typed instance of a declared class.
///
/// Resources are created only through the [`Factory`](crate::Factory),
/// which checks declaration existence and abstractness. By default every
/// instance carries live validation: each `set_property_value` /
/// `add_array_value` re-validates the prospective new value against the
/// live ClassDeclaration before committing, so a rejected write leaves the
/// resource unchanged. Plain unchecked resources are an explicit opt-out
/// at construction time.
///
/// A resource deliberately does not implement `serde::Serialize`: ad-hoc
/// stringification of a typed instance is disallowed. Use
/// [`Serializer::to_json`](crate::Serializer::to_json) for model-aware
/// encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    namespace: String,
    type_name: String,
    identifier: Option<String>,
    values: BTreeMap<String, Value>,
    live_validation: bool,
}

impl Resource {
    pub(crate) fn new(
        namespace: &str,
        type_name: &str,
        identifier: Option<&str>,
        live_validation: bool,
    ) -> Self {
        Resource {
            namespace: namespace.to_owned(),
            type_name: type_name.to_owned(),
            identifier: identifier.map(str::to_owned),
            values: BTreeMap::new(),
            live_validation,
        }
    }

    // -- Identity -----------------------------------------------------

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn fully_qualified_type(&self) -> String {
        modelutil::fully_qualified_name(&self.namespace, &self.type_name)
    }

    /// `ns.Type#id`; falls back to the type alone for identifier-less
    /// instances (concepts) in error messages.
    pub fn fully_qualified_identifier(&self) -> String {
        match &self.identifier {
            Some(id) => format!("{}#{}", self.fully_qualified_type(), id),
            None => self.fully_qualified_type(),
        }
    }

    pub fn has_live_validation(&self) -> bool {
        self.live_validation
    }

    /// Re-resolves the declaration from the live registry on every call —
    /// never cached, so the resource always reflects the current model
    /// even across a hot registry update, at the cost of a lookup.
    pub fn class_declaration<'a>(
        &self,
        mm: &'a ModelManager,
    ) -> Result<&'a ClassDeclaration, RuntimeError> {
        Ok(mm.get_type(&self.fully_qualified_type())?)
    }

    // -- Property access ----------------------------------------------

    pub fn get_property_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Property names currently holding a value.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Set a property. With live validation the property must be declared
    /// and the prospective value must pass the resource validator; the
    /// write is only committed after both checks.
    pub fn set_property_value(
        &mut self,
        mm: &ModelManager,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if self.live_validation {
            let decl = self.class_declaration(mm)?;
            let property = decl.get_property(mm, name)?.ok_or_else(|| {
                RuntimeError::validation(
                    self.fully_qualified_identifier(),
                    format!(
                        "property '{}' is not declared in '{}'",
                        name,
                        self.fully_qualified_type()
                    ),
                )
            })?;
            validator::validate_property_value(
                mm,
                property,
                &value,
                &self.fully_qualified_identifier(),
            )?;
        }
        self.commit(mm, name, value)
    }

    /// Append to an array property. With live validation the property must
    /// be declared as an array, and the *prospective full array* — the
    /// existing elements plus the new one — runs through the validator, so
    /// whole-array constraints stay expressible.
    pub fn add_array_value(
        &mut self,
        mm: &ModelManager,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let mut items = match self.values.get(name) {
            Some(Value::Array(existing)) => existing.clone(),
            Some(other) => {
                return Err(RuntimeError::validation(
                    self.fully_qualified_identifier(),
                    format!(
                        "property '{}' holds a {} value, not an array",
                        name,
                        other.type_name()
                    ),
                ));
            }
            None => Vec::new(),
        };
        items.push(value);
        let prospective = Value::Array(items);

        if self.live_validation {
            let decl = self.class_declaration(mm)?;
            let property = decl.get_property(mm, name)?.ok_or_else(|| {
                RuntimeError::validation(
                    self.fully_qualified_identifier(),
                    format!(
                        "property '{}' is not declared in '{}'",
                        name,
                        self.fully_qualified_type()
                    ),
                )
            })?;
            if !property.array {
                return Err(RuntimeError::validation(
                    self.fully_qualified_identifier(),
                    format!("property '{}' is not declared as an array", name),
                ));
            }
            validator::validate_property_value(
                mm,
                property,
                &prospective,
                &self.fully_qualified_identifier(),
            )?;
        }
        self.commit(mm, name, prospective)
    }

    /// Full-resource integrity check, independent of per-field writes.
    pub fn validate(&self, mm: &ModelManager) -> Result<(), RuntimeError> {
        validator::validate_resource(mm, self)
    }

    // -- Internal mutation --------------------------------------------

    /// Direct write used by the factory and the populator; keeps the
    /// cached identifier in sync when the identifier field is written.
    pub(crate) fn set_raw(&mut self, mm: &ModelManager, name: &str, value: Value) {
        if let Ok(decl) = self.class_declaration(mm) {
            if let Ok(Some(id_field)) = decl.identifier_field_name(mm) {
                if id_field == name {
                    if let Value::String(id) = &value {
                        self.identifier = Some(id.clone());
                    }
                }
            }
        }
        self.values.insert(name.to_owned(), value);
    }

    fn commit(&mut self, mm: &ModelManager, name: &str, value: Value) -> Result<(), RuntimeError> {
        self.set_raw(mm, name, value);
        Ok(())
    }
}
