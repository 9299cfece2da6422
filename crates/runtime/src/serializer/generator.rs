//! Converts a Resource graph to JSON text via the visitor protocol.
//!
//! The walk writes into a [`JsonWriter`] buffer rather than building an
//! intermediate tree; property values travel through the TypedStack so an
//! unbalanced traversal fails at the point of divergence.

use std::collections::HashSet;

use concerto_core::{ClassDeclaration, ModelManager, Property, PropertyKind};
use time::format_description::well_known::Rfc3339;

use crate::error::RuntimeError;
use crate::resource::Resource;
use crate::serializer::writer::{double_literal, JsonWriter};
use crate::typed_stack::TypedStack;
use crate::value::Value;

pub(crate) struct JsonGenerator {
    pub convert_resources_to_relationships: bool,
    pub permit_resources_for_relationships: bool,
}

pub(crate) struct GeneratorParams<'a> {
    pub writer: JsonWriter,
    pub stack: TypedStack<&'a Value>,
    /// Guards embedded-resource recursion through relationship cycles.
    pub seen_resources: HashSet<String>,
}

impl JsonGenerator {
    /// Emit `{"$class": …, …}` for one resource: the class FQN first, then
    /// every non-null property in canonical own-then-inherited order.
    pub fn visit_class_declaration<'a>(
        &self,
        mm: &ModelManager,
        decl: &ClassDeclaration,
        obj: &'a Resource,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        params.writer.open_object();
        params
            .writer
            .write_key_string_value("$class", &decl.fully_qualified_name());

        for property in decl.properties(mm)? {
            if let Some(value) = obj.get_property_value(&property.name) {
                params.stack.push(value);
                self.visit_property(mm, property, params)?;
            }
        }

        params.writer.close_object();
        Ok(())
    }

    fn visit_property<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        match property.kind {
            PropertyKind::Field { .. } => self.visit_field(mm, property, params),
            PropertyKind::Relationship => self.visit_relationship(mm, property, params),
            PropertyKind::EnumValue => Err(RuntimeError::stack(format!(
                "enum value '{}' visited as a resource property",
                property.name
            ))),
        }
    }

    // -- Fields -------------------------------------------------------

    fn visit_field<'a>(
        &self,
        mm: &ModelManager,
        field: &Property,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        let obj = params.stack.pop()?;
        params.writer.write_key(&field.name);

        let scalar = field.is_primitive() || is_enum_field(mm, field)?;

        if field.array {
            let Value::Array(items) = obj else {
                return Err(wrong_shape(field, obj));
            };
            params.writer.open_array();
            for item in items {
                if scalar {
                    write_literal(field, item, &mut params.writer)?;
                } else {
                    self.visit_embedded(mm, field, item, params)?;
                }
            }
            params.writer.close_array();
            return Ok(());
        }

        if scalar {
            write_literal(field, obj, &mut params.writer)
        } else {
            self.visit_embedded(mm, field, obj, params)
        }
    }

    /// Nested object in field position: dispatch into the value's own
    /// declaration so subtypes keep their `$class`.
    fn visit_embedded<'a>(
        &self,
        mm: &ModelManager,
        field: &Property,
        item: &'a Value,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        let Value::Resource(resource) = item else {
            return Err(wrong_shape(field, item));
        };
        let decl = resource.class_declaration(mm)?;
        self.visit_class_declaration(mm, decl, resource, params)
    }

    // -- Relationships ------------------------------------------------

    fn visit_relationship<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        let obj = params.stack.pop()?;
        params.writer.write_key(&property.name);

        let target_ns =
            concerto_core::modelutil::namespace(&property.fully_qualified_type_name(mm)?)
                .to_owned();

        if property.array {
            let Value::Array(items) = obj else {
                return Err(wrong_shape(property, obj));
            };
            params.writer.open_array();
            for item in items {
                self.relationship_item(mm, property, &target_ns, item, params)?;
            }
            params.writer.close_array();
            return Ok(());
        }

        self.relationship_item(mm, property, &target_ns, obj, params)
    }

    fn relationship_item<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        target_ns: &str,
        item: &'a Value,
        params: &mut GeneratorParams<'a>,
    ) -> Result<(), RuntimeError> {
        match item {
            Value::Relationship(rel) => {
                let text = relationship_text(target_ns, rel.namespace(), rel.identifier(), || {
                    rel.uri()
                });
                params.writer.write_string_value(&text);
                Ok(())
            }
            Value::Resource(resource) if self.permit_resources_for_relationships => {
                let fqi = resource.fully_qualified_identifier();
                if params.seen_resources.contains(&fqi) {
                    // already embedded higher up this path: fall back to
                    // the identifier form to break the cycle
                    let text = self.resource_relationship_text(property, target_ns, resource)?;
                    params.writer.write_string_value(&text);
                    return Ok(());
                }
                params.seen_resources.insert(fqi.clone());
                let decl = resource.class_declaration(mm)?;
                let result = self.visit_class_declaration(mm, decl, resource, params);
                params.seen_resources.remove(&fqi);
                result
            }
            Value::Resource(resource) => {
                let text = self.resource_relationship_text(property, target_ns, resource)?;
                params.writer.write_string_value(&text);
                Ok(())
            }
            other => Err(RuntimeError::NotARelationship {
                property: property.name.clone(),
                found: other.type_name().to_owned(),
            }),
        }
    }

    /// The identifier form for a resource sitting in relationship
    /// position; only legal when one of the relationship options is set.
    fn resource_relationship_text(
        &self,
        property: &Property,
        target_ns: &str,
        resource: &Resource,
    ) -> Result<String, RuntimeError> {
        if !(self.convert_resources_to_relationships || self.permit_resources_for_relationships) {
            return Err(RuntimeError::NotARelationship {
                property: property.name.clone(),
                found: resource.fully_qualified_type(),
            });
        }
        let id = resource.identifier().ok_or_else(|| {
            RuntimeError::invalid_data(format!(
                "resource '{}' in relationship position has no identifier",
                resource.fully_qualified_type()
            ))
        })?;
        Ok(relationship_text(
            target_ns,
            resource.namespace(),
            id,
            || format!("{}#{}", resource.fully_qualified_type(), id),
        ))
    }
}

/// Short identifier when the value lives in the declared target type's
/// namespace, fully-qualified `ns.Type#id` otherwise.
fn relationship_text(
    target_ns: &str,
    value_ns: &str,
    id: &str,
    uri: impl FnOnce() -> String,
) -> String {
    if target_ns == value_ns {
        id.to_owned()
    } else {
        uri()
    }
}

fn is_enum_field(mm: &ModelManager, field: &Property) -> Result<bool, RuntimeError> {
    if field.is_primitive() {
        return Ok(false);
    }
    let fqn = field.fully_qualified_type_name(mm)?;
    Ok(mm.get_type(&fqn)?.is_enum())
}

/// Primitive-literal formatting: DateTime as a quoted RFC 3339 string,
/// numerics and booleans as bare literals, everything else (including enum
/// values) as a quoted string.
fn write_literal(
    field: &Property,
    value: &Value,
    writer: &mut JsonWriter,
) -> Result<(), RuntimeError> {
    match value {
        Value::DateTime(dt) => {
            let text = dt.format(&Rfc3339).map_err(|e| {
                RuntimeError::SerializationInvariant {
                    message: format!("datetime in '{}' failed to format: {}", field.name, e),
                }
            })?;
            writer.write_string_value(&text);
            Ok(())
        }
        Value::Integer(n) => {
            writer.write_raw_value(&n.to_string());
            Ok(())
        }
        Value::Double(d) => {
            let lit = double_literal(*d)?;
            writer.write_raw_value(&lit);
            Ok(())
        }
        Value::Boolean(b) => {
            writer.write_raw_value(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::String(s) => {
            writer.write_string_value(s);
            Ok(())
        }
        other => Err(wrong_shape(field, other)),
    }
}

fn wrong_shape(property: &Property, found: &Value) -> RuntimeError {
    RuntimeError::invalid_data(format!(
        "property '{}' holds a {} value that does not match its declaration",
        property.name,
        found.type_name()
    ))
}
