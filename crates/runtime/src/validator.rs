//! Validates a Resource value tree against its live declaration.
//!
//! Used three ways: per-write from `Resource::set_property_value` /
//! `add_array_value` (validating the prospective value before it commits),
//! as the full pre-encoding pass in `Serializer::to_json`, and as the
//! post-population pass in `Serializer::from_json`. The validator is
//! read-only by contract: it only inspects, throws, or returns.

use concerto_core::{modelutil, ClassDeclaration, ModelManager, Property, PropertyKind};

use crate::error::RuntimeError;
use crate::resource::Resource;
use crate::typed_stack::TypedStack;
use crate::value::Value;

/// How the validator treats resources sitting in relationship position.
/// Mirrors the serializer's relationship options so a pre-encoding pass
/// accepts exactly what the generator will accept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorOptions {
    pub allow_resources_for_relationships: bool,
}

/// Traversal state threaded through every visit: the value stack plus the
/// identifiers used to build actionable messages.
struct ValidatorParams<'a> {
    stack: TypedStack<&'a Value>,
    options: ValidatorOptions,
    root_resource_id: String,
    current_id: String,
}

impl<'a> ValidatorParams<'a> {
    fn violation(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::validation(self.current_id.clone(), message)
    }
}

/// Full-resource integrity check rooted at `resource`.
pub fn validate_resource(mm: &ModelManager, resource: &Resource) -> Result<(), RuntimeError> {
    validate_resource_with_options(mm, resource, ValidatorOptions::default())
}

/// Full-resource check with relationship-position options, used by the
/// serializer's pre-encoding pass.
pub fn validate_resource_with_options(
    mm: &ModelManager,
    resource: &Resource,
    options: ValidatorOptions,
) -> Result<(), RuntimeError> {
    let decl = resource.class_declaration(mm)?;
    let mut params = ValidatorParams {
        stack: TypedStack::new(),
        options,
        root_resource_id: resource.fully_qualified_identifier(),
        current_id: resource.fully_qualified_identifier(),
    };
    visit_class_declaration(mm, decl, resource, &mut params)
}

/// Per-write check: validate one prospective property value in isolation.
pub fn validate_property_value(
    mm: &ModelManager,
    property: &Property,
    value: &Value,
    resource_id: &str,
) -> Result<(), RuntimeError> {
    let mut params = ValidatorParams {
        stack: TypedStack::new(),
        options: ValidatorOptions::default(),
        root_resource_id: resource_id.to_owned(),
        current_id: resource_id.to_owned(),
    };
    params.stack.push(value);
    dispatch_property(mm, property, &mut params)
}

// ──────────────────────────────────────────────
// Dispatch
// ──────────────────────────────────────────────

fn dispatch_property<'a>(
    mm: &ModelManager,
    property: &Property,
    params: &mut ValidatorParams<'a>,
) -> Result<(), RuntimeError> {
    match property.kind {
        PropertyKind::Field { .. } => visit_field(mm, property, params),
        PropertyKind::Relationship => visit_relationship(mm, property, params),
        PropertyKind::EnumValue => Err(params.violation(format!(
            "enum value '{}' cannot hold a resource property value",
            property.name
        ))),
    }
}

fn visit_class_declaration<'a>(
    mm: &ModelManager,
    _declared: &ClassDeclaration,
    obj: &'a Resource,
    params: &mut ValidatorParams<'a>,
) -> Result<(), RuntimeError> {
    // dispatch against the value's own (possibly subtype) declaration
    let actual = obj.class_declaration(mm)?;

    // the only way an abstract instance can appear is a type redeclared
    // as abstract after the instance was built
    if actual.is_abstract() {
        return Err(RuntimeError::AbstractClass {
            type_name: actual.fully_qualified_name(),
        });
    }

    // undeclared values present on the object?
    for name in obj.property_names() {
        if actual.get_property(mm, name)?.is_none() {
            return Err(params.violation(format!(
                "field '{}' is not declared in '{}'",
                name,
                actual.fully_qualified_name()
            )));
        }
    }

    if actual.identifier_field_name(mm)?.is_some() {
        match obj.identifier() {
            Some(id) if !id.trim().is_empty() => {
                params.current_id = obj.fully_qualified_identifier();
                if params.root_resource_id.is_empty() {
                    params.root_resource_id = params.current_id.clone();
                }
            }
            _ => {
                return Err(params.violation(format!(
                    "instance of '{}' has an empty identifier",
                    actual.fully_qualified_name()
                )));
            }
        }
    }

    // every declared property: present values recurse, absent ones must
    // be optional
    for property in actual.properties(mm)? {
        match obj.get_property_value(&property.name) {
            Some(value) => {
                params.stack.push(value);
                dispatch_property(mm, property, params)?;
            }
            None => {
                if !property.is_optional() && !matches!(property.kind, PropertyKind::EnumValue) {
                    return Err(params.violation(format!(
                        "missing required property '{}' in '{}'",
                        property.name,
                        actual.fully_qualified_name()
                    )));
                }
            }
        }
    }

    Ok(())
}

// ──────────────────────────────────────────────
// Fields
// ──────────────────────────────────────────────

fn visit_field<'a>(
    mm: &ModelManager,
    field: &Property,
    params: &mut ValidatorParams<'a>,
) -> Result<(), RuntimeError> {
    let obj = params.stack.pop()?;

    if field.array {
        let Value::Array(items) = obj else {
            return Err(field_type_violation(field, obj, params));
        };
        for item in items {
            check_item(mm, field, item, params)?;
        }
        return Ok(());
    }

    check_item(mm, field, obj, params)
}

fn check_item<'a>(
    mm: &ModelManager,
    field: &Property,
    item: &'a Value,
    params: &mut ValidatorParams<'a>,
) -> Result<(), RuntimeError> {
    if field.is_primitive() {
        return check_primitive(field, item, params);
    }

    let type_fqn = field.fully_qualified_type_name(mm)?;
    let type_decl = mm.get_type(&type_fqn)?;

    if type_decl.is_enum() {
        return check_enum(mm, type_decl, field, item, params);
    }

    // complex field: an embedded resource of an assignable type
    let Value::Resource(resource) = item else {
        return Err(field_type_violation(field, item, params));
    };
    if !modelutil::is_assignable_to(mm, &resource.fully_qualified_type(), &type_fqn)? {
        return Err(params.violation(format!(
            "instance of '{}' is not assignable to field '{}' of type '{}'",
            resource.fully_qualified_type(),
            field.name,
            type_fqn
        )));
    }
    visit_class_declaration(mm, type_decl, resource, params)
}

fn check_primitive(
    field: &Property,
    item: &Value,
    params: &mut ValidatorParams<'_>,
) -> Result<(), RuntimeError> {
    match field.type_name.as_str() {
        "String" => {
            let Value::String(s) = item else {
                return Err(field_type_violation(field, item, params));
            };
            if let Some(v) = field.validator() {
                v.check_string(s).map_err(|msg| {
                    params.violation(format!("field '{}': {}", field.name, msg))
                })?;
            }
            Ok(())
        }
        "Boolean" => match item {
            Value::Boolean(_) => Ok(()),
            other => Err(field_type_violation(field, other, params)),
        },
        "DateTime" => match item {
            Value::DateTime(_) => Ok(()),
            other => Err(field_type_violation(field, other, params)),
        },
        "Integer" | "Long" => {
            let Value::Integer(n) = item else {
                return Err(field_type_violation(field, item, params));
            };
            check_range(field, *n as f64, params)
        }
        "Double" => {
            // integral values are acceptable in a Double position
            let n = match item {
                Value::Double(d) => *d,
                Value::Integer(i) => *i as f64,
                other => return Err(field_type_violation(field, other, params)),
            };
            check_range(field, n, params)
        }
        other => Err(params.violation(format!(
            "field '{}' declares unknown primitive type '{}'",
            field.name, other
        ))),
    }
}

fn check_range(
    field: &Property,
    value: f64,
    params: &mut ValidatorParams<'_>,
) -> Result<(), RuntimeError> {
    if let Some(v) = field.validator() {
        v.check_number(value)
            .map_err(|msg| params.violation(format!("field '{}': {}", field.name, msg)))?;
    }
    Ok(())
}

fn check_enum(
    mm: &ModelManager,
    enum_decl: &ClassDeclaration,
    field: &Property,
    item: &Value,
    params: &mut ValidatorParams<'_>,
) -> Result<(), RuntimeError> {
    let Value::String(s) = item else {
        return Err(field_type_violation(field, item, params));
    };
    let is_member = enum_decl
        .properties(mm)?
        .iter()
        .any(|p| p.name == *s);
    if !is_member {
        return Err(params.violation(format!(
            "value '{}' is not a member of enum '{}'",
            s,
            enum_decl.fully_qualified_name()
        )));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Relationships
// ──────────────────────────────────────────────

fn visit_relationship<'a>(
    mm: &ModelManager,
    property: &Property,
    params: &mut ValidatorParams<'a>,
) -> Result<(), RuntimeError> {
    let obj = params.stack.pop()?;

    if property.array {
        let Value::Array(items) = obj else {
            return Err(field_type_violation(property, obj, params));
        };
        for item in items {
            check_relationship_item(mm, property, item, params)?;
        }
        return Ok(());
    }

    check_relationship_item(mm, property, obj, params)
}

fn check_relationship_item(
    mm: &ModelManager,
    property: &Property,
    item: &Value,
    params: &mut ValidatorParams<'_>,
) -> Result<(), RuntimeError> {
    let value_fqn = match item {
        Value::Relationship(rel) => rel.fully_qualified_type(),
        Value::Resource(resource) if params.options.allow_resources_for_relationships => {
            resource.fully_qualified_type()
        }
        other => {
            return Err(RuntimeError::NotARelationship {
                property: property.name.clone(),
                found: other.type_name().to_owned(),
            });
        }
    };
    let declared_fqn = property.fully_qualified_type_name(mm)?;
    if !modelutil::is_assignable_to(mm, &value_fqn, &declared_fqn)? {
        return Err(params.violation(format!(
            "relationship to '{}' is not assignable to '{}' declared by '{}'",
            value_fqn, declared_fqn, property.name
        )));
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Reporting
// ──────────────────────────────────────────────

fn field_type_violation(
    field: &Property,
    found: &Value,
    params: &ValidatorParams<'_>,
) -> RuntimeError {
    let expected = if field.array {
        format!("{}[]", field.type_name)
    } else {
        field.type_name.clone()
    };
    params.violation(format!(
        "model violation for field '{}': expected type {}, found {}",
        field.name,
        expected,
        found.type_name()
    ))
}
