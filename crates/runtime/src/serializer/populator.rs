//! Populates factory-built resources from parsed JSON, mirroring the
//! generator's traversal order over a pair of TypedStacks: one walking the
//! raw JSON, one carrying the resource shells being filled.

use concerto_core::{modelutil, ClassDeclaration, ModelManager, Property, PropertyKind};
use serde_json::Value as Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::RuntimeError;
use crate::factory::{Factory, ResourceOptions};
use crate::relationship::Relationship;
use crate::resource::Resource;
use crate::typed_stack::TypedStack;
use crate::value::Value;

pub(crate) struct JsonPopulator {
    pub accept_resources_for_relationships: bool,
}

pub(crate) struct PopulatorParams<'a> {
    pub json_stack: TypedStack<&'a Json>,
    pub resource_stack: TypedStack<Resource>,
}

impl JsonPopulator {
    /// Fill the shell on top of the resource stack from the JSON object on
    /// top of the JSON stack, returning the populated resource.
    pub fn visit_class_declaration<'a>(
        &self,
        mm: &ModelManager,
        decl: &ClassDeclaration,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Resource, RuntimeError> {
        let json = params.json_stack.pop()?;
        let mut resource = params.resource_stack.pop()?;

        let Json::Object(map) = json else {
            return Err(RuntimeError::invalid_data(format!(
                "expected a JSON object for '{}', found {}",
                decl.fully_qualified_name(),
                json_kind(json)
            )));
        };

        // every assignable (non-system, non-null) key must be declared
        for key in map.keys() {
            if key.starts_with('$') || map[key].is_null() {
                continue;
            }
            if decl.get_property(mm, key)?.is_none() {
                return Err(RuntimeError::invalid_data(format!(
                    "unexpected property '{}' for type {}",
                    key,
                    decl.fully_qualified_name()
                )));
            }
        }

        for property in decl.properties(mm)? {
            let Some(json_value) = map.get(&property.name) else {
                continue;
            };
            if json_value.is_null() {
                continue;
            }
            params.json_stack.push(json_value);
            let value = self.visit_property(mm, property, params)?;
            resource.set_raw(mm, &property.name, value);
        }

        Ok(resource)
    }

    fn visit_property<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
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
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
        let json = params.json_stack.pop()?;

        if field.array {
            let Json::Array(items) = json else {
                return Err(RuntimeError::invalid_data(format!(
                    "property '{}' expects an array, found {}",
                    field.name,
                    json_kind(json)
                )));
            };
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                result.push(self.convert_item(mm, field, item, params)?);
            }
            return Ok(Value::Array(result));
        }

        self.convert_item(mm, field, json, params)
    }

    fn convert_item<'a>(
        &self,
        mm: &ModelManager,
        field: &Property,
        json: &'a Json,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
        if field.is_primitive() {
            return convert_scalar(&field.type_name, &field.name, json);
        }
        let declared_fqn = field.fully_qualified_type_name(mm)?;
        if mm.get_type(&declared_fqn)?.is_enum() {
            // enum values travel as strings; membership is checked by the
            // validation pass
            return convert_scalar("String", &field.name, json);
        }
        self.convert_embedded(mm, &declared_fqn, json, params)
    }

    /// Build and fill a sub-resource. A `$class` in the data wins; without
    /// one the field's declared type is used (a sub-resource inside
    /// another resource).
    fn convert_embedded<'a>(
        &self,
        mm: &ModelManager,
        declared_fqn: &str,
        json: &'a Json,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
        let Json::Object(map) = json else {
            return Err(RuntimeError::invalid_data(format!(
                "expected a JSON object for '{}', found {}",
                declared_fqn,
                json_kind(json)
            )));
        };

        let type_fqn = match map.get("$class") {
            Some(Json::String(c)) => c.clone(),
            Some(other) => {
                return Err(RuntimeError::invalid_data(format!(
                    "$class must be a string, found {}",
                    json_kind(other)
                )));
            }
            None => declared_fqn.to_owned(),
        };

        let decl = mm.get_type(&type_fqn)?;
        let factory = Factory::new(mm);
        let shell = if decl.is_concept() {
            factory.new_concept(decl.namespace(), decl.name(), ResourceOptions::default())?
        } else {
            let id = identifier_from_json(mm, decl, map)?;
            factory.new_resource(decl.namespace(), decl.name(), &id, ResourceOptions::default())?
        };

        params.resource_stack.push(shell);
        params.json_stack.push(json);
        let populated = self.visit_class_declaration(mm, decl, params)?;
        Ok(Value::Resource(Box::new(populated)))
    }

    // -- Relationships ------------------------------------------------

    fn visit_relationship<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
        let json = params.json_stack.pop()?;

        let declared_fqn = property.fully_qualified_type_name(mm)?;
        let default_ns = modelutil::namespace(&declared_fqn).to_owned();
        let default_type = modelutil::short_name(&declared_fqn).to_owned();

        if property.array {
            let Json::Array(items) = json else {
                return Err(RuntimeError::invalid_data(format!(
                    "relationship '{}' expects an array, found {}",
                    property.name,
                    json_kind(json)
                )));
            };
            let mut result = Vec::with_capacity(items.len());
            for item in items {
                result.push(self.relationship_item(
                    mm,
                    property,
                    &default_ns,
                    &default_type,
                    item,
                    params,
                )?);
            }
            return Ok(Value::Array(result));
        }

        self.relationship_item(mm, property, &default_ns, &default_type, json, params)
    }

    fn relationship_item<'a>(
        &self,
        mm: &ModelManager,
        property: &Property,
        default_ns: &str,
        default_type: &str,
        json: &'a Json,
        params: &mut PopulatorParams<'a>,
    ) -> Result<Value, RuntimeError> {
        match json {
            Json::String(uri) => Ok(Value::Relationship(Relationship::from_uri(
                mm, uri, default_ns, default_type,
            )?)),
            Json::Object(map) => {
                if !self.accept_resources_for_relationships {
                    return Err(RuntimeError::invalid_data(format!(
                        "found an object in place of a relationship string for '{}'",
                        property.name
                    )));
                }
                if !map.contains_key("$class") {
                    return Err(RuntimeError::invalid_data(format!(
                        "embedded resource for relationship '{}' does not contain a $class type identifier",
                        property.name
                    )));
                }
                let declared_fqn = modelutil::fully_qualified_name(default_ns, default_type);
                self.convert_embedded(mm, &declared_fqn, json, params)
            }
            other => Err(RuntimeError::invalid_data(format!(
                "relationship '{}' expects a string, found {}",
                property.name,
                json_kind(other)
            ))),
        }
    }
}

// ──────────────────────────────────────────────
// Scalar conversion
// ──────────────────────────────────────────────

/// Convert one JSON scalar by the declared field type.
fn convert_scalar(type_name: &str, field_name: &str, json: &Json) -> Result<Value, RuntimeError> {
    let mismatch = |expected: &str| {
        RuntimeError::invalid_data(format!(
            "property '{}' expects {}, found {}",
            field_name,
            expected,
            json_kind(json)
        ))
    };

    match type_name {
        "DateTime" => {
            let Json::String(s) = json else {
                return Err(mismatch("an RFC 3339 string"));
            };
            let dt = OffsetDateTime::parse(s, &Rfc3339).map_err(|_| {
                RuntimeError::invalid_data(format!(
                    "property '{}': '{}' is not an RFC 3339 date-time",
                    field_name, s
                ))
            })?;
            Ok(Value::DateTime(dt))
        }
        "Integer" | "Long" => json
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| mismatch("an integer")),
        "Double" => json
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| mismatch("a number")),
        "Boolean" => match json {
            Json::Bool(b) => Ok(Value::Boolean(*b)),
            Json::String(s) if s == "true" => Ok(Value::Boolean(true)),
            Json::String(s) if s == "false" => Ok(Value::Boolean(false)),
            _ => Err(mismatch("a boolean")),
        },
        // String and enum values
        _ => match json {
            Json::String(s) => Ok(Value::String(s.clone())),
            _ => Err(mismatch("a string")),
        },
    }
}

fn identifier_from_json(
    mm: &ModelManager,
    decl: &ClassDeclaration,
    map: &serde_json::Map<String, Json>,
) -> Result<String, RuntimeError> {
    let id_field = decl.identifier_field_name(mm)?.ok_or_else(|| {
        RuntimeError::invalid_data(format!(
            "type '{}' has no identifier field",
            decl.fully_qualified_name()
        ))
    })?;
    match map.get(id_field) {
        Some(Json::String(id)) => Ok(id.clone()),
        _ => Err(RuntimeError::invalid_data(format!(
            "missing identifier '{}' for type {}",
            id_field,
            decl.fully_qualified_name()
        ))),
    }
}

pub(crate) fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
