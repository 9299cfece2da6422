//! The bidirectional Resource ⇄ JSON transform, model-aware and
//! validation-integrated.

mod generator;
mod populator;
mod writer;

use std::collections::HashSet;

use concerto_core::{DeclarationKind, ModelManager};
use serde_json::Value as Json;

use crate::error::RuntimeError;
use crate::factory::{Factory, ResourceOptions};
use crate::resource::Resource;
use crate::typed_stack::TypedStack;
use crate::validator::{self, ValidatorOptions};

use generator::{GeneratorParams, JsonGenerator};
use populator::{JsonPopulator, PopulatorParams};
use writer::JsonWriter;

/// Options for [`Serializer::to_json`].
#[derive(Debug, Clone, Copy)]
pub struct SerializeOptions {
    /// Validate the resource against its model before encoding.
    pub validate: bool,
    /// Encode resources found in relationship position as identifier
    /// strings instead of failing.
    pub convert_resources_to_relationships: bool,
    /// Encode resources found in relationship position as embedded
    /// objects. Takes precedence over `convert_resources_to_relationships`.
    pub permit_resources_for_relationships: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            validate: true,
            convert_resources_to_relationships: false,
            permit_resources_for_relationships: false,
        }
    }
}

/// Options for [`Serializer::from_json`].
#[derive(Debug, Clone, Copy)]
pub struct DeserializeOptions {
    /// Accept embedded objects in place of relationship strings.
    pub accept_resources_for_relationships: bool,
    /// Validate the populated resource before returning it.
    pub validate: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        DeserializeOptions {
            accept_resources_for_relationships: false,
            validate: true,
        }
    }
}

/// Converts resource graphs to and from the JSON wire format, driven by
/// the introspection metadata in the live registry.
pub struct Serializer<'a> {
    model_manager: &'a ModelManager,
}

impl<'a> Serializer<'a> {
    pub fn new(model_manager: &'a ModelManager) -> Self {
        Serializer { model_manager }
    }

    /// Encode a resource graph as a JSON value.
    ///
    /// The generator writes JSON text into an accumulating buffer in a
    /// single pass; the text is then reparsed as a self-check that the
    /// writer's bracket/comma bookkeeping produced valid JSON. A reparse
    /// failure is an internal invariant violation, not a user input error.
    pub fn to_json(
        &self,
        resource: &Resource,
        options: SerializeOptions,
    ) -> Result<Json, RuntimeError> {
        let mm = self.model_manager;
        let decl = resource.class_declaration(mm)?;

        if options.validate {
            validator::validate_resource_with_options(
                mm,
                resource,
                ValidatorOptions {
                    allow_resources_for_relationships: options
                        .permit_resources_for_relationships
                        || options.convert_resources_to_relationships,
                },
            )?;
        }

        let generator = JsonGenerator {
            convert_resources_to_relationships: options.convert_resources_to_relationships,
            permit_resources_for_relationships: options.permit_resources_for_relationships,
        };
        let mut params = GeneratorParams {
            writer: JsonWriter::new(),
            stack: TypedStack::new(),
            seen_resources: HashSet::new(),
        };
        generator.visit_class_declaration(mm, decl, resource, &mut params)?;

        let text = params.writer.into_string();
        serde_json::from_str(&text).map_err(|e| RuntimeError::SerializationInvariant {
            message: format!("{} (generated text: {})", e, text),
        })
    }

    /// Decode a JSON value produced by [`to_json`](Self::to_json) back
    /// into a resource. The input must carry a `$class` identifier at the
    /// root; the shell is built through the Factory and populated by the
    /// visitor walk.
    pub fn from_json(
        &self,
        json: &Json,
        options: DeserializeOptions,
    ) -> Result<Resource, RuntimeError> {
        let mm = self.model_manager;

        let Some(class_value) = json.get("$class") else {
            return Err(RuntimeError::invalid_data(
                "does not contain a $class type identifier",
            ));
        };
        let Some(class_fqn) = class_value.as_str() else {
            return Err(RuntimeError::invalid_data("$class must be a string"));
        };

        let decl = mm.get_type(class_fqn)?;
        let Some(map) = json.as_object() else {
            return Err(RuntimeError::invalid_data("expected a JSON object"));
        };

        let factory = Factory::new(mm);
        let shell = match decl.kind() {
            DeclarationKind::Enum => {
                return Err(RuntimeError::invalid_data(format!(
                    "cannot create an instance of enum '{}'",
                    decl.fully_qualified_name()
                )));
            }
            DeclarationKind::Concept => {
                factory.new_concept(decl.namespace(), decl.name(), ResourceOptions::default())?
            }
            DeclarationKind::Transaction => {
                let id = optional_identifier(mm, decl, map)?;
                factory.new_transaction(
                    decl.namespace(),
                    decl.name(),
                    id.as_deref(),
                    ResourceOptions::default(),
                )?
            }
            DeclarationKind::Event => {
                let id = optional_identifier(mm, decl, map)?;
                factory.new_event(
                    decl.namespace(),
                    decl.name(),
                    id.as_deref(),
                    ResourceOptions::default(),
                )?
            }
            DeclarationKind::Asset | DeclarationKind::Participant => {
                let id = required_identifier(mm, decl, map)?;
                factory.new_resource(
                    decl.namespace(),
                    decl.name(),
                    &id,
                    ResourceOptions::default(),
                )?
            }
        };

        let populator = JsonPopulator {
            accept_resources_for_relationships: options.accept_resources_for_relationships,
        };
        let mut params = PopulatorParams {
            json_stack: TypedStack::new(),
            resource_stack: TypedStack::new(),
        };
        params.json_stack.push(json);
        params.resource_stack.push(shell);
        let resource = populator.visit_class_declaration(mm, decl, &mut params)?;

        if options.validate {
            validator::validate_resource_with_options(
                mm,
                &resource,
                ValidatorOptions {
                    allow_resources_for_relationships: options.accept_resources_for_relationships,
                },
            )?;
        }

        Ok(resource)
    }
}

fn required_identifier(
    mm: &ModelManager,
    decl: &concerto_core::ClassDeclaration,
    map: &serde_json::Map<String, Json>,
) -> Result<String, RuntimeError> {
    optional_identifier(mm, decl, map)?.ok_or_else(|| {
        RuntimeError::invalid_data(format!(
            "missing identifier for type {}",
            decl.fully_qualified_name()
        ))
    })
}

fn optional_identifier(
    mm: &ModelManager,
    decl: &concerto_core::ClassDeclaration,
    map: &serde_json::Map<String, Json>,
) -> Result<Option<String>, RuntimeError> {
    let Some(id_field) = decl.identifier_field_name(mm)? else {
        return Ok(None);
    };
    match map.get(id_field) {
        Some(Json::String(id)) => Ok(Some(id.clone())),
        Some(other) => Err(RuntimeError::invalid_data(format!(
            "identifier '{}' for type {} must be a string, found {}",
            id_field,
            decl.fully_qualified_name(),
            populator::json_kind(other)
        ))),
        None => Ok(None),
    }
}
