use std::collections::HashSet;

use crate::ast::{Provenance, RawDeclaration, RawDeclarationKind, RawMember};
use crate::error::ModelError;
use crate::introspect::{FieldValidator, Property, PropertyKind};
use crate::modelmanager::ModelManager;
use crate::modelutil;

// ──────────────────────────────────────────────
// Declaration kinds
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Asset,
    Participant,
    Transaction,
    Event,
    Concept,
    Enum,
}

impl DeclarationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclarationKind::Asset => "asset",
            DeclarationKind::Participant => "participant",
            DeclarationKind::Transaction => "transaction",
            DeclarationKind::Event => "event",
            DeclarationKind::Concept => "concept",
            DeclarationKind::Enum => "enum",
        }
    }
}

// ──────────────────────────────────────────────
// ClassDeclaration
// ──────────────────────────────────────────────

/// The schema for one declared type. Immutable after construction; all
/// cross-declaration lookups take the live `&ModelManager` explicitly, so
/// a declaration holds no back-pointers and always reflects the current
/// registry.
#[derive(Debug, Clone)]
pub struct ClassDeclaration {
    namespace: String,
    name: String,
    kind: DeclarationKind,
    is_abstract: bool,
    /// Declared supertype name, unresolved (short or imported).
    super_type: Option<String>,
    /// Own identifier field name; the effective identifier may be inherited.
    id_field: Option<String>,
    /// Own properties only, in declaration order.
    properties: Vec<Property>,
    prov: Provenance,
}

impl ClassDeclaration {
    /// Build introspection metadata from a parsed declaration node.
    pub(crate) fn from_ast(namespace: &str, raw: &RawDeclaration) -> Result<Self, ModelError> {
        let kind = match raw.kind {
            RawDeclarationKind::Asset => DeclarationKind::Asset,
            RawDeclarationKind::Participant => DeclarationKind::Participant,
            RawDeclarationKind::Transaction => DeclarationKind::Transaction,
            RawDeclarationKind::Event => DeclarationKind::Event,
            RawDeclarationKind::Concept => DeclarationKind::Concept,
            RawDeclarationKind::Enum => DeclarationKind::Enum,
        };

        let mut properties = Vec::with_capacity(raw.members.len());
        for member in &raw.members {
            properties.push(Self::property_from_ast(namespace, &raw.name, member)?);
        }

        Ok(ClassDeclaration {
            namespace: namespace.to_owned(),
            name: raw.name.clone(),
            kind,
            is_abstract: raw.is_abstract,
            super_type: raw.super_type.clone(),
            id_field: raw.id_field.clone(),
            properties,
            prov: raw.prov.clone(),
        })
    }

    fn property_from_ast(
        namespace: &str,
        owner: &str,
        member: &RawMember,
    ) -> Result<Property, ModelError> {
        match member {
            RawMember::Field {
                name,
                type_name,
                array,
                optional,
                default_value,
                regex,
                range,
                prov,
            } => {
                let validator = match (regex, range) {
                    (Some(_), Some(_)) => {
                        return Err(ModelError::parse(
                            &prov.file,
                            prov.line,
                            format!("field '{}' in '{}' declares both regex and range", name, owner),
                        ));
                    }
                    (Some(pattern), None) => {
                        let compiled = regex::Regex::new(pattern).map_err(|e| {
                            ModelError::parse(
                                &prov.file,
                                prov.line,
                                format!("invalid regex on field '{}': {}", name, e),
                            )
                        })?;
                        Some(FieldValidator::Regex(compiled))
                    }
                    (None, Some((lower, upper))) => Some(FieldValidator::Range {
                        lower: *lower,
                        upper: *upper,
                    }),
                    (None, None) => None,
                };
                Ok(Property {
                    name: name.clone(),
                    type_name: type_name.clone(),
                    array: *array,
                    namespace: namespace.to_owned(),
                    kind: PropertyKind::Field {
                        optional: *optional,
                        default_value: default_value.clone(),
                        validator,
                    },
                    prov: prov.clone(),
                })
            }
            RawMember::Relationship {
                name,
                type_name,
                array,
                prov,
            } => Ok(Property {
                name: name.clone(),
                type_name: type_name.clone(),
                array: *array,
                namespace: namespace.to_owned(),
                kind: PropertyKind::Relationship,
                prov: prov.clone(),
            }),
            RawMember::EnumValue { name, prov } => Ok(Property {
                name: name.clone(),
                type_name: "String".to_owned(),
                array: false,
                namespace: namespace.to_owned(),
                kind: PropertyKind::EnumValue,
                prov: prov.clone(),
            }),
        }
    }

    // -- Accessors ----------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fully_qualified_name(&self) -> String {
        modelutil::fully_qualified_name(&self.namespace, &self.name)
    }

    pub fn kind(&self) -> DeclarationKind {
        self.kind
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_enum(&self) -> bool {
        self.kind == DeclarationKind::Enum
    }

    pub fn is_concept(&self) -> bool {
        self.kind == DeclarationKind::Concept
    }

    pub fn declared_super_type(&self) -> Option<&str> {
        self.super_type.as_deref()
    }

    pub fn provenance(&self) -> &Provenance {
        &self.prov
    }

    /// Own properties only, in declaration order.
    pub fn own_properties(&self) -> &[Property] {
        &self.properties
    }

    // -- Chain-walking lookups ---------------------------------------

    /// Resolve the declared supertype name to a FQN through the owning
    /// ModelFile. Fails if the name does not resolve to any known
    /// declaration.
    pub fn super_type_fqn(&self, mm: &ModelManager) -> Result<Option<String>, ModelError> {
        let Some(super_name) = &self.super_type else {
            return Ok(None);
        };
        let file = mm
            .get_model_file(&self.namespace)
            .ok_or_else(|| ModelError::NamespaceNotFound {
                namespace: self.namespace.clone(),
                context: Some(format!("supertype of '{}'", self.fully_qualified_name())),
            })?;
        let fqn = file.resolve_name(mm, super_name).map_err(|_| {
            ModelError::illegal(format!(
                "could not find super type '{}' of '{}'",
                super_name,
                self.fully_qualified_name()
            ))
        })?;
        if modelutil::is_primitive_type(&fqn) {
            return Err(ModelError::illegal(format!(
                "'{}' cannot extend primitive type '{}'",
                self.fully_qualified_name(),
                fqn
            )));
        }
        Ok(Some(fqn))
    }

    fn super_type_declaration<'a>(
        &self,
        mm: &'a ModelManager,
    ) -> Result<Option<&'a ClassDeclaration>, ModelError> {
        match self.super_type_fqn(mm)? {
            Some(fqn) => Ok(Some(mm.get_type(&fqn)?)),
            None => Ok(None),
        }
    }

    /// Own property if present, else the supertype chain's. `None` if the
    /// name is not declared anywhere in the chain.
    pub fn get_property<'a>(
        &'a self,
        mm: &'a ModelManager,
        name: &str,
    ) -> Result<Option<&'a Property>, ModelError> {
        let mut seen = HashSet::new();
        let mut current = self;
        loop {
            if let Some(p) = current.properties.iter().find(|p| p.name == name) {
                return Ok(Some(p));
            }
            if !seen.insert(current.fully_qualified_name()) {
                // cyclic chain; validate() reports this properly
                return Ok(None);
            }
            match current.super_type_declaration(mm)? {
                Some(superdecl) => current = superdecl,
                None => return Ok(None),
            }
        }
    }

    /// The full property list: own properties first, in declaration order,
    /// then the supertype's full list, recursively. This is the canonical
    /// serialization field order.
    pub fn properties<'a>(
        &'a self,
        mm: &'a ModelManager,
    ) -> Result<Vec<&'a Property>, ModelError> {
        let mut result: Vec<&Property> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self;
        loop {
            if !seen.insert(current.fully_qualified_name()) {
                break;
            }
            result.extend(current.properties.iter());
            match current.super_type_declaration(mm)? {
                Some(superdecl) => current = superdecl,
                None => break,
            }
        }
        Ok(result)
    }

    /// Own identifier field name if set, else the supertype chain's.
    pub fn identifier_field_name<'a>(
        &'a self,
        mm: &'a ModelManager,
    ) -> Result<Option<&'a str>, ModelError> {
        let mut seen = HashSet::new();
        let mut current = self;
        loop {
            if let Some(id) = &current.id_field {
                return Ok(Some(id));
            }
            if !seen.insert(current.fully_qualified_name()) {
                return Ok(None);
            }
            match current.super_type_declaration(mm)? {
                Some(superdecl) => current = superdecl,
                None => return Ok(None),
            }
        }
    }

    // -- Validation ---------------------------------------------------

    /// Structural validation against the live registry: supertype
    /// existence and acyclicity, identifier constraints, duplicate
    /// property names across the whole chain, and per-property checks.
    /// Side-effect free; only throws or returns.
    pub fn validate(&self, mm: &ModelManager) -> Result<(), ModelError> {
        let fqn = self.fully_qualified_name();

        // (a) supertype resolves, kind-compatible, chain acyclic
        if self.super_type.is_some() {
            let mut seen: HashSet<String> = HashSet::new();
            seen.insert(fqn.clone());
            let mut current = self.super_type_declaration(mm)?;
            while let Some(decl) = current {
                if decl.kind != self.kind {
                    return Err(ModelError::illegal(format!(
                        "{} '{}' cannot extend {} '{}'",
                        self.kind.keyword(),
                        fqn,
                        decl.kind.keyword(),
                        decl.fully_qualified_name()
                    )));
                }
                if !seen.insert(decl.fully_qualified_name()) {
                    return Err(ModelError::illegal(format!(
                        "cyclic supertype chain detected for '{}'",
                        fqn
                    )));
                }
                current = decl.super_type_declaration(mm)?;
            }
        }

        // (b) identifier constraints
        if let Some(id_field) = &self.id_field {
            match self.get_property(mm, id_field)? {
                None => {
                    return Err(ModelError::illegal(format!(
                        "identifier field '{}' of '{}' is not a property",
                        id_field, fqn
                    )));
                }
                Some(p) => {
                    if p.type_name != "String" || !matches!(p.kind, PropertyKind::Field { .. }) {
                        return Err(ModelError::illegal(format!(
                            "identifier field '{}' of '{}' must be a String field",
                            id_field, fqn
                        )));
                    }
                    if p.is_optional() {
                        return Err(ModelError::illegal(format!(
                            "identifier field '{}' of '{}' cannot be optional",
                            id_field, fqn
                        )));
                    }
                }
            }
        }

        // (c) duplicate names across own + inherited properties
        let all = self.properties(mm)?;
        for (i, p) in all.iter().enumerate() {
            for other in &all[i + 1..] {
                if p.name == other.name {
                    return Err(ModelError::illegal(format!(
                        "duplicate property name '{}' in '{}'",
                        p.name, fqn
                    )));
                }
            }
        }

        // (d) per-property validation
        for p in &self.properties {
            p.validate(mm, &fqn)?;
        }

        Ok(())
    }
}
