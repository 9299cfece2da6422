use crate::ast::Provenance;
use crate::error::ModelError;
use crate::modelmanager::ModelManager;
use crate::modelutil;

// ──────────────────────────────────────────────
// Field validators
// ──────────────────────────────────────────────

/// A declared value constraint on a Field: `regex=/…/` for String fields,
/// `range=[lo,hi]` for numeric fields. Compiled at construction so a bad
/// pattern is a model error, not a runtime surprise.
#[derive(Debug, Clone)]
pub enum FieldValidator {
    Regex(regex::Regex),
    Range {
        lower: Option<i64>,
        upper: Option<i64>,
    },
}

impl FieldValidator {
    /// Check a string value; returns a violation message on failure.
    pub fn check_string(&self, value: &str) -> Result<(), String> {
        match self {
            FieldValidator::Regex(re) => {
                if re.is_match(value) {
                    Ok(())
                } else {
                    Err(format!(
                        "value '{}' does not match regex /{}/",
                        value,
                        re.as_str()
                    ))
                }
            }
            FieldValidator::Range { .. } => {
                Err("range validator applied to a string value".to_owned())
            }
        }
    }

    /// Check a numeric value; returns a violation message on failure.
    pub fn check_number(&self, value: f64) -> Result<(), String> {
        match self {
            FieldValidator::Range { lower, upper } => {
                if let Some(lo) = lower {
                    if value < *lo as f64 {
                        return Err(format!("value {} is below the range minimum {}", value, lo));
                    }
                }
                if let Some(hi) = upper {
                    if value > *hi as f64 {
                        return Err(format!("value {} is above the range maximum {}", value, hi));
                    }
                }
                Ok(())
            }
            FieldValidator::Regex(_) => {
                Err("regex validator applied to a numeric value".to_owned())
            }
        }
    }
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

/// The discriminant for one named member of a ClassDeclaration.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Field {
        optional: bool,
        /// Raw default text; coerced per the field type at instantiation.
        default_value: Option<String>,
        validator: Option<FieldValidator>,
    },
    /// A typed, non-owning reference to another declared type. Never
    /// optional, never primitive-typed.
    Relationship,
    /// A bare member of an enum declaration.
    EnumValue,
}

/// One named, typed attribute of a ClassDeclaration.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    /// Declared type name — short, resolved against the owning ModelFile.
    pub type_name: String,
    pub array: bool,
    /// Namespace of the declaring ModelFile, for on-demand resolution.
    pub namespace: String,
    pub kind: PropertyKind,
    pub prov: Provenance,
}

impl Property {
    pub fn is_primitive(&self) -> bool {
        modelutil::is_primitive_type(&self.type_name)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, PropertyKind::Field { optional: true, .. })
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, PropertyKind::Relationship)
    }

    pub fn default_value(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Field { default_value, .. } => default_value.as_deref(),
            _ => None,
        }
    }

    pub fn validator(&self) -> Option<&FieldValidator> {
        match &self.kind {
            PropertyKind::Field { validator, .. } => validator.as_ref(),
            _ => None,
        }
    }

    /// Resolve the declared type to its FQN through the owning ModelFile.
    /// Primitives pass through unqualified.
    pub fn fully_qualified_type_name(&self, mm: &ModelManager) -> Result<String, ModelError> {
        if self.is_primitive() {
            return Ok(self.type_name.clone());
        }
        let file = mm
            .get_model_file(&self.namespace)
            .ok_or_else(|| ModelError::NamespaceNotFound {
                namespace: self.namespace.clone(),
                context: Some(format!("property '{}'", self.name)),
            })?;
        file.resolve_name(mm, &self.type_name)
    }

    /// Structural validation in the context of the registry: the declared
    /// type must resolve, relationships must target identifiable
    /// non-primitive types, and validators must match the field type.
    pub fn validate(&self, mm: &ModelManager, owner_fqn: &str) -> Result<(), ModelError> {
        match &self.kind {
            PropertyKind::EnumValue => Ok(()),
            PropertyKind::Relationship => {
                if self.is_primitive() {
                    return Err(ModelError::illegal(format!(
                        "relationship '{}' in '{}' cannot target primitive type '{}'",
                        self.name, owner_fqn, self.type_name
                    )));
                }
                let fqn = self.fully_qualified_type_name(mm)?;
                let target = mm.get_type(&fqn).map_err(|_| {
                    ModelError::illegal(format!(
                        "relationship '{}' in '{}' targets undeclared type '{}'",
                        self.name, owner_fqn, self.type_name
                    ))
                })?;
                if target.identifier_field_name(mm)?.is_none() {
                    return Err(ModelError::illegal(format!(
                        "relationship '{}' in '{}' must target an identified type, but '{}' has no identifier",
                        self.name, owner_fqn, fqn
                    )));
                }
                Ok(())
            }
            PropertyKind::Field { validator, .. } => {
                if !self.is_primitive() {
                    // must resolve to a declared type
                    self.fully_qualified_type_name(mm)?;
                }
                if let Some(v) = validator {
                    match (v, self.type_name.as_str()) {
                        (FieldValidator::Regex(_), "String") => {}
                        (FieldValidator::Range { .. }, "Integer" | "Long" | "Double") => {}
                        (FieldValidator::Regex(_), other) => {
                            return Err(ModelError::illegal(format!(
                                "regex validator on '{}' in '{}' requires a String field, found '{}'",
                                self.name, owner_fqn, other
                            )));
                        }
                        (FieldValidator::Range { .. }, other) => {
                            return Err(ModelError::illegal(format!(
                                "range validator on '{}' in '{}' requires a numeric field, found '{}'",
                                self.name, owner_fqn, other
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
