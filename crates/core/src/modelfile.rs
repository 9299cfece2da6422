//! One namespace's worth of declarations plus its import table.

use crate::ast::RawImport;
use crate::error::ModelError;
use crate::introspect::{ClassDeclaration, DeclarationKind};
use crate::modelmanager::ModelManager;
use crate::modelutil;
use crate::{lexer, parser};

/// An `import ns.Type` or `import ns.*` entry.
#[derive(Debug, Clone)]
pub struct Import {
    pub namespace: String,
    /// `None` for a wildcard import.
    pub type_name: Option<String>,
}

/// A parsed model file: one namespace, an import table, and an ordered set
/// of declarations. Constructed from text once; registered into at most one
/// ModelManager; validated against the whole registry on registration.
#[derive(Debug, Clone)]
pub struct ModelFile {
    namespace: String,
    file_name: Option<String>,
    imports: Vec<Import>,
    declarations: Vec<ClassDeclaration>,
}

impl ModelFile {
    /// Parse model text into a ModelFile. `file_name` is carried into
    /// every provenance and parse error message.
    pub fn from_text(text: &str, file_name: Option<&str>) -> Result<Self, ModelError> {
        let display_name = file_name.unwrap_or("<model>");
        let tokens = lexer::lex(text, display_name)?;
        let raw = parser::parse(&tokens, display_name)?;

        let mut declarations = Vec::with_capacity(raw.declarations.len());
        for decl in &raw.declarations {
            // duplicate declaration names within one file are a model error
            if declarations
                .iter()
                .any(|d: &ClassDeclaration| d.name() == decl.name)
            {
                return Err(ModelError::illegal(format!(
                    "duplicate declaration '{}' in namespace '{}'",
                    decl.name, raw.namespace
                )));
            }
            declarations.push(ClassDeclaration::from_ast(&raw.namespace, decl)?);
        }

        Ok(ModelFile {
            namespace: raw.namespace,
            file_name: file_name.map(str::to_owned),
            imports: raw
                .imports
                .iter()
                .map(|i: &RawImport| Import {
                    namespace: i.namespace.clone(),
                    type_name: i.type_name.clone(),
                })
                .collect(),
            declarations,
        })
    }

    // -- Accessors ----------------------------------------------------

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn declarations(&self) -> &[ClassDeclaration] {
        &self.declarations
    }

    pub fn declarations_of_kind(&self, kind: DeclarationKind) -> Vec<&ClassDeclaration> {
        self.declarations.iter().filter(|d| d.kind() == kind).collect()
    }

    /// Resolve a short or fully-qualified-in-this-namespace name to an
    /// owned declaration. `None` for primitives and unknown names.
    pub fn get_type(&self, name: &str) -> Option<&ClassDeclaration> {
        let short = if modelutil::namespace(name) == self.namespace {
            modelutil::short_name(name)
        } else {
            name
        };
        self.declarations.iter().find(|d| d.name() == short)
    }

    pub fn is_local_type(&self, name: &str) -> bool {
        self.get_type(name).is_some()
    }

    /// True when the short name appears in the import table (wildcard
    /// imports answer true only against the live registry, so they are
    /// resolved in `resolve_import`).
    pub fn is_imported_type(&self, name: &str) -> bool {
        self.imports
            .iter()
            .any(|i| i.type_name.as_deref() == Some(name) || i.type_name.is_none())
    }

    /// Resolve a short name through the import table to a FQN. Wildcard
    /// imports consult the target file's declarations. Fails if no import
    /// supplies the name.
    pub fn resolve_import(&self, mm: &ModelManager, name: &str) -> Result<String, ModelError> {
        for import in &self.imports {
            match &import.type_name {
                Some(t) if t == name => {
                    return Ok(modelutil::fully_qualified_name(&import.namespace, name));
                }
                Some(_) => {}
                None => {
                    if let Some(target) = mm.get_model_file(&import.namespace) {
                        if target.is_local_type(name) {
                            return Ok(modelutil::fully_qualified_name(&import.namespace, name));
                        }
                    }
                }
            }
        }
        Err(ModelError::UnresolvedName {
            namespace: self.namespace.clone(),
            name: name.to_owned(),
        })
    }

    /// Resolve any declared type name to its FQN: primitives pass through,
    /// local declarations qualify with this namespace, imported names
    /// resolve through the import table. Fails otherwise.
    pub fn resolve_name(&self, mm: &ModelManager, name: &str) -> Result<String, ModelError> {
        if modelutil::is_primitive_type(name) {
            return Ok(name.to_owned());
        }
        if self.is_local_type(name) {
            return Ok(modelutil::fully_qualified_name(
                &self.namespace,
                modelutil::short_name(name),
            ));
        }
        self.resolve_import(mm, name)
    }

    // -- Validation ---------------------------------------------------

    /// Validate every owned declaration against the registry, and check
    /// that specific imports name types that actually exist.
    pub fn validate(&self, mm: &ModelManager) -> Result<(), ModelError> {
        for import in &self.imports {
            let target =
                mm.get_model_file(&import.namespace)
                    .ok_or_else(|| ModelError::NamespaceNotFound {
                        namespace: import.namespace.clone(),
                        context: Some(format!("import in '{}'", self.namespace)),
                    })?;
            if let Some(type_name) = &import.type_name {
                if !target.is_local_type(type_name) {
                    return Err(ModelError::TypeNotFound {
                        namespace: import.namespace.clone(),
                        type_name: type_name.clone(),
                        context: Some(format!("import in '{}'", self.namespace)),
                    });
                }
            }
        }

        for decl in &self.declarations {
            decl.validate(mm)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_requires_valid_source() {
        let err = ModelFile::from_text("asset A {}", Some("broken.cto")).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
        assert!(err.to_string().contains("broken.cto"));
    }

    #[test]
    fn duplicate_declarations_rejected() {
        let err = ModelFile::from_text(
            "namespace n\nconcept A { o String x }\nconcept A { o String y }",
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate declaration"));
    }

    #[test]
    fn get_type_accepts_short_and_qualified_names() {
        let mf =
            ModelFile::from_text("namespace org.acme\nconcept Addr { o String s }", None).unwrap();
        assert!(mf.get_type("Addr").is_some());
        assert!(mf.get_type("org.acme.Addr").is_some());
        assert!(mf.get_type("org.other.Addr").is_none());
        assert!(mf.get_type("String").is_none());
    }
}
