//! The namespace → ModelFile registry and global type resolution entry
//! point.

use std::collections::BTreeMap;

use crate::error::ModelError;
use crate::introspect::{ClassDeclaration, DeclarationKind};
use crate::modelfile::ModelFile;
use crate::modelutil;

/// Registry of model files keyed by namespace.
///
/// Mutation is synchronous and not internally synchronized; a manager
/// instance must be externally serialized in concurrent hosts. The batch
/// `add_model_files` is transactional against partial failure (all-or-
/// nothing), not against concurrent interleaving.
#[derive(Debug, Clone, Default)]
pub struct ModelManager {
    model_files: BTreeMap<String, ModelFile>,
}

impl ModelManager {
    pub fn new() -> Self {
        ModelManager {
            model_files: BTreeMap::new(),
        }
    }

    // -- Registration -------------------------------------------------

    /// Add a single model file. Fails if the namespace is already
    /// registered, or if the file does not validate against the registry
    /// (with the file itself included, so self-references resolve).
    pub fn add_model_file(&mut self, file: ModelFile) -> Result<&ModelFile, ModelError> {
        let ns = file.namespace().to_owned();
        if let Some(existing) = self.model_files.get(&ns) {
            return Err(ModelError::NamespaceExists {
                namespace: ns,
                existing_file: existing.file_name().map(str::to_owned),
            });
        }

        let mut candidate = self.clone();
        candidate.model_files.insert(ns.clone(), file);
        candidate.model_files[&ns].validate(&candidate)?;

        self.model_files = candidate.model_files;
        Ok(&self.model_files[&ns])
    }

    /// Parse and add a single model file from text.
    pub fn add_model_text(
        &mut self,
        text: &str,
        file_name: Option<&str>,
    ) -> Result<&ModelFile, ModelError> {
        let file = ModelFile::from_text(text, file_name)?;
        self.add_model_file(file)
    }

    /// Add a set of model files transactionally.
    ///
    /// All files are registered into a candidate copy of the registry
    /// before any validation runs, so files in the batch may reference each
    /// other (including circularly). Every file in the candidate registry
    /// — old and new — is then validated; on any failure the live registry
    /// is left exactly as it was and the error is returned. On success the
    /// candidate is swapped in and the namespaces added are returned.
    pub fn add_model_files(&mut self, files: Vec<ModelFile>) -> Result<Vec<String>, ModelError> {
        let mut candidate = self.clone();
        let mut added = Vec::with_capacity(files.len());

        for file in files {
            let ns = file.namespace().to_owned();
            if let Some(existing) = candidate.model_files.get(&ns) {
                return Err(ModelError::NamespaceExists {
                    namespace: ns,
                    existing_file: existing.file_name().map(str::to_owned),
                });
            }
            candidate.model_files.insert(ns.clone(), file);
            added.push(ns);
        }

        candidate.validate_model_files()?;

        self.model_files = candidate.model_files;
        Ok(added)
    }

    /// Parse and add a batch of model texts transactionally. Sources are
    /// `(text, optional file name)` pairs.
    pub fn add_model_texts(
        &mut self,
        sources: &[(&str, Option<&str>)],
    ) -> Result<Vec<String>, ModelError> {
        let mut files = Vec::with_capacity(sources.len());
        for (text, file_name) in sources {
            files.push(ModelFile::from_text(text, *file_name)?);
        }
        self.add_model_files(files)
    }

    /// Replace the model file for an already-registered namespace. The
    /// whole registry re-validates against a candidate with the swap
    /// applied before it becomes visible, so a replacement that breaks a
    /// dependent namespace is rejected with the registry unchanged.
    pub fn update_model_file(&mut self, file: ModelFile) -> Result<&ModelFile, ModelError> {
        let ns = file.namespace().to_owned();
        if !self.model_files.contains_key(&ns) {
            return Err(ModelError::NamespaceNotFound {
                namespace: ns,
                context: Some("update_model_file".to_owned()),
            });
        }

        let mut candidate = self.clone();
        candidate.model_files.insert(ns.clone(), file);
        candidate.validate_model_files()?;

        self.model_files = candidate.model_files;
        Ok(&self.model_files[&ns])
    }

    /// Remove the model file for a namespace.
    pub fn delete_model_file(&mut self, namespace: &str) -> Result<(), ModelError> {
        if self.model_files.remove(namespace).is_none() {
            return Err(ModelError::NamespaceNotFound {
                namespace: namespace.to_owned(),
                context: Some("delete_model_file".to_owned()),
            });
        }
        Ok(())
    }

    /// Remove all registered model files.
    pub fn clear_model_files(&mut self) {
        self.model_files.clear();
    }

    // -- Lookup -------------------------------------------------------

    pub fn get_model_file(&self, namespace: &str) -> Option<&ModelFile> {
        self.model_files.get(namespace)
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.model_files.keys().map(String::as_str).collect()
    }

    pub fn model_files(&self) -> impl Iterator<Item = &ModelFile> {
        self.model_files.values()
    }

    /// Total number of declarations across all files; used to bound
    /// supertype chain walks.
    pub fn declaration_count(&self) -> usize {
        self.model_files.values().map(|f| f.declarations().len()).sum()
    }

    /// Check that a type reference is valid and return its FQN. Primitive
    /// types pass through unchanged; complex types must be declared in a
    /// registered namespace. `context` names the referencing site for the
    /// error message.
    pub fn resolve_type(&self, context: &str, type_fqn: &str) -> Result<String, ModelError> {
        if modelutil::is_primitive_type(type_fqn) {
            return Ok(type_fqn.to_owned());
        }

        let ns = modelutil::namespace(type_fqn);
        let model_file = self
            .get_model_file(ns)
            .ok_or_else(|| ModelError::NamespaceNotFound {
                namespace: ns.to_owned(),
                context: Some(context.to_owned()),
            })?;

        if model_file.is_local_type(type_fqn) {
            return Ok(type_fqn.to_owned());
        }

        Err(ModelError::TypeNotFound {
            namespace: ns.to_owned(),
            type_name: modelutil::short_name(type_fqn).to_owned(),
            context: Some(context.to_owned()),
        })
    }

    /// Look up the declaration for a fully-qualified type name. Fails if
    /// the namespace is unregistered or the type undeclared; primitive
    /// names have no declaration and also fail.
    pub fn get_type(&self, fqn: &str) -> Result<&ClassDeclaration, ModelError> {
        let ns = modelutil::namespace(fqn);
        let model_file = self
            .get_model_file(ns)
            .ok_or_else(|| ModelError::NamespaceNotFound {
                namespace: ns.to_owned(),
                context: Some(format!("type '{}'", fqn)),
            })?;
        model_file
            .get_type(modelutil::short_name(fqn))
            .ok_or_else(|| ModelError::TypeNotFound {
                namespace: ns.to_owned(),
                type_name: modelutil::short_name(fqn).to_owned(),
                context: None,
            })
    }

    /// All declarations of one kind across every registered file.
    pub fn declarations_of_kind(&self, kind: DeclarationKind) -> Vec<&ClassDeclaration> {
        self.model_files
            .values()
            .flat_map(|f| f.declarations_of_kind(kind))
            .collect()
    }

    // -- Validation ---------------------------------------------------

    /// Validate every registered file against this registry.
    pub fn validate_model_files(&self) -> Result<(), ModelError> {
        for file in self.model_files.values() {
            file.validate(self)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARS: &str = r#"
namespace org.acme.cars
import org.acme.people.Person

asset Vehicle identified by vin {
    o String vin
    --> Person owner
}
"#;

    const PEOPLE: &str = r#"
namespace org.acme.people

participant Person identified by email {
    o String email
    o String name optional
}
"#;

    #[test]
    fn single_file_add_and_lookup() {
        let mut mm = ModelManager::new();
        mm.add_model_text(PEOPLE, Some("people.cto")).unwrap();
        let decl = mm.get_type("org.acme.people.Person").unwrap();
        assert_eq!(decl.name(), "Person");
        assert_eq!(decl.kind(), DeclarationKind::Participant);
    }

    #[test]
    fn add_in_dependency_order_or_batch() {
        // cars references people, so adding cars alone fails
        let mut mm = ModelManager::new();
        assert!(mm.add_model_text(CARS, None).is_err());

        // a batch resolves the forward reference
        let mut mm = ModelManager::new();
        let added = mm
            .add_model_texts(&[(CARS, Some("cars.cto")), (PEOPLE, Some("people.cto"))])
            .unwrap();
        assert_eq!(added, vec!["org.acme.cars", "org.acme.people"]);
    }

    #[test]
    fn batch_failure_rolls_back_fully() {
        let mut mm = ModelManager::new();
        mm.add_model_text(PEOPLE, None).unwrap();

        let bad = "namespace org.bad\nasset Broken identified by missing { o String x }";
        let err = mm.add_model_texts(&[(CARS, None), (bad, None)]).unwrap_err();
        assert!(err.to_string().contains("identifier field"));

        // neither namespace from the failed batch is retained
        assert_eq!(mm.namespaces(), vec!["org.acme.people"]);
    }

    #[test]
    fn duplicate_namespace_rejected() {
        let mut mm = ModelManager::new();
        mm.add_model_text(PEOPLE, Some("a.cto")).unwrap();
        let err = mm.add_model_text(PEOPLE, Some("b.cto")).unwrap_err();
        assert!(matches!(err, ModelError::NamespaceExists { .. }));
    }

    #[test]
    fn update_and_delete() {
        let mut mm = ModelManager::new();
        mm.add_model_text(PEOPLE, None).unwrap();

        let updated = "namespace org.acme.people\nparticipant Person identified by email { o String email o Integer age optional }";
        mm.update_model_file(ModelFile::from_text(updated, None).unwrap())
            .unwrap();
        let decl = mm.get_type("org.acme.people.Person").unwrap();
        assert_eq!(decl.own_properties().len(), 2);

        mm.delete_model_file("org.acme.people").unwrap();
        assert!(mm.get_type("org.acme.people.Person").is_err());
        assert!(mm.delete_model_file("org.acme.people").is_err());
    }

    #[test]
    fn resolve_type_passes_primitives_and_checks_declarations() {
        let mut mm = ModelManager::new();
        mm.add_model_text(PEOPLE, None).unwrap();
        assert_eq!(mm.resolve_type("test", "String").unwrap(), "String");
        assert_eq!(
            mm.resolve_type("test", "org.acme.people.Person").unwrap(),
            "org.acme.people.Person"
        );
        let err = mm.resolve_type("field 'x'", "org.acme.people.Robot").unwrap_err();
        assert!(err.to_string().contains("field 'x'"));
    }

    #[test]
    fn update_that_breaks_a_dependent_file_is_rejected() {
        let mut mm = ModelManager::new();
        mm.add_model_texts(&[(CARS, None), (PEOPLE, None)]).unwrap();

        // dropping Person breaks the cars file's import
        let gutted = "namespace org.acme.people\nconcept Placeholder { o String x }";
        let err = mm
            .update_model_file(ModelFile::from_text(gutted, None).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("Person") || err.to_string().contains("import"));
    }
}
