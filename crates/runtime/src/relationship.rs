use concerto_core::{modelutil, ModelManager};

use crate::error::RuntimeError;

/// A typed, non-owning reference to another resource's identity: an
/// immutable `(namespace, type, id)` tuple. A relationship never embeds its
/// target and carries no guarantee that the target exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    namespace: String,
    type_name: String,
    identifier: String,
}

impl Relationship {
    /// Constructed through `Factory::new_relationship` or `from_uri`, which
    /// perform the existence checks.
    pub(crate) fn new(namespace: &str, type_name: &str, identifier: &str) -> Self {
        Relationship {
            namespace: namespace.to_owned(),
            type_name: type_name.to_owned(),
            identifier: identifier.to_owned(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn fully_qualified_type(&self) -> String {
        modelutil::fully_qualified_name(&self.namespace, &self.type_name)
    }

    /// The persistent form: `ns.Type#id`.
    pub fn uri(&self) -> String {
        format!("{}#{}", self.fully_qualified_type(), self.identifier)
    }

    /// Parse the persistent form back into a relationship. A bare
    /// identifier (no `#`) takes the default namespace and type — the
    /// short same-namespace encoding. The referenced type must be declared
    /// in the registry.
    pub fn from_uri(
        mm: &ModelManager,
        uri: &str,
        default_namespace: &str,
        default_type: &str,
    ) -> Result<Self, RuntimeError> {
        let (namespace, type_name, identifier) = match uri.split_once('#') {
            Some((fqn, id)) => {
                let ns = modelutil::namespace(fqn);
                let ns = if ns.is_empty() { default_namespace } else { ns };
                (ns.to_owned(), modelutil::short_name(fqn).to_owned(), id.to_owned())
            }
            None => (
                default_namespace.to_owned(),
                default_type.to_owned(),
                uri.to_owned(),
            ),
        };

        if identifier.is_empty() {
            return Err(RuntimeError::invalid_data(format!(
                "relationship '{}' has an empty identifier",
                uri
            )));
        }

        // the target type must be declared, even though the target
        // instance need not exist
        mm.get_type(&modelutil::fully_qualified_name(&namespace, &type_name))?;

        Ok(Relationship {
            namespace,
            type_name,
            identifier,
        })
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri())
    }
}
