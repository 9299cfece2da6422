/// Errors raised while parsing model text or validating the type registry.
///
/// Every variant carries enough context to build an actionable message:
/// parse errors name the file and line, resolution errors name the
/// referencing site.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Malformed model source text (lexer or parser).
    #[error("{file}: line {line}: {message}")]
    Parse {
        file: String,
        line: u32,
        message: String,
    },

    /// A structurally invalid model: duplicate property names, bad
    /// identifier field, unresolvable or cyclic supertype, malformed
    /// declaration body.
    #[error("{message}")]
    IllegalModel { message: String },

    /// No ModelFile is registered for the namespace.
    #[error("namespace '{namespace}' is not registered{}", fmt_context(.context))]
    NamespaceNotFound {
        namespace: String,
        context: Option<String>,
    },

    /// The namespace is registered but does not declare the type, or the
    /// name is a primitive and has no declaration.
    #[error("type '{type_name}' is not declared in namespace '{namespace}'{}", fmt_context(.context))]
    TypeNotFound {
        namespace: String,
        type_name: String,
        context: Option<String>,
    },

    /// A short name could not be resolved locally or through the import
    /// table of its ModelFile.
    #[error("could not resolve name '{name}' in namespace '{namespace}'")]
    UnresolvedName { namespace: String, name: String },

    /// Attempt to add a ModelFile for a namespace that is already
    /// registered.
    #[error("namespace '{namespace}' is already declared{}", fmt_file(.existing_file))]
    NamespaceExists {
        namespace: String,
        existing_file: Option<String>,
    },
}

fn fmt_context(context: &Option<String>) -> String {
    match context {
        Some(c) => format!(" (referenced from {})", c),
        None => String::new(),
    }
}

fn fmt_file(file: &Option<String>) -> String {
    match file {
        Some(f) => format!(" in file {}", f),
        None => String::new(),
    }
}

impl ModelError {
    pub fn parse(file: &str, line: u32, message: impl Into<String>) -> Self {
        ModelError::Parse {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn illegal(message: impl Into<String>) -> Self {
        ModelError::IllegalModel {
            message: message.into(),
        }
    }
}
