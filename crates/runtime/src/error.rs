use concerto_core::ModelError;

/// All errors raised by the runtime object model and the serializer.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A parse/model/resolution failure bubbling up from the registry.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A value that violates its declared property's constraints, raised
    /// during a property write or a full-resource validation pass.
    #[error("validation error in {resource}: {message}")]
    Validation { resource: String, message: String },

    /// Instantiation of an abstract declaration.
    #[error("cannot instantiate abstract type '{type_name}'")]
    AbstractClass { type_name: String },

    /// A relationship-position value that is neither a Relationship nor a
    /// permitted embedded Resource.
    #[error("did not find a relationship for '{property}': found {found}")]
    NotARelationship { property: String, found: String },

    /// Malformed serialized input: missing `$class`, unexpected keys,
    /// wrong JSON shapes.
    #[error("invalid serialized data: {message}")]
    InvalidData { message: String },

    /// The JSON generator produced text that failed to reparse. An
    /// internal invariant violation, never a user input error.
    #[error("generator produced invalid JSON: {message}")]
    SerializationInvariant { message: String },

    /// TypedStack underflow or a wrong-shape traversal during a visitor
    /// walk: a bug in the pairing between the JSON and resource sides.
    #[error("traversal stack protocol violation: {message}")]
    StackProtocol { message: String },
}

impl RuntimeError {
    pub fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        RuntimeError::InvalidData {
            message: message.into(),
        }
    }

    pub fn stack(message: impl Into<String>) -> Self {
        RuntimeError::StackProtocol {
            message: message.into(),
        }
    }
}
