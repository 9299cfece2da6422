//! concerto-runtime: the Concerto runtime object model.
//!
//! Instantiates typed resources from a `concerto-core` registry and
//! round-trips them through the model-aware JSON wire format.
//!
//! # Public API
//!
//! - [`Factory`] -- the sole constructor of [`Resource`]s and
//!   [`Relationship`]s, enforcing existence and abstractness checks
//! - [`Resource`] -- a typed, mutable instance; live-validated by default
//! - [`Serializer`] -- the bidirectional Resource ⇄ JSON transform
//! - [`Value`] -- runtime property values
//! - [`RuntimeError`] -- validation, serialization, and traversal errors
//!
//! Every operation takes the live `&ModelManager` explicitly: resources
//! hold no registry pointers and re-resolve their declaration on each
//! call, so they always reflect the current model. The flip side is
//! documented in the concurrency notes: hot-swapping model files while
//! resources built against the old model are still being validated or
//! serialized can observe an inconsistent shape mid-operation. A manager
//! plus its resources must be externally serialized in concurrent hosts.

pub mod error;
pub mod factory;
pub mod relationship;
pub mod resource;
pub mod serializer;
pub mod typed_stack;
pub mod validator;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::RuntimeError;
pub use factory::{Factory, ResourceOptions};
pub use relationship::Relationship;
pub use resource::Resource;
pub use serializer::{DeserializeOptions, SerializeOptions, Serializer};
pub use typed_stack::TypedStack;
pub use value::Value;
