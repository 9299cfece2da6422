//! Pure name-splitting and primitive-type helpers shared across the
//! registry and the serialization pipeline.

use crate::error::ModelError;
use crate::modelmanager::ModelManager;

/// The closed set of primitive type names.
pub const PRIMITIVE_TYPES: [&str; 6] = [
    "Boolean", "String", "DateTime", "Double", "Integer", "Long",
];

/// Substring after the last `.`, or the whole string if there is none.
pub fn short_name(fqn: &str) -> &str {
    match fqn.rsplit_once('.') {
        Some((_, short)) => short,
        None => fqn,
    }
}

/// Substring before the last `.`, or `""` if there is none.
pub fn namespace(fqn: &str) -> &str {
    match fqn.rsplit_once('.') {
        Some((ns, _)) => ns,
        None => "",
    }
}

/// Join a namespace and a short name. A name with an empty namespace (a
/// primitive) passes through unqualified.
pub fn fully_qualified_name(ns: &str, name: &str) -> String {
    if ns.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", ns, name)
    }
}

pub fn is_primitive_type(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

/// True iff `type_fqn` is `target_fqn` or one of its subtypes: equality, or
/// an iterative walk up `type_fqn`'s supertype chain reaching `target_fqn`.
/// Fails if `type_fqn` resolves to no declaration.
pub fn is_assignable_to(
    mm: &ModelManager,
    type_fqn: &str,
    target_fqn: &str,
) -> Result<bool, ModelError> {
    if type_fqn == target_fqn {
        return Ok(true);
    }
    let mut current = mm.get_type(type_fqn)?;
    // bounded by the registry size so a cyclic chain cannot spin forever
    let mut remaining = mm.declaration_count();
    while let Some(super_fqn) = current.super_type_fqn(mm)? {
        if super_fqn == target_fqn {
            return Ok(true);
        }
        if remaining == 0 {
            return Err(ModelError::illegal(format!(
                "cyclic supertype chain detected walking '{}'",
                type_fqn
            )));
        }
        remaining -= 1;
        current = mm.get_type(&super_fqn)?;
    }
    Ok(false)
}
