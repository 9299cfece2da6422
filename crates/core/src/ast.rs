//! Raw AST types produced by the model parser.
//!
//! These are pure parse shapes: names are unresolved, no cross-file or
//! cross-declaration checking has happened. The introspection layer
//! (`ClassDeclaration`/`Property`) is built from these nodes by
//! `ModelFile::from_text`.

// ──────────────────────────────────────────────
// Provenance
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Provenance {
    pub file: String,
    pub line: u32,
}

// ──────────────────────────────────────────────
// Model file
// ──────────────────────────────────────────────

/// One parsed `.cto` file: a namespace, its imports, and its declarations.
#[derive(Debug, Clone)]
pub struct RawModel {
    pub namespace: String,
    pub imports: Vec<RawImport>,
    pub declarations: Vec<RawDeclaration>,
}

/// `import ns.Type` or `import ns.*`.
#[derive(Debug, Clone)]
pub struct RawImport {
    pub namespace: String,
    /// `None` for a wildcard import.
    pub type_name: Option<String>,
    pub prov: Provenance,
}

// ──────────────────────────────────────────────
// Declarations
// ──────────────────────────────────────────────

/// The declaration keyword, kept verbatim for introspection dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDeclarationKind {
    Asset,
    Participant,
    Transaction,
    Event,
    Concept,
    Enum,
}

#[derive(Debug, Clone)]
pub struct RawDeclaration {
    pub kind: RawDeclarationKind,
    pub name: String,
    pub is_abstract: bool,
    /// `identified by <field>`
    pub id_field: Option<String>,
    /// `extends <name>` — unresolved (short or imported name)
    pub super_type: Option<String>,
    pub members: Vec<RawMember>,
    pub prov: Provenance,
}

// ──────────────────────────────────────────────
// Members
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum RawMember {
    /// `o Type[] name default=… regex=/…/ range=[lo,hi] optional`
    Field {
        name: String,
        type_name: String,
        array: bool,
        optional: bool,
        /// Default kept as raw text; coerced per field type at
        /// instantiation time.
        default_value: Option<String>,
        regex: Option<String>,
        range: Option<(Option<i64>, Option<i64>)>,
        prov: Provenance,
    },
    /// `--> Type[] name`
    Relationship {
        name: String,
        type_name: String,
        array: bool,
        prov: Provenance,
    },
    /// `o NAME` inside an enum body
    EnumValue { name: String, prov: Provenance },
}
