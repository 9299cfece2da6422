/// Recursive-descent parser for the Concerto model DSL.
///
/// Produces the raw AST in `crate::ast`; no name resolution or cross-file
/// checking happens here. Grammar-level rules (namespace first, enum bodies
/// carry only bare values, relationships take no modifiers) are enforced
/// during the parse.
use crate::ast::{
    Provenance, RawDeclaration, RawDeclarationKind, RawImport, RawMember, RawModel,
};
use crate::error::ModelError;
use crate::lexer::{Spanned, Token};

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn cur_line(&self) -> u32 {
        self.cur().line
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn err(&self, msg: impl Into<String>) -> ModelError {
        ModelError::parse(&self.filename, self.cur_line(), msg)
    }

    fn prov(&self, line: u32) -> Provenance {
        Provenance {
            file: self.filename.clone(),
            line,
        }
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn expect_word(&mut self, expected: &str) -> Result<u32, ModelError> {
        let line = self.cur_line();
        if self.is_word(expected) {
            self.advance();
            return Ok(line);
        }
        Err(self.err(format!("expected '{}', got {:?}", expected, self.peek())))
    }

    fn expect(&mut self, expected: Token) -> Result<(), ModelError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, got {:?}", expected, self.peek())))
        }
    }

    fn take_word(&mut self) -> Result<String, ModelError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!("expected identifier, got {:?}", self.peek())))
        }
    }

    /// `a.b.c` — at least one segment.
    fn take_qualified_name(&mut self) -> Result<String, ModelError> {
        let mut name = self.take_word()?;
        while self.peek() == &Token::Dot {
            // stop before the `*` of a wildcard import
            if matches!(self.tokens.get(self.pos + 1).map(|s| &s.token), Some(Token::Star)) {
                break;
            }
            self.advance();
            name.push('.');
            name.push_str(&self.take_word()?);
        }
        Ok(name)
    }

    // -- Top level ----------------------------------------------------

    fn parse_model(&mut self) -> Result<RawModel, ModelError> {
        self.expect_word("namespace")?;
        let namespace = self.take_qualified_name()?;

        let mut imports = Vec::new();
        while self.is_word("import") {
            imports.push(self.parse_import()?);
        }

        let mut declarations = Vec::new();
        while self.peek() != &Token::Eof {
            declarations.push(self.parse_declaration()?);
        }

        Ok(RawModel {
            namespace,
            imports,
            declarations,
        })
    }

    fn parse_import(&mut self) -> Result<RawImport, ModelError> {
        let line = self.expect_word("import")?;
        let qualified = self.take_qualified_name()?;
        if self.peek() == &Token::Dot {
            // wildcard: `import ns.*`
            self.advance();
            self.expect(Token::Star)?;
            return Ok(RawImport {
                namespace: qualified,
                type_name: None,
                prov: self.prov(line),
            });
        }
        match qualified.rsplit_once('.') {
            Some((ns, type_name)) => Ok(RawImport {
                namespace: ns.to_owned(),
                type_name: Some(type_name.to_owned()),
                prov: self.prov(line),
            }),
            None => Err(ModelError::parse(
                &self.filename,
                line,
                format!("import '{}' is not fully qualified", qualified),
            )),
        }
    }

    fn parse_declaration(&mut self) -> Result<RawDeclaration, ModelError> {
        let line = self.cur_line();
        let mut is_abstract = false;
        if self.is_word("abstract") {
            is_abstract = true;
            self.advance();
        }

        let kind = match self.peek().clone() {
            Token::Word(w) => match w.as_str() {
                "asset" => RawDeclarationKind::Asset,
                "participant" => RawDeclarationKind::Participant,
                "transaction" => RawDeclarationKind::Transaction,
                "event" => RawDeclarationKind::Event,
                "concept" => RawDeclarationKind::Concept,
                "enum" => RawDeclarationKind::Enum,
                other => {
                    return Err(self.err(format!("unexpected token '{}'", other)));
                }
            },
            other => {
                return Err(self.err(format!(
                    "expected declaration keyword, got {:?}",
                    other
                )));
            }
        };
        self.advance();

        if kind == RawDeclarationKind::Enum && is_abstract {
            return Err(ModelError::parse(
                &self.filename,
                line,
                "enum declarations cannot be abstract",
            ));
        }

        let name = self.take_word()?;

        let mut id_field = None;
        if self.is_word("identified") {
            if matches!(kind, RawDeclarationKind::Enum | RawDeclarationKind::Concept) {
                return Err(self.err(format!(
                    "'{}' declarations cannot have an identifier",
                    keyword(kind)
                )));
            }
            self.advance();
            self.expect_word("by")?;
            id_field = Some(self.take_word()?);
        }

        let mut super_type = None;
        if self.is_word("extends") {
            if kind == RawDeclarationKind::Enum {
                return Err(self.err("enum declarations cannot extend"));
            }
            self.advance();
            super_type = Some(self.take_word()?);
        }

        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while self.peek() != &Token::RBrace {
            if self.peek() == &Token::Eof {
                return Err(self.err(format!("unexpected end of file in '{}'", name)));
            }
            members.push(self.parse_member(kind)?);
        }
        self.expect(Token::RBrace)?;

        Ok(RawDeclaration {
            kind,
            name,
            is_abstract,
            id_field,
            super_type,
            members,
            prov: self.prov(line),
        })
    }

    // -- Members ------------------------------------------------------

    fn parse_member(&mut self, kind: RawDeclarationKind) -> Result<RawMember, ModelError> {
        let line = self.cur_line();
        if self.peek() == &Token::Arrow {
            if kind == RawDeclarationKind::Enum {
                return Err(self.err("enum declarations cannot contain relationships"));
            }
            self.advance();
            let type_name = self.take_word()?;
            let array = self.take_array_suffix()?;
            let name = self.take_word()?;
            return Ok(RawMember::Relationship {
                name,
                type_name,
                array,
                prov: self.prov(line),
            });
        }

        self.expect_word("o")?;

        if kind == RawDeclarationKind::Enum {
            let name = self.take_word()?;
            return Ok(RawMember::EnumValue {
                name,
                prov: self.prov(line),
            });
        }

        let type_name = self.take_word()?;
        let array = self.take_array_suffix()?;
        let name = self.take_word()?;

        let mut optional = false;
        let mut default_value = None;
        let mut regex = None;
        let mut range = None;
        loop {
            if self.is_word("optional") {
                self.advance();
                optional = true;
            } else if self.is_word("default") {
                self.advance();
                self.expect(Token::Eq)?;
                default_value = Some(self.take_default_literal()?);
            } else if self.is_word("regex") {
                self.advance();
                self.expect(Token::Eq)?;
                regex = Some(self.take_regex()?);
            } else if self.is_word("range") {
                self.advance();
                self.expect(Token::Eq)?;
                range = Some(self.take_range()?);
            } else {
                break;
            }
        }

        Ok(RawMember::Field {
            name,
            type_name,
            array,
            optional,
            default_value,
            regex,
            range,
            prov: self.prov(line),
        })
    }

    fn take_array_suffix(&mut self) -> Result<bool, ModelError> {
        if self.peek() == &Token::LBracket {
            self.advance();
            self.expect(Token::RBracket)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Default values are kept as raw text; coercion happens at
    /// instantiation time against the declared field type.
    fn take_default_literal(&mut self) -> Result<String, ModelError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(s)
            }
            Token::Int(n) => {
                self.advance();
                Ok(n.to_string())
            }
            Token::Float(f) => {
                self.advance();
                Ok(f)
            }
            Token::Word(w) if w == "true" || w == "false" => {
                self.advance();
                Ok(w)
            }
            other => Err(self.err(format!("expected default value literal, got {:?}", other))),
        }
    }

    fn take_regex(&mut self) -> Result<String, ModelError> {
        if let Token::Regex(r) = self.peek().clone() {
            self.advance();
            Ok(r)
        } else {
            Err(self.err(format!("expected regex literal, got {:?}", self.peek())))
        }
    }

    /// `[lo,hi]` with either bound optional.
    fn take_range(&mut self) -> Result<(Option<i64>, Option<i64>), ModelError> {
        self.expect(Token::LBracket)?;
        let lower = self.take_optional_int()?;
        self.expect(Token::Comma)?;
        let upper = self.take_optional_int()?;
        self.expect(Token::RBracket)?;
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(self.err(format!("range lower bound {} exceeds upper bound {}", lo, hi)));
            }
        }
        if lower.is_none() && upper.is_none() {
            return Err(self.err("range must declare at least one bound"));
        }
        Ok((lower, upper))
    }

    fn take_optional_int(&mut self) -> Result<Option<i64>, ModelError> {
        if let Token::Int(n) = self.peek().clone() {
            self.advance();
            Ok(Some(n))
        } else {
            Ok(None)
        }
    }
}

fn keyword(kind: RawDeclarationKind) -> &'static str {
    match kind {
        RawDeclarationKind::Asset => "asset",
        RawDeclarationKind::Participant => "participant",
        RawDeclarationKind::Transaction => "transaction",
        RawDeclarationKind::Event => "event",
        RawDeclarationKind::Concept => "concept",
        RawDeclarationKind::Enum => "enum",
    }
}

pub fn parse(tokens: &[Spanned], filename: &str) -> Result<RawModel, ModelError> {
    let mut p = Parser::new(tokens, filename);
    p.parse_model()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_src(src: &str) -> Result<RawModel, ModelError> {
        let tokens = lexer::lex(src, "test.cto")?;
        parse(&tokens, "test.cto")
    }

    #[test]
    fn parses_namespace_imports_and_asset() {
        let model = parse_src(
            r#"
namespace org.acme
import org.other.Person
import org.misc.*

asset Car identified by vin extends Vehicle {
    o String vin
    o Integer mileage optional
    --> Person owner
}
"#,
        )
        .unwrap();
        assert_eq!(model.namespace, "org.acme");
        assert_eq!(model.imports.len(), 2);
        assert_eq!(model.imports[0].type_name.as_deref(), Some("Person"));
        assert!(model.imports[1].type_name.is_none());
        let decl = &model.declarations[0];
        assert_eq!(decl.kind, RawDeclarationKind::Asset);
        assert_eq!(decl.id_field.as_deref(), Some("vin"));
        assert_eq!(decl.super_type.as_deref(), Some("Vehicle"));
        assert_eq!(decl.members.len(), 3);
        match &decl.members[1] {
            RawMember::Field { optional, .. } => assert!(optional),
            other => panic!("expected field, got {:?}", other),
        }
        match &decl.members[2] {
            RawMember::Relationship { type_name, .. } => assert_eq!(type_name, "Person"),
            other => panic!("expected relationship, got {:?}", other),
        }
    }

    #[test]
    fn parses_enum_values() {
        let model = parse_src("namespace n\nenum Color { o RED o GREEN o BLUE }").unwrap();
        assert_eq!(model.declarations[0].members.len(), 3);
        assert!(matches!(
            model.declarations[0].members[0],
            RawMember::EnumValue { .. }
        ));
    }

    #[test]
    fn parses_field_modifiers() {
        let model = parse_src(
            "namespace n\nconcept C { o String s default=\"x\" regex=/^[a-z]+$/ o Integer i range=[0,10] default=5 }",
        )
        .unwrap();
        match &model.declarations[0].members[0] {
            RawMember::Field {
                default_value,
                regex,
                ..
            } => {
                assert_eq!(default_value.as_deref(), Some("x"));
                assert_eq!(regex.as_deref(), Some("^[a-z]+$"));
            }
            other => panic!("expected field, got {:?}", other),
        }
        match &model.declarations[0].members[1] {
            RawMember::Field { range, default_value, .. } => {
                assert_eq!(*range, Some((Some(0), Some(10))));
                assert_eq!(default_value.as_deref(), Some("5"));
            }
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn rejects_identified_enum() {
        let err = parse_src("namespace n\nenum E identified by x { o A }").unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn rejects_relationship_in_enum() {
        let err = parse_src("namespace n\nenum E { --> P p }").unwrap_err();
        assert!(err.to_string().contains("relationships"));
    }

    #[test]
    fn rejects_relationship_modifiers() {
        // `optional` after a relationship is not part of the grammar: the
        // member loop sees a stray word and fails
        let err = parse_src("namespace n\nasset A identified by x { o String x --> P p optional }")
            .unwrap_err();
        assert!(err.to_string().contains("expected"));
    }

    #[test]
    fn rejects_missing_namespace() {
        let err = parse_src("asset A { o String x }").unwrap_err();
        assert!(err.to_string().contains("namespace"));
    }

    #[test]
    fn rejects_empty_range() {
        let err = parse_src("namespace n\nconcept C { o Integer i range=[,] }").unwrap_err();
        assert!(err.to_string().contains("at least one bound"));
    }

    #[test]
    fn abstract_declarations() {
        let model = parse_src("namespace n\nabstract asset Base identified by id { o String id }")
            .unwrap();
        assert!(model.declarations[0].is_abstract);
    }
}
