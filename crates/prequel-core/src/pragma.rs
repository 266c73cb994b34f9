//! Dialect directives that affect typing.
//!
//! Two pragmas are recognized: `PRAGMA type_alias(NAME AS STORAGE)`
//! registers a nominal name as an alias over a storage type, and
//! `PRAGMA hint_bool(NAME)` marks columns with that name as boolean in
//! generated code. Every other pragma passes through to SQL emission
//! untouched and has no effect on typing.

use indexmap::IndexMap;

use crate::ast::{Pragma, PragmaArg, TypeName};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::span::Span;
use crate::types::Type;

/// Maps a declared SQL type name onto the nominal the type system
/// reasons about, following SQLite's affinity rules.
pub fn type_affinity(declared: &str) -> &'static str {
    let upper = declared.to_uppercase();
    if upper == "BOOL" || upper == "BOOLEAN" {
        "BOOL"
    } else if upper == "ANY" {
        "ANY"
    } else if upper.contains("INT") {
        "INTEGER"
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        "TEXT"
    } else if upper.is_empty() || upper.contains("BLOB") {
        "BLOB"
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        "REAL"
    } else {
        "NUMERIC"
    }
}

/// The registered directives in effect for a compilation session.
#[derive(Debug, Clone, Default)]
pub struct PragmaState {
    /// Alias name (uppercased) → storage nominal.
    type_aliases: IndexMap<String, String>,
    /// Column names (lowercased) hinted as boolean.
    bool_hints: Vec<String>,
}

impl PragmaState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a pragma statement if it is one of ours. Returns true
    /// when the directive was recognized.
    pub fn apply(&mut self, pragma: &Pragma, span: Span, diagnostics: &mut Diagnostics) -> bool {
        match pragma.name.value.to_lowercase().as_str() {
            "type_alias" => {
                match &pragma.arg {
                    Some(PragmaArg::Call {
                        operand,
                        alias: Some(storage),
                    }) => {
                        if let Some(name) = operand.as_name() {
                            self.type_aliases.insert(
                                name.to_uppercase(),
                                type_affinity(&storage.value).to_string(),
                            );
                        } else {
                            diagnostics.push(Diagnostic::error(
                                "type_alias expects `PRAGMA type_alias(NAME AS STORAGE)`",
                                span,
                            ));
                        }
                    }
                    _ => diagnostics.push(Diagnostic::error(
                        "type_alias expects `PRAGMA type_alias(NAME AS STORAGE)`",
                        span,
                    )),
                }
                true
            }
            "hint_bool" => {
                match &pragma.arg {
                    Some(PragmaArg::Call { operand, alias: None }) => {
                        if let Some(name) = operand.as_name() {
                            self.bool_hints.push(name.to_lowercase());
                        } else {
                            diagnostics.push(Diagnostic::error(
                                "hint_bool expects `PRAGMA hint_bool(NAME)`",
                                span,
                            ));
                        }
                    }
                    _ => diagnostics.push(Diagnostic::error(
                        "hint_bool expects `PRAGMA hint_bool(NAME)`",
                        span,
                    )),
                }
                true
            }
            _ => false,
        }
    }

    pub fn is_bool_hint(&self, column_name: &str) -> bool {
        self.bool_hints
            .iter()
            .any(|hint| hint == &column_name.to_lowercase())
    }

    /// Resolves a declared type to the algebra: an explicit `AS Alias`
    /// suffix wins, then registered aliases, then plain affinity.
    pub fn resolve_type(&self, declared: &TypeName) -> Type {
        let base = Type::nominal(type_affinity(&declared.name.value));
        if let Some(alias) = &declared.alias {
            return Type::alias(base, alias.value.clone());
        }
        let key = declared.name.value.to_uppercase();
        if let Some(storage) = self.type_aliases.get(&key) {
            return Type::alias(Type::nominal(storage.clone()), key);
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ident;

    fn type_name(name: &str, alias: Option<&str>) -> TypeName {
        TypeName {
            name: Ident::new(name, Span::new(0, name.len())),
            args: Vec::new(),
            alias: alias.map(|a| Ident::new(a, Span::new(0, 0))),
            alias_span: None,
            span: Span::new(0, name.len()),
        }
    }

    #[test]
    fn affinity_follows_sqlite_rules() {
        assert_eq!(type_affinity("INT"), "INTEGER");
        assert_eq!(type_affinity("BIGINT"), "INTEGER");
        assert_eq!(type_affinity("VARCHAR"), "TEXT");
        assert_eq!(type_affinity("BLOB"), "BLOB");
        assert_eq!(type_affinity("DOUBLE"), "REAL");
        assert_eq!(type_affinity("BOOLEAN"), "BOOL");
        assert_eq!(type_affinity("DECIMAL"), "NUMERIC");
    }

    #[test]
    fn explicit_alias_suffix_wins() {
        let state = PragmaState::new();
        let ty = state.resolve_type(&type_name("TEXT", Some("UUID")));
        assert_eq!(ty, Type::alias(Type::text(), "UUID"));
    }

    #[test]
    fn registered_alias_applies_to_bare_names() {
        let mut state = PragmaState::new();
        state
            .type_aliases
            .insert("UUID".to_string(), "TEXT".to_string());
        let ty = state.resolve_type(&type_name("uuid", None));
        assert_eq!(ty, Type::alias(Type::text(), "UUID"));
    }
}
