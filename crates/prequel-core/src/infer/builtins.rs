//! Built-in operator and function signatures.
//!
//! Schemes quantify over placeholder variables `'0`, `'1`, …; they are
//! instantiated with session-fresh variables at every use site.
//! Variadic schemes replicate their last parameter to match the call's
//! arity.

use crate::ast::{InfixOp, PrefixOp, TextMatchOp};
use crate::types::{Type, TypeScheme, TypeVar};

use super::unify::TypeVarGen;

fn a() -> Type {
    Type::var(TypeVar(0))
}

fn b() -> Type {
    Type::var(TypeVar(1))
}

fn scheme1(params: Vec<Type>, ret: Type) -> TypeScheme {
    TypeScheme::poly(
        vec![TypeVar(0)],
        Type::Fn {
            params,
            ret: Box::new(ret),
        },
    )
}

fn scheme2(params: Vec<Type>, ret: Type) -> TypeScheme {
    TypeScheme::poly(
        vec![TypeVar(0), TypeVar(1)],
        Type::Fn {
            params,
            ret: Box::new(ret),
        },
    )
}

fn mono(params: Vec<Type>, ret: Type) -> TypeScheme {
    TypeScheme::mono(Type::Fn {
        params,
        ret: Box::new(ret),
    })
}

fn variadic(vars: Vec<TypeVar>, params: Vec<Type>, ret: Type) -> TypeScheme {
    TypeScheme::variadic(
        vars,
        Type::Fn {
            params,
            ret: Box::new(ret),
        },
    )
}

pub fn prefix_scheme(op: PrefixOp) -> TypeScheme {
    match op {
        // `+ - ~` : ∀a. a → a
        PrefixOp::Plus | PrefixOp::Negate | PrefixOp::BitNot => scheme1(vec![a()], a()),
        PrefixOp::Not => scheme1(vec![a()], Type::bool()),
    }
}

pub fn infix_scheme(op: InfixOp) -> TypeScheme {
    match op {
        // arithmetic and bitwise: ∀a. (a, a) → a
        InfixOp::Add
        | InfixOp::Subtract
        | InfixOp::Multiply
        | InfixOp::Divide
        | InfixOp::Modulo
        | InfixOp::BitAnd
        | InfixOp::BitOr
        | InfixOp::ShiftLeft
        | InfixOp::ShiftRight => scheme1(vec![a(), a()], a()),
        // comparisons, equality, IS family, logic: ∀a. (a, a) → BOOL
        InfixOp::Eq
        | InfixOp::NotEq
        | InfixOp::Less
        | InfixOp::Greater
        | InfixOp::LessEq
        | InfixOp::GreaterEq
        | InfixOp::Is
        | InfixOp::IsNot
        | InfixOp::IsDistinctFrom
        | InfixOp::IsNotDistinctFrom
        | InfixOp::And
        | InfixOp::Or => scheme1(vec![a(), a()], Type::bool()),
        // `||` : ∀a,b. (a, b) → TEXT
        InfixOp::Concat => scheme2(vec![a(), b()], Type::text()),
        // `->>` extracts a fresh type; `->` stays JSON-opaque.
        InfixOp::JsonExtract => scheme2(vec![a(), Type::any()], b()),
        InfixOp::JsonArrow => scheme1(vec![a(), Type::any()], Type::any()),
    }
}

pub fn text_match_scheme(op: TextMatchOp) -> TypeScheme {
    match op {
        // LIKE compares like equality; the rest take (ANY, TEXT).
        TextMatchOp::Like => scheme1(vec![a(), a()], Type::bool()),
        TextMatchOp::Glob | TextMatchOp::Match | TextMatchOp::Regexp => {
            mono(vec![Type::any(), Type::text()], Type::bool())
        }
    }
}

/// Whether a call to this function makes a bare SELECT single-row.
pub fn is_aggregate(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "count" | "sum" | "avg" | "min" | "max" | "total" | "group_concat"
    )
}

/// The scheme for a built-in scalar or aggregate function, looked up
/// case-insensitively.
pub fn function_scheme(name: &str) -> Option<TypeScheme> {
    let var0 = vec![TypeVar(0)];
    let scheme = match name.to_lowercase().as_str() {
        "count" => variadic(var0, vec![a()], Type::integer()),
        "sum" => scheme1(vec![a()], Type::optional(a())),
        "total" => scheme1(vec![a()], Type::real()),
        "avg" => scheme1(vec![a()], Type::optional(Type::real())),
        "min" | "max" => variadic(var0, vec![a()], a()),
        "group_concat" => variadic(var0, vec![a(), Type::text()], Type::text()),

        "abs" | "unlikely" | "likely" => scheme1(vec![a()], a()),
        "likelihood" => scheme1(vec![a(), Type::real()], a()),
        "coalesce" => variadic(var0, vec![a(), a()], a()),
        "ifnull" => scheme1(vec![a(), a()], a()),
        "nullif" => scheme1(vec![a(), a()], Type::optional(a())),
        "iif" => scheme1(vec![Type::bool(), a(), a()], a()),

        "length" | "octet_length" => scheme1(vec![a()], Type::integer()),
        "lower" | "upper" | "trim" | "ltrim" | "rtrim" => {
            variadic(Vec::new(), vec![Type::text(), Type::text()], Type::text())
        }
        "substr" | "substring" => mono(
            vec![Type::text(), Type::integer(), Type::integer()],
            Type::text(),
        ),
        "instr" => mono(vec![Type::text(), Type::text()], Type::integer()),
        "replace" => mono(vec![Type::text(), Type::text(), Type::text()], Type::text()),
        "hex" | "quote" | "typeof" => scheme1(vec![a()], Type::text()),
        "unhex" => variadic(Vec::new(), vec![Type::text(), Type::text()], Type::blob()),
        "unicode" => mono(vec![Type::text()], Type::integer()),
        "char" => variadic(Vec::new(), vec![Type::integer()], Type::text()),
        "printf" | "format" => variadic(var0, vec![Type::text(), a()], Type::text()),
        "concat" => variadic(var0, vec![a()], Type::text()),
        "concat_ws" => variadic(vec![TypeVar(0), TypeVar(1)], vec![a(), b()], Type::text()),

        "round" => variadic(Vec::new(), vec![Type::real(), Type::integer()], Type::real()),
        "sign" => scheme1(vec![a()], Type::integer()),
        "random" => mono(Vec::new(), Type::integer()),
        "randomblob" | "zeroblob" => mono(vec![Type::integer()], Type::blob()),
        "last_insert_rowid" | "changes" | "total_changes" => mono(Vec::new(), Type::integer()),

        "date" | "time" | "datetime" => {
            variadic(Vec::new(), vec![Type::text(), Type::text()], Type::text())
        }
        "strftime" => variadic(Vec::new(), vec![Type::text(), Type::text()], Type::text()),
        "julianday" | "unixepoch" => {
            variadic(Vec::new(), vec![Type::text(), Type::text()], Type::real())
        }

        "json" | "json_array" | "json_object" | "json_insert" | "json_replace" | "json_set"
        | "json_patch" | "json_remove" => variadic(var0, vec![a()], Type::text()),
        "json_extract" => variadic(vec![TypeVar(0), TypeVar(1)], vec![a(), Type::text()], b()),
        "json_array_length" => variadic(Vec::new(), vec![Type::text(), Type::text()], Type::integer()),
        "json_type" | "json_quote" => scheme1(vec![a()], Type::text()),
        "json_valid" => scheme1(vec![a()], Type::bool()),

        // FTS5 auxiliary functions; the first argument is the table.
        "highlight" => mono(
            vec![Type::any(), Type::integer(), Type::text(), Type::text()],
            Type::text(),
        ),
        "snippet" => mono(
            vec![
                Type::any(),
                Type::integer(),
                Type::text(),
                Type::text(),
                Type::text(),
                Type::integer(),
            ],
            Type::text(),
        ),
        "bm25" => variadic(Vec::new(), vec![Type::any(), Type::real()], Type::real()),

        _ => return None,
    };
    Some(scheme)
}

/// Instantiates a scheme for a call of the given arity: quantified
/// variables become fresh, the last parameter replicates (variadic) or
/// trailing optional parameters drop to match.
pub fn instantiate(scheme: &TypeScheme, arity: usize, gen: &mut TypeVarGen) -> (Vec<Type>, Type) {
    let fresh: Vec<(TypeVar, Type)> = scheme
        .vars
        .iter()
        .map(|v| (*v, Type::var(gen.fresh())))
        .collect();
    let ty = rename(&scheme.ty, &fresh);
    let (mut params, ret) = match ty {
        Type::Fn { params, ret } => (params, *ret),
        other => (Vec::new(), other),
    };
    if arity > params.len() {
        if let Some(last) = params.last().cloned() {
            while params.len() < arity {
                params.push(last.clone());
            }
        }
    } else {
        params.truncate(arity);
    }
    (params, ret)
}

fn rename(ty: &Type, fresh: &[(TypeVar, Type)]) -> Type {
    match ty {
        Type::Var { id } => fresh
            .iter()
            .find(|(v, _)| v == id)
            .map(|(_, t)| t.clone())
            .unwrap_or_else(|| ty.clone()),
        Type::Optional { inner } => Type::optional(rename(inner, fresh)),
        Type::Alias { storage, alias } => Type::alias(rename(storage, fresh), alias.clone()),
        Type::Fn { params, ret } => Type::Fn {
            params: params.iter().map(|p| rename(p, fresh)).collect(),
            ret: Box::new(rename(ret, fresh)),
        },
        Type::Row { shape } => Type::Row {
            shape: match shape {
                crate::types::RowShape::Named { columns } => crate::types::RowShape::Named {
                    columns: columns
                        .iter()
                        .map(|(n, t)| (n.clone(), rename(t, fresh)))
                        .collect(),
                },
                crate::types::RowShape::Fixed { items } => crate::types::RowShape::Fixed {
                    items: items.iter().map(|t| rename(t, fresh)).collect(),
                },
                crate::types::RowShape::Unknown { element } => crate::types::RowShape::Unknown {
                    element: Box::new(rename(element, fresh)),
                },
                crate::types::RowShape::Empty => crate::types::RowShape::Empty,
            },
        },
        Type::Nominal { .. } | Type::Error => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instantiation_mints_fresh_variables() {
        let mut gen = TypeVarGen::new();
        let scheme = infix_scheme(InfixOp::Add);
        let (params1, _) = instantiate(&scheme, 2, &mut gen);
        let (params2, _) = instantiate(&scheme, 2, &mut gen);
        assert_eq!(params1.len(), 2);
        assert_eq!(params1[0], params1[1]);
        assert_ne!(params1[0], params2[0]);
    }

    #[test]
    fn variadic_replicates_last_parameter() {
        let mut gen = TypeVarGen::new();
        let scheme = function_scheme("coalesce").unwrap();
        let (params, ret) = instantiate(&scheme, 4, &mut gen);
        assert_eq!(params.len(), 4);
        assert_eq!(params[0], params[3]);
        assert_eq!(ret, params[0]);
    }

    #[test]
    fn trailing_parameters_drop_to_arity() {
        let mut gen = TypeVarGen::new();
        let scheme = function_scheme("round").unwrap();
        let (params, ret) = instantiate(&scheme, 1, &mut gen);
        assert_eq!(params, vec![Type::real()]);
        assert_eq!(ret, Type::real());
    }

    #[test]
    fn aggregates_are_recognized() {
        assert!(is_aggregate("COUNT"));
        assert!(is_aggregate("max"));
        assert!(!is_aggregate("length"));
    }
}
