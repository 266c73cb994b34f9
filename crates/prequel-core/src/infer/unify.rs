//! Unification over the type algebra.
//!
//! Hindley-Milner style with a per-session substitution. The occurs
//! check is elided: rows stay monomorphic, so variable cycles cannot
//! arise from well-formed input.

use std::collections::HashMap;

use crate::types::{RowShape, Type, TypeVar};

/// Mints fresh type variables for one inference session.
#[derive(Debug, Default)]
pub struct TypeVarGen {
    next: u32,
}

impl TypeVarGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> TypeVar {
        let var = TypeVar(self.next);
        self.next += 1;
        var
    }
}

/// The session substitution: variable → resolved type.
#[derive(Debug, Default)]
pub struct Substitution {
    bindings: HashMap<TypeVar, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, var: TypeVar, ty: Type) {
        self.bindings.insert(var, ty);
    }

    /// Resolves a type fully: every bound variable is replaced by its
    /// binding, recursively. Unbound variables stay as they are.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var { id } => match self.bindings.get(id) {
                Some(bound) => self.apply(bound),
                None => ty.clone(),
            },
            Type::Optional { inner } => Type::optional(self.apply(inner)),
            Type::Alias { storage, alias } => Type::alias(self.apply(storage), alias.clone()),
            Type::Row { shape } => Type::Row {
                shape: self.apply_shape(shape),
            },
            Type::Fn { params, ret } => Type::Fn {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(ret)),
            },
            Type::Nominal { .. } | Type::Error => ty.clone(),
        }
    }

    fn apply_shape(&self, shape: &RowShape) -> RowShape {
        match shape {
            RowShape::Named { columns } => RowShape::Named {
                columns: columns
                    .iter()
                    .map(|(name, ty)| (name.clone(), self.apply(ty)))
                    .collect(),
            },
            RowShape::Fixed { items } => RowShape::Fixed {
                items: items.iter().map(|ty| self.apply(ty)).collect(),
            },
            RowShape::Unknown { element } => RowShape::Unknown {
                element: Box::new(self.apply(element)),
            },
            RowShape::Empty => RowShape::Empty,
        }
    }
}

/// A failed unification, carrying both resolved sides for the message.
#[derive(Debug, Clone, PartialEq)]
pub struct UnifyError {
    pub left: Type,
    pub right: Type,
}

/// Solves `a ≡ b`, binding variables in `sub`. Returns the merged
/// type: nominals keep the left spelling, named rows keep left names,
/// aliases survive on whichever side carries one, and optionality is
/// contagious.
pub fn unify(a: &Type, b: &Type, sub: &mut Substitution) -> Result<Type, UnifyError> {
    let a = sub.apply(a);
    let b = sub.apply(b);
    match (&a, &b) {
        // The error sentinel absorbs silently; the other side wins so
        // one bad expression does not cascade.
        (Type::Error, other) | (other, Type::Error) => Ok((*other).clone()),

        (Type::Var { id: va }, Type::Var { id: vb }) if va == vb => Ok(a.clone()),
        (Type::Var { id }, other) => {
            sub.bind(*id, (*other).clone());
            Ok((*other).clone())
        }
        (other, Type::Var { id }) => {
            sub.bind(*id, (*other).clone());
            Ok((*other).clone())
        }

        (Type::Optional { inner: ia }, Type::Optional { inner: ib }) => {
            Ok(Type::optional(unify(ia, ib, sub)?))
        }
        (Type::Optional { inner }, other) => Ok(Type::optional(unify(inner, other, sub)?)),
        (other, Type::Optional { inner }) => Ok(Type::optional(unify(other, inner, sub)?)),

        (Type::Alias { storage, alias }, other) => {
            let rhs = match other {
                Type::Alias { storage, .. } => storage,
                _ => other,
            };
            Ok(Type::alias(unify(storage, rhs, sub)?, alias.clone()))
        }
        (other, Type::Alias { storage, alias }) => {
            Ok(Type::alias(unify(other, storage, sub)?, alias.clone()))
        }

        (Type::Nominal { name: n }, Type::Nominal { name: m }) => {
            unify_nominal(n, m).ok_or(UnifyError { left: a.clone(), right: b.clone() })
        }

        (Type::Row { shape: sa }, Type::Row { shape: sb }) => unify_rows(sa, sb, sub)
            .map_err(|_| UnifyError {
                left: sub.apply(&a),
                right: sub.apply(&b),
            }),

        (Type::Fn { params: pa, ret: ra }, Type::Fn { params: pb, ret: rb }) => {
            if pa.len() != pb.len() {
                return Err(UnifyError { left: a.clone(), right: b.clone() });
            }
            let mut params = Vec::with_capacity(pa.len());
            for (x, y) in pa.iter().zip(pb) {
                params.push(unify(x, y, sub)?);
            }
            let ret = unify(ra, rb, sub)?;
            Ok(Type::Fn {
                params,
                ret: Box::new(ret),
            })
        }

        _ => Err(UnifyError { left: a, right: b }),
    }
}

/// Nominal names compare case-insensitively. `ANY` unifies with
/// everything, and the numeric family widens (INTEGER meets REAL at
/// REAL, NUMERIC yields to either, BOOL stores as an integer).
fn unify_nominal(n: &str, m: &str) -> Option<Type> {
    let nu = n.to_uppercase();
    let mu = m.to_uppercase();
    if nu == mu {
        return Some(Type::nominal(n));
    }
    if nu == "ANY" {
        return Some(Type::nominal(m));
    }
    if mu == "ANY" {
        return Some(Type::nominal(n));
    }
    let numeric = |s: &str| matches!(s, "INTEGER" | "REAL" | "NUMERIC" | "BOOL");
    if numeric(&nu) && numeric(&mu) {
        let merged = if nu == "BOOL" || mu == "BOOL" {
            "BOOL"
        } else if nu == "REAL" || mu == "REAL" {
            "REAL"
        } else {
            "INTEGER"
        };
        return Some(Type::nominal(merged));
    }
    None
}

fn unify_rows(a: &RowShape, b: &RowShape, sub: &mut Substitution) -> Result<Type, UnifyError> {
    let pairwise = |items_a: Vec<Type>,
                    items_b: Vec<Type>,
                    sub: &mut Substitution|
     -> Result<Vec<Type>, UnifyError> {
        if items_a.len() != items_b.len() {
            return Err(UnifyError {
                left: Type::Row { shape: a.clone() },
                right: Type::Row { shape: b.clone() },
            });
        }
        items_a
            .iter()
            .zip(&items_b)
            .map(|(x, y)| unify(x, y, sub))
            .collect()
    };

    match (a, b) {
        (RowShape::Empty, RowShape::Empty) => Ok(Type::empty_row()),
        (RowShape::Named { columns }, other) => {
            let names: Vec<String> = columns.keys().cloned().collect();
            let left: Vec<Type> = columns.values().cloned().collect();
            let right = shape_items(other, left.len());
            let merged = pairwise(left, right, sub)?;
            Ok(Type::named_row(names.into_iter().zip(merged)))
        }
        (RowShape::Fixed { items }, RowShape::Named { columns }) => {
            // Positional against named: the names come from the right
            // since the left has none.
            let names: Vec<String> = columns.keys().cloned().collect();
            let right: Vec<Type> = columns.values().cloned().collect();
            let merged = pairwise(items.clone(), right, sub)?;
            Ok(Type::named_row(names.into_iter().zip(merged)))
        }
        (RowShape::Fixed { items: ia }, RowShape::Fixed { items: ib }) => {
            let merged = pairwise(ia.clone(), ib.clone(), sub)?;
            Ok(Type::Row {
                shape: RowShape::Fixed { items: merged },
            })
        }
        (RowShape::Unknown { element: ea }, RowShape::Unknown { element: eb }) => {
            Ok(Type::unknown_row(unify(ea, eb, sub)?))
        }
        (RowShape::Unknown { element }, RowShape::Fixed { items })
        | (RowShape::Fixed { items }, RowShape::Unknown { element }) => {
            let mut merged = (**element).clone();
            for item in items {
                merged = unify(&merged, item, sub)?;
            }
            Ok(Type::unknown_row(merged))
        }
        _ => Err(UnifyError {
            left: Type::Row { shape: a.clone() },
            right: Type::Row { shape: b.clone() },
        }),
    }
}

fn shape_items(shape: &RowShape, named_len: usize) -> Vec<Type> {
    match shape {
        RowShape::Named { columns } => columns.values().cloned().collect(),
        RowShape::Fixed { items } => items.clone(),
        RowShape::Unknown { element } => vec![(**element).clone(); named_len],
        RowShape::Empty => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_variables_both_ways() {
        let mut gen = TypeVarGen::new();
        let mut sub = Substitution::new();
        let v = Type::var(gen.fresh());
        unify(&v, &Type::integer(), &mut sub).unwrap();
        assert_eq!(sub.apply(&v), Type::integer());
    }

    #[test]
    fn nominals_compare_case_insensitively() {
        let mut sub = Substitution::new();
        let merged = unify(&Type::nominal("text"), &Type::text(), &mut sub).unwrap();
        assert_eq!(merged, Type::nominal("text"));
        assert!(unify(&Type::text(), &Type::blob(), &mut sub).is_err());
    }

    #[test]
    fn optional_is_contagious() {
        let mut sub = Substitution::new();
        let merged = unify(&Type::optional(Type::text()), &Type::text(), &mut sub).unwrap();
        assert_eq!(merged, Type::optional(Type::text()));
    }

    #[test]
    fn alias_survives_unification() {
        let mut sub = Substitution::new();
        let uuid = Type::alias(Type::text(), "UUID");
        let merged = unify(&uuid, &Type::text(), &mut sub).unwrap();
        assert_eq!(merged, uuid);
        let merged = unify(&Type::text(), &uuid, &mut sub).unwrap();
        assert_eq!(merged, uuid);
    }

    #[test]
    fn named_rows_keep_left_names() {
        let mut sub = Substitution::new();
        let left = Type::named_row(vec![("id".to_string(), Type::integer())]);
        let right = Type::named_row(vec![("other".to_string(), Type::integer())]);
        let merged = unify(&left, &right, &mut sub).unwrap();
        assert_eq!(merged, left);
    }

    #[test]
    fn numeric_family_widens() {
        let mut sub = Substitution::new();
        let merged = unify(&Type::integer(), &Type::real(), &mut sub).unwrap();
        assert_eq!(merged, Type::real());
    }

    #[test]
    fn unknown_rows_absorb_fixed_items() {
        let mut gen = TypeVarGen::new();
        let mut sub = Substitution::new();
        let list = Type::unknown_row(Type::var(gen.fresh()));
        let items = Type::Row {
            shape: RowShape::Fixed {
                items: vec![Type::integer(), Type::integer()],
            },
        };
        let merged = unify(&list, &items, &mut sub).unwrap();
        assert_eq!(merged, Type::unknown_row(Type::integer()));
    }

    #[test]
    fn error_absorbs_quietly() {
        let mut sub = Substitution::new();
        let merged = unify(&Type::Error, &Type::text(), &mut sub).unwrap();
        assert_eq!(merged, Type::text());
    }
}
