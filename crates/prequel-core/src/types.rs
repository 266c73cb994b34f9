//! The type algebra used by the inferrer and exposed through the IR.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A type variable minted during one inference session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}", self.0)
    }
}

/// A SQL value or relation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Type {
    /// A SQL type name: TEXT, INTEGER, REAL, BLOB, BOOL, ANY, …
    Nominal { name: String },
    /// Nullable.
    Optional { inner: Box<Type> },
    /// A tuple/relation type.
    Row { shape: RowShape },
    /// A function type; only used inside schemes.
    Fn { params: Vec<Type>, ret: Box<Type> },
    /// An unresolved inference variable.
    Var { id: TypeVar },
    /// A user-declared alias over a storage type, e.g. `TEXT AS UUID`.
    Alias { storage: Box<Type>, alias: String },
    /// Sentinel for failed inference; unifies with anything and keeps
    /// sibling nodes checkable.
    Error,
}

/// The shape of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RowShape {
    /// Ordered column-name → type, e.g. a SELECT output.
    Named { columns: IndexMap<String, Type> },
    /// Positional types, e.g. a VALUES row.
    Fixed { items: Vec<Type> },
    /// Homogeneous rows of unknown length, e.g. the right side of IN.
    Unknown { element: Box<Type> },
    /// No columns, e.g. the output of DML without RETURNING.
    Empty,
}

impl Type {
    pub fn nominal(name: impl Into<String>) -> Type {
        Type::Nominal { name: name.into() }
    }

    pub fn optional(inner: Type) -> Type {
        match inner {
            // Optionality does not stack.
            Type::Optional { .. } => inner,
            other => Type::Optional {
                inner: Box::new(other),
            },
        }
    }

    pub fn var(id: TypeVar) -> Type {
        Type::Var { id }
    }

    pub fn alias(storage: Type, alias: impl Into<String>) -> Type {
        Type::Alias {
            storage: Box::new(storage),
            alias: alias.into(),
        }
    }

    pub fn row(shape: RowShape) -> Type {
        Type::Row { shape }
    }

    pub fn named_row<I>(columns: I) -> Type
    where
        I: IntoIterator<Item = (String, Type)>,
    {
        Type::Row {
            shape: RowShape::Named {
                columns: columns.into_iter().collect(),
            },
        }
    }

    pub fn unknown_row(element: Type) -> Type {
        Type::Row {
            shape: RowShape::Unknown {
                element: Box::new(element),
            },
        }
    }

    pub fn empty_row() -> Type {
        Type::Row {
            shape: RowShape::Empty,
        }
    }

    pub fn text() -> Type {
        Type::nominal("TEXT")
    }

    pub fn integer() -> Type {
        Type::nominal("INTEGER")
    }

    pub fn real() -> Type {
        Type::nominal("REAL")
    }

    pub fn blob() -> Type {
        Type::nominal("BLOB")
    }

    pub fn bool() -> Type {
        Type::nominal("BOOL")
    }

    pub fn any() -> Type {
        Type::nominal("ANY")
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_row(&self) -> bool {
        matches!(self, Type::Row { .. })
    }

    /// Strips `Optional`, exposing the underlying type.
    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional { inner } => inner.unwrap_optional(),
            other => other,
        }
    }

    /// Strips aliases and optionality down to the storage type.
    pub fn storage(&self) -> &Type {
        match self {
            Type::Optional { inner } => inner.storage(),
            Type::Alias { storage, .. } => storage.storage(),
            other => other,
        }
    }

    /// The nominal name after stripping optionality, if any.
    pub fn nominal_name(&self) -> Option<&str> {
        match self.unwrap_optional() {
            Type::Nominal { name } => Some(name),
            Type::Alias { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// Whether this type resolves to a row (list parameters).
    pub fn is_row_like(&self) -> bool {
        matches!(self.unwrap_optional(), Type::Row { .. })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Nominal { name } => f.write_str(name),
            Type::Optional { inner } => write!(f, "{inner}?"),
            Type::Row { shape } => write!(f, "{shape}"),
            Type::Fn { params, ret } => {
                f.write_str("(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Var { id } => write!(f, "{id}"),
            Type::Alias { storage, alias } => write!(f, "{alias} (= {storage})"),
            Type::Error => f.write_str("<error>"),
        }
    }
}

impl fmt::Display for RowShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowShape::Named { columns } => {
                f.write_str("(")?;
                for (i, (name, ty)) in columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                f.write_str(")")
            }
            RowShape::Fixed { items } => {
                f.write_str("(")?;
                for (i, ty) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
            RowShape::Unknown { element } => write!(f, "[{element}]"),
            RowShape::Empty => f.write_str("()"),
        }
    }
}

/// A universally quantified type, instantiated with fresh variables at
/// each use site.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeScheme {
    pub vars: Vec<TypeVar>,
    pub ty: Type,
    /// Variadic schemes replicate their last parameter to match the
    /// call's arity.
    pub variadic: bool,
}

impl TypeScheme {
    pub fn mono(ty: Type) -> Self {
        Self {
            vars: Vec::new(),
            ty,
            variadic: false,
        }
    }

    pub fn poly(vars: Vec<TypeVar>, ty: Type) -> Self {
        Self {
            vars,
            ty,
            variadic: false,
        }
    }

    pub fn variadic(vars: Vec<TypeVar>, ty: Type) -> Self {
        Self {
            vars,
            ty,
            variadic: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_does_not_stack() {
        let ty = Type::optional(Type::optional(Type::text()));
        assert_eq!(ty, Type::optional(Type::text()));
        assert_eq!(ty.to_string(), "TEXT?");
    }

    #[test]
    fn storage_sees_through_alias_and_optional() {
        let ty = Type::optional(Type::alias(Type::text(), "UUID"));
        assert_eq!(ty.storage(), &Type::text());
        assert_eq!(ty.nominal_name(), Some("UUID"));
    }

    #[test]
    fn display_of_rows() {
        let row = Type::named_row(vec![
            ("id".to_string(), Type::integer()),
            ("name".to_string(), Type::optional(Type::text())),
        ]);
        assert_eq!(row.to_string(), "(id: INTEGER, name: TEXT?)");
        assert_eq!(Type::unknown_row(Type::integer()).to_string(), "[INTEGER]");
    }
}
