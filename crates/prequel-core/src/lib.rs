//! Compile-time SQLite analyzer and query IR builder.
//!
//! The pipeline, leaves first: [`lexer`] turns source text into
//! spanned tokens; [`parser`] builds the typed syntax tree; [`schema`]
//! models the database as migrations evolve it; [`infer`] runs
//! unification-based type inference per statement; [`pragma`] handles
//! the typing directives; [`validate`] gates statement kinds per file
//! context; [`rewrite`] strips the non-SQL extensions and segments
//! around list parameters; and [`compiler`] drives a whole session,
//! producing the [`ir`] records that code-generation backends consume.
//!
//! The core is pure CPU: no filesystem access, no process-wide state,
//! no SQL execution.

pub mod ast;
pub mod compiler;
pub mod diagnostics;
pub mod env;
pub mod infer;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pragma;
pub mod rewrite;
pub mod schema;
pub mod span;
pub mod token;
pub mod types;
pub mod validate;

// Re-export the session surface.
pub use compiler::{
    compile, CompileRequest, CompileResult, CompiledFile, Compiler, Config, FileDiagnostics,
    Language, MigrationFile, MigrationNameError, Options, QueryFile,
};
pub use diagnostics::{Diagnostic, Diagnostics, Level, Suggestion};
pub use ir::{Cardinality, Definition, Parameter, SourceSegment, Statement};
pub use schema::{Column, QualifiedName, Schema, Table, TableKind};
pub use span::Span;
pub use types::{RowShape, Type};
