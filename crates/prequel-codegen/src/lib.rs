//! Rust code generation over the prequel IR.
//!
//! Consumes a [`CompileResult`] and emits one self-contained Rust
//! source file: a record struct per query output row and a query type
//! per `DEFINE QUERY`, carrying the sanitized SQL, the typed parameter
//! list, and the expected cardinality. The writer is hand-rolled; the
//! generated text has no mandatory dependencies, and `rusqlite` row
//! decoding is emitted only when the config imports it.

mod rust;
mod writer;

use prequel_core::compiler::{CompileResult, Config, Language};
use thiserror::Error;

pub use rust::generate_rust;

#[derive(Debug, Error)]
pub enum CodegenError {
    /// The driver must refuse to generate code while error-level
    /// diagnostics exist.
    #[error("compilation produced errors; code generation refused")]
    CompilationFailed,
}

/// Generates host-language source for every named query in the
/// result.
pub fn generate(result: &CompileResult, config: &Config) -> Result<String, CodegenError> {
    if result.has_errors() {
        return Err(CodegenError::CompilationFailed);
    }
    match config.language {
        Language::Rust => Ok(generate_rust(result, config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prequel_core::compiler::{compile, CompileRequest, MigrationFile, QueryFile};

    fn result_for(queries: &str) -> CompileResult {
        compile(&CompileRequest {
            migrations: vec![MigrationFile::new(
                "1.sql",
                "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT);",
            )
            .unwrap()],
            queries: vec![QueryFile {
                name: "queries.sql".to_string(),
                sql: queries.to_string(),
            }],
            config: Config::default(),
        })
    }

    #[test]
    fn refuses_to_generate_on_errors() {
        let result = result_for("SELECT nope FROM users;");
        assert!(result.has_errors());
        assert!(matches!(
            generate(&result, &Config::default()),
            Err(CodegenError::CompilationFailed)
        ));
    }

    #[test]
    fn generates_row_struct_and_query_type() {
        let result = result_for("DEFINE QUERY list AS SELECT * FROM users;");
        let code = generate(&result, &Config::default()).unwrap();
        assert!(code.contains("pub struct ListRow"), "{code}");
        assert!(code.contains("pub id: i64,"), "{code}");
        assert!(code.contains("pub name: Option<String>,"), "{code}");
        assert!(code.contains("pub struct List;"), "{code}");
        assert!(
            code.contains("pub const SQL: &'static str = \"SELECT * FROM users;\";"),
            "{code}"
        );
    }

    #[test]
    fn list_parameters_generate_segmented_sql() {
        let result =
            result_for("DEFINE QUERY byIds AS SELECT * FROM users WHERE id IN :ids;");
        let code = generate(&result, &Config::default()).unwrap();
        assert!(code.contains("pub struct ByIdsParams"), "{code}");
        assert!(code.contains("pub ids: Vec<i64>,"), "{code}");
        assert!(code.contains("pub fn sql(ids_len: usize) -> String"), "{code}");
    }

    #[test]
    fn output_override_names_the_row_struct() {
        let result = result_for("DEFINE QUERY list OUTPUT UserRow AS SELECT * FROM users;");
        let code = generate(&result, &Config::default()).unwrap();
        assert!(code.contains("pub struct UserRow"), "{code}");
    }
}
