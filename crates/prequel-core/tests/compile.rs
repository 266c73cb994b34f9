//! End-to-end compilation tests: migrations evolve a schema, queries
//! compile against the frozen snapshot, and the IR comes out typed.

use prequel_core::compiler::{compile, CompileRequest, MigrationFile, QueryFile};
use prequel_core::ir::{Cardinality, SourceSegment};
use prequel_core::schema::QualifiedName;
use prequel_core::types::Type;
use prequel_core::CompileResult;

fn compile_sql(migrations: &[&str], queries: &[&str]) -> CompileResult {
    let request = CompileRequest {
        migrations: migrations
            .iter()
            .enumerate()
            .map(|(i, sql)| MigrationFile::new(format!("{}.sql", i + 1), *sql).unwrap())
            .collect(),
        queries: queries
            .iter()
            .enumerate()
            .map(|(i, sql)| QueryFile {
                name: format!("q{}.sql", i + 1),
                sql: sql.to_string(),
            })
            .collect(),
        config: Default::default(),
    };
    compile(&request)
}

fn all_messages(result: &CompileResult) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .flat_map(|f| f.diagnostics.iter().map(|d| d.message.clone()))
        .collect()
}

const USERS: &str = "CREATE TABLE users(id INTEGER PRIMARY KEY, name TEXT);";

#[test]
fn migration_plus_query() {
    let result = compile_sql(&[USERS], &["DEFINE QUERY list AS SELECT * FROM users;"]);
    assert!(!result.has_errors(), "{:?}", all_messages(&result));

    let users = result
        .schema
        .table(&QualifiedName::bare("users"))
        .expect("users table");
    let types: Vec<&Type> = users.columns.values().map(|c| &c.ty).collect();
    assert_eq!(types[0], &Type::integer());
    assert_eq!(types[1], &Type::optional(Type::text()));
    assert_eq!(users.primary_key, vec!["id".to_string()]);

    let stmt = &result.queries[0].statements[0];
    assert_eq!(stmt.definition.as_ref().unwrap().name, "list");
    assert!(stmt.parameters.is_empty());
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![
            ("id".to_string(), Type::integer()),
            ("name".to_string(), Type::optional(Type::text())),
        ])
    );
    assert_eq!(stmt.cardinality, Cardinality::Many);
    assert!(stmt.read_only);
    insta::assert_snapshot!(stmt.sanitized_sql, @"SELECT * FROM users;");
    assert_eq!(stmt.used_tables, vec![QualifiedName::bare("users")]);
}

#[test]
fn named_parameter_occurrences_unify_to_one_index() {
    let result = compile_sql(
        &[USERS],
        &["DEFINE QUERY find AS SELECT id FROM users WHERE name = :q OR name = :q;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(stmt.parameters.len(), 1);
    assert_eq!(stmt.parameters[0].index, 1);
    assert_eq!(stmt.parameters[0].name, "q");
    assert_eq!(stmt.parameters[0].ty, Type::optional(Type::text()));
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![("id".to_string(), Type::integer())])
    );
    assert_eq!(stmt.cardinality, Cardinality::Many);
}

#[test]
fn list_parameter_splits_into_segments() {
    let result = compile_sql(
        &[USERS],
        &["DEFINE QUERY byIds AS SELECT * FROM users WHERE id IN :ids;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(stmt.parameters.len(), 1);
    assert_eq!(stmt.parameters[0].name, "ids");
    assert_eq!(stmt.parameters[0].ty, Type::unknown_row(Type::integer()));
    assert_eq!(stmt.sanitized_sql, "SELECT * FROM users WHERE id IN :ids;");

    assert_eq!(stmt.source_segments.len(), 3);
    assert_eq!(
        stmt.segment_text(&stmt.source_segments[0]),
        Some("SELECT * FROM users WHERE id IN ")
    );
    assert_eq!(
        stmt.source_segments[1],
        SourceSegment::RowParam { index: 1 }
    );
    assert_eq!(stmt.segment_text(&stmt.source_segments[2]), Some(";"));
}

#[test]
fn ddl_in_query_file_is_rejected_at_the_leading_token() {
    let result = compile_sql(&[USERS], &["CREATE TABLE t(x INT);"]);
    let diags: Vec<_> = result
        .diagnostics
        .iter()
        .flat_map(|f| f.diagnostics.iter())
        .filter(|d| d.message == "Statement is not allowed in queries")
        .collect();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].span.start, 0);
    assert_eq!(diags[0].span.end, "CREATE".len());
}

#[test]
fn ambiguous_column_is_diagnosed_and_typed_as_error() {
    let result = compile_sql(
        &[
            "CREATE TABLE a(id INTEGER NOT NULL);",
            "CREATE TABLE b(id INTEGER NOT NULL);",
        ],
        &["SELECT id FROM a, b;"],
    );
    assert!(all_messages(&result)
        .iter()
        .any(|m| m == "'id' is ambiguous in the current context"));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![("id".to_string(), Type::Error)])
    );
}

#[test]
fn type_alias_round_trips_through_schema_and_sanitized_sql() {
    let result = compile_sql(&["CREATE TABLE t(u TEXT AS UUID NOT NULL);"], &[]);
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let table = result.schema.table(&QualifiedName::bare("t")).unwrap();
    assert_eq!(
        table.column("u").unwrap().ty,
        Type::alias(Type::text(), "UUID")
    );
    let stmt = &result.migrations[0].statements[0];
    insta::assert_snapshot!(stmt.sanitized_sql, @"CREATE TABLE t(u TEXT NOT NULL);");
}

#[test]
fn select_one_is_a_single_integer_column() {
    let result = compile_sql(&[], &["SELECT 1;"]);
    let stmt = &result.queries[0].statements[0];
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![("column1".to_string(), Type::integer())])
    );
    assert_eq!(stmt.cardinality, Cardinality::Single);
}

#[rstest::rstest]
#[case::limit_one("SELECT * FROM users LIMIT 1;", Cardinality::Single)]
#[case::bare_aggregate("SELECT count(*) FROM users;", Cardinality::Single)]
#[case::primary_key_equality("SELECT name FROM users WHERE id = :id;", Cardinality::Single)]
#[case::plain_scan("SELECT * FROM users;", Cardinality::Many)]
#[case::non_key_equality("SELECT * FROM users WHERE name = :name;", Cardinality::Many)]
#[case::grouped_aggregate(
    "SELECT count(*) FROM users GROUP BY name;",
    Cardinality::Many
)]
fn cardinality_analyses(#[case] sql: &str, #[case] expected: Cardinality) {
    let result = compile_sql(&[USERS], &[sql]);
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    assert_eq!(result.queries[0].statements[0].cardinality, expected, "{sql}");
}

#[test]
fn unnamed_parameters_are_named_from_context() {
    let result = compile_sql(
        &[USERS],
        &["UPDATE users SET name = ? WHERE id = ?;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    let names: Vec<&str> = stmt.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["name", "id"]);
    assert_eq!(stmt.parameters[0].ty, Type::optional(Type::text()));
    assert_eq!(stmt.parameters[1].ty, Type::integer());
    assert!(!stmt.read_only);
}

#[test]
fn parameter_indices_are_dense_and_stable() {
    let result = compile_sql(
        &[USERS],
        &["SELECT * FROM users WHERE id = :a OR id = ? OR name = :a OR name = ?;"],
    );
    let stmt = &result.queries[0].statements[0];
    let indices: Vec<usize> = stmt.parameters.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    assert_eq!(stmt.parameters[0].name, "a");
    // Context names collide with nothing here, so both `?` keep their
    // column-derived names.
    assert_eq!(stmt.parameters[1].name, "id");
    assert_eq!(stmt.parameters[2].name, "name");
}

#[test]
fn insert_values_check_arity_and_types() {
    let result = compile_sql(
        &[USERS],
        &["INSERT INTO users(id, name) VALUES (:id, :name);"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(stmt.parameters[0].ty, Type::integer());
    assert_eq!(stmt.parameters[1].ty, Type::optional(Type::text()));
    assert_eq!(stmt.result_columns, Type::empty_row());

    let bad = compile_sql(&[USERS], &["INSERT INTO users(id) VALUES (1, 2);"]);
    assert!(all_messages(&bad)
        .iter()
        .any(|m| m.contains("Expected 1 values, found 2")));
}

#[test]
fn returning_clause_shapes_the_output() {
    let result = compile_sql(
        &[USERS],
        &["INSERT INTO users(id, name) VALUES (:id, :name) RETURNING id, name;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![
            ("id".to_string(), Type::integer()),
            ("name".to_string(), Type::optional(Type::text())),
        ])
    );
}

#[test]
fn views_carry_their_inferred_columns() {
    let result = compile_sql(
        &[USERS, "CREATE VIEW names AS SELECT name FROM users;"],
        &["SELECT * FROM names;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![("name".to_string(), Type::optional(Type::text()))])
    );
}

#[test]
fn ctes_shadow_schema_tables() {
    let result = compile_sql(
        &[USERS],
        &["WITH users AS (SELECT 1 AS n) SELECT * FROM users;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![("n".to_string(), Type::integer())])
    );
}

#[test]
fn fts5_columns_and_pseudo_columns() {
    let migration = "CREATE VIRTUAL TABLE docs USING fts5(body TEXT NOT NULL, tag UNINDEXED);";
    let result = compile_sql(
        &[migration],
        &["SELECT * FROM docs WHERE docs MATCH :q ORDER BY rank;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));

    let sanitized = &result.migrations[0].statements[0].sanitized_sql;
    insta::assert_snapshot!(sanitized, @"CREATE VIRTUAL TABLE docs USING fts5(body, tag);");

    let stmt = &result.queries[0].statements[0];
    // `rank` and the table-valued MATCH column stay out of `*`.
    assert_eq!(
        stmt.result_columns,
        Type::named_row(vec![
            ("body".to_string(), Type::text()),
            ("tag".to_string(), Type::optional(Type::text())),
        ])
    );
    assert_eq!(stmt.parameters[0].ty, Type::text());
}

#[test]
fn pragma_directives_shape_schema_types() {
    let result = compile_sql(
        &[
            "PRAGMA type_alias(UserId AS INTEGER);\n\
             PRAGMA hint_bool(is_admin);\n\
             CREATE TABLE users(id UserId PRIMARY KEY, is_admin INTEGER NOT NULL);",
        ],
        &[],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let table = result.schema.table(&QualifiedName::bare("users")).unwrap();
    assert_eq!(
        table.column("id").unwrap().ty,
        Type::alias(Type::integer(), "USERID")
    );
    assert_eq!(
        table.column("is_admin").unwrap().ty,
        Type::alias(Type::integer(), "BOOL")
    );
}

#[test]
fn migrations_apply_in_numeric_not_lexicographic_order() {
    let request = CompileRequest {
        migrations: vec![
            MigrationFile::new("10.sql", "ALTER TABLE t ADD COLUMN y TEXT;").unwrap(),
            MigrationFile::new("2.sql", "CREATE TABLE t(x INTEGER NOT NULL);").unwrap(),
        ],
        queries: Vec::new(),
        config: Default::default(),
    };
    let result = compile(&request);
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let table = result.schema.table(&QualifiedName::bare("t")).unwrap();
    let names: Vec<&str> = table.columns.values().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);
}

#[test]
fn parse_errors_recover_at_the_next_terminator() {
    let result = compile_sql(&[], &["SELECT FROM;\nSELECT 1;"]);
    assert!(result.has_errors());
    let file = &result.queries[0];
    assert_eq!(file.statements.len(), 2);
    assert_eq!(
        file.statements[1].result_columns,
        Type::named_row(vec![("column1".to_string(), Type::integer())])
    );
}

#[test]
fn diagnostics_are_sorted_by_span_start() {
    let result = compile_sql(&[USERS], &["SELECT nope, id FROM users WHERE bad = 1;"]);
    for file in &result.diagnostics {
        let starts: Vec<usize> = file.diagnostics.iter().map(|d| d.span.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }
}

#[test]
fn sanitizing_without_extensions_is_identity_plus_terminator() {
    let sql = "SELECT id, name\nFROM users\nWHERE id > 10;";
    let result = compile_sql(&[USERS], &[sql]);
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let stmt = &result.queries[0].statements[0];
    assert_eq!(stmt.sanitized_sql, sql);
}

#[test]
fn recompiling_sanitized_source_yields_the_same_signature() {
    let result = compile_sql(
        &[USERS],
        &["DEFINE QUERY find AS SELECT id FROM users WHERE name = :q LIMIT 1;"],
    );
    assert!(!result.has_errors(), "{:?}", all_messages(&result));
    let first = result.queries[0].statements[0].clone();

    let again = compile_sql(&[USERS], &[&first.sanitized_sql]);
    assert!(!again.has_errors(), "{:?}", all_messages(&again));
    let second = &again.queries[0].statements[0];
    assert_eq!(first.parameters, second.parameters);
    assert_eq!(first.result_columns, second.result_columns);
    assert_eq!(first.cardinality, second.cardinality);
    assert_eq!(first.read_only, second.read_only);
}

#[test]
fn compilation_is_deterministic() {
    let migrations = &[USERS, "CREATE INDEX users_name ON users(name);"];
    let queries = &[
        "DEFINE QUERY list AS SELECT * FROM users;",
        "SELECT name FROM users WHERE id IN :ids;",
    ];
    let a = serde_json::to_string(&compile_sql(migrations, queries)).unwrap();
    let b = serde_json::to_string(&compile_sql(migrations, queries)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn schema_errors_leave_a_placeholder_but_keep_compiling() {
    let result = compile_sql(&[USERS], &["SELECT missing.x FROM missing, users;"]);
    let messages = all_messages(&result);
    assert!(messages.iter().any(|m| m.contains("`missing` does not exist")));
    // The statement still produced IR.
    assert_eq!(result.queries[0].statements.len(), 1);
}

mod properties {
    use proptest::prelude::*;

    proptest! {
        // The parser is total: arbitrary bytes produce statements and
        // diagnostics, never a panic.
        #[test]
        fn parser_never_panics(input in "\\PC*") {
            let _ = prequel_core::parser::parse(&input);
        }

        #[test]
        fn lexer_spans_cover_valid_ranges(input in "\\PC*") {
            for token in prequel_core::lexer::Lexer::new(&input).tokenize() {
                prop_assert!(token.span.start <= token.span.end);
                prop_assert!(token.span.end <= input.len());
            }
        }
    }
}
