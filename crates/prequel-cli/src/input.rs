//! File discovery for migrations and queries.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use prequel_core::compiler::{MigrationFile, QueryFile};

/// Reads `NUMBER.sql` files from the migrations directory. Ordering
/// is left to the core, which sorts numerically; non-SQL files are
/// skipped, badly named SQL files are an error.
pub fn read_migrations(dir: &Path) -> Result<Vec<MigrationFile>> {
    let mut migrations = Vec::new();
    for entry in list_sql_files(dir)? {
        let name = entry.clone();
        let sql = fs::read_to_string(dir.join(&entry))
            .with_context(|| format!("failed to read migration {entry}"))?;
        let migration = MigrationFile::new(name, sql)
            .with_context(|| format!("invalid migration file name `{entry}`"))?;
        migrations.push(migration);
    }
    Ok(migrations)
}

/// Reads every query file, sorted by name so compilation output is
/// stable across runs.
pub fn read_queries(dir: &Path) -> Result<Vec<QueryFile>> {
    let mut queries = Vec::new();
    for entry in list_sql_files(dir)? {
        let sql = fs::read_to_string(dir.join(&entry))
            .with_context(|| format!("failed to read query file {entry}"))?;
        queries.push(QueryFile { name: entry, sql });
    }
    Ok(queries)
}

fn list_sql_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_lowercase().ends_with(".sql") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directories_yield_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(read_migrations(&missing).unwrap().is_empty());
        assert!(read_queries(&missing).unwrap().is_empty());
    }

    #[test]
    fn non_sql_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.sql"), "CREATE TABLE t(x INT);").unwrap();
        fs::write(dir.path().join("README.md"), "docs").unwrap();
        let migrations = read_migrations(dir.path()).unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].number, 1);
    }

    #[test]
    fn badly_named_migrations_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("init.sql"), "CREATE TABLE t(x INT);").unwrap();
        assert!(read_migrations(dir.path()).is_err());
    }

    #[test]
    fn queries_come_back_name_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("a.sql"), "SELECT 2;").unwrap();
        let queries = read_queries(dir.path()).unwrap();
        let names: Vec<&str> = queries.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["a.sql", "b.sql"]);
    }
}
