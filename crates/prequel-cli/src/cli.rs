//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "prequel",
    about = "Compile SQLite migrations and queries into typed Rust",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Type-check migrations and queries; exit non-zero on errors.
    Check(CompileArgs),
    /// Compile and emit generated Rust source.
    Generate(GenerateArgs),
}

#[derive(Debug, clap::Args)]
pub struct CompileArgs {
    /// Directory of `NUMBER.sql` migration files.
    #[arg(long, default_value = "migrations")]
    pub migrations: PathBuf,

    /// Directory of query files.
    #[arg(long, default_value = "queries")]
    pub queries: PathBuf,

    /// Optional JSON config file (database-name, language, options).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logical database name recorded in the generated code.
    #[arg(long)]
    pub database_name: Option<String>,

    /// Output format for results and diagnostics.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub compile: CompileArgs,

    /// Where to write the generated source; `-` for stdout.
    #[arg(long, short, default_value = "queries.rs")]
    pub output: PathBuf,

    /// Create the output file's parent directory if missing.
    #[arg(long)]
    pub create_output_directory: bool,

    /// Wrap generated row structs in a `models` module.
    #[arg(long)]
    pub namespace_models: bool,

    /// `use` lines to prepend to the generated file (repeatable).
    #[arg(long = "import")]
    pub imports: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable diagnostics.
    Text,
    /// The full compile result (schema, IR, diagnostics) as JSON.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn generate_accepts_imports() {
        let args = Args::try_parse_from([
            "prequel",
            "generate",
            "--migrations",
            "db/migrations",
            "--import",
            "uuid::Uuid",
            "--import",
            "rusqlite",
        ])
        .unwrap();
        match args.command {
            Command::Generate(generate) => {
                assert_eq!(generate.imports, vec!["uuid::Uuid", "rusqlite"]);
                assert_eq!(
                    generate.compile.migrations,
                    std::path::Path::new("db/migrations")
                );
            }
            _ => panic!("expected generate"),
        }
    }
}
