//! prequel - compile SQLite migrations and queries into typed Rust.

mod cli;
mod input;
mod output;

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use is_terminal::IsTerminal;
use prequel_core::compiler::{compile, CompileRequest, CompileResult, Config};

use cli::{Args, Command, CompileArgs, GenerateArgs, OutputFormat};

fn main() -> ExitCode {
    match run() {
        Ok(has_errors) => {
            if has_errors {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("prequel: error: {e:#}");
            ExitCode::from(66)
        }
    }
}

fn run() -> Result<bool> {
    let args = Args::parse();
    match args.command {
        Command::Check(compile_args) => {
            let (result, sources) = compile_project(&compile_args, Config::default())?;
            report(&compile_args, &result, &sources)?;
            Ok(result.has_errors())
        }
        Command::Generate(generate_args) => generate(generate_args),
    }
}

fn generate(args: GenerateArgs) -> Result<bool> {
    let config = build_config(&args)?;
    let (result, sources) = compile_project(&args.compile, config.clone())?;
    report(&args.compile, &result, &sources)?;
    if result.has_errors() {
        // Never emit code over broken input.
        return Ok(true);
    }
    let code = prequel_codegen::generate(&result, &config)?;
    if args.output.as_os_str() == "-" {
        io::stdout().write_all(code.as_bytes())?;
    } else {
        if args.create_output_directory {
            if let Some(parent) = args.output.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        fs::write(&args.output, code)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        eprintln!("prequel: wrote {}", args.output.display());
    }
    Ok(false)
}

fn build_config(args: &GenerateArgs) -> Result<Config> {
    let mut config = load_config(&args.compile)?;
    if args.namespace_models {
        config.options.namespace_generated_models = true;
    }
    if args.create_output_directory {
        config.options.create_output_directory = true;
    }
    config.options.imports.extend(args.imports.iter().cloned());
    Ok(config)
}

fn load_config(args: &CompileArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(database_name) = &args.database_name {
        config.database_name = database_name.clone();
    }
    Ok(config)
}

/// Reads both directories and runs one compilation session.
fn compile_project(
    args: &CompileArgs,
    config: Config,
) -> Result<(CompileResult, HashMap<String, String>)> {
    let migrations = input::read_migrations(&args.migrations)?;
    let queries = input::read_queries(&args.queries)?;
    let mut sources = HashMap::new();
    for migration in &migrations {
        sources.insert(migration.name.clone(), migration.sql.clone());
    }
    for query in &queries {
        sources.insert(query.name.clone(), query.sql.clone());
    }
    let request = CompileRequest {
        migrations,
        queries,
        config,
    };
    Ok((compile(&request), sources))
}

fn report(
    args: &CompileArgs,
    result: &CompileResult,
    sources: &HashMap<String, String>,
) -> Result<()> {
    match args.format {
        OutputFormat::Json => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, result)?;
            writeln!(stdout)?;
        }
        OutputFormat::Text => {
            let mut stderr = io::stderr().lock();
            let color = io::stderr().is_terminal();
            output::render_diagnostics(&mut stderr, sources, result, color)?;
            writeln!(stderr, "prequel: {}", output::summary(result))?;
        }
    }
    Ok(())
}
