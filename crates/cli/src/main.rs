//! `mu` binary entry point: parses arguments, initialises logging, dispatches
//! to a command, and maps `MuError`s surfacing through `anyhow` to the exit
//! codes in SPEC_FULL.md §6/§7.

use clap::Parser;
use colored::Colorize;

use mu_cli::{commands, Cli, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // `bootstrap` has no `--json` (it narrates progress, not a payload) and
    // `diff`'s "json" is a `--format` variant rather than a flag; both fall
    // back to the plain-text error path.
    let json_errors = matches!(
        &cli.command,
        Commands::Status { json: true, .. }
            | Commands::Read { json: true, .. }
            | Commands::Context { json: true, .. }
            | Commands::Search { json: true, .. }
            | Commands::Query { json: true, .. }
            | Commands::Impact { json: true, .. }
    ) || matches!(&cli.command, Commands::Diff { format: mu_cli::DiffFormat::Json, .. });

    let result = match cli.command {
        Commands::Bootstrap { path, force, embed } => commands::bootstrap::run(path.as_deref(), force, embed),
        Commands::Status { path, json } => commands::status::run(path.as_deref(), json),
        Commands::Read { node_ref, path, context, json } => {
            commands::read::run(&node_ref, path.as_deref(), context, json)
        }
        Commands::Context { question, path, max_tokens, bundle, json } => {
            commands::context::run(&question, path.as_deref(), max_tokens, bundle, json)
        }
        Commands::Search { query, path, limit, json } => commands::search::run(&query, path.as_deref(), limit, json),
        Commands::Query { muql, path, json, csv } => commands::query::run(&muql, path.as_deref(), json, csv),
        Commands::Impact { node_ref, path, depth, edge_kinds, json } => {
            commands::impact::run(&node_ref, path.as_deref(), depth, edge_kinds, json)
        }
        Commands::Diff { base_ref, target_ref, path, format } => {
            commands::diff::run(&base_ref, &target_ref, path.as_deref(), format)
        }
    };

    if let Err(err) = result {
        let code = commands::exit_code_for(&err);
        if json_errors {
            eprintln!("{}", serde_json::to_string_pretty(&commands::error_json(&err)).unwrap());
        } else {
            eprintln!("{} {}", "error:".red().bold(), err);
        }
        std::process::exit(code);
    }
}
