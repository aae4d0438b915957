//! Command implementations.
//!
//! Every command loads the file through [`load`], then renders part of the
//! model or runs a query against it.

mod info;
mod listing;
mod query;

use std::path::Path;

use elfscope::{DataResult, ElfParser, LoadOptions};

use crate::cli::{Cli, Commands, EXIT_FAILURE, SideFileArgs};
use crate::terminal::{self, Spinner};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    let input = cli.command.input();
    let Some(parser) = load(input, &cli.side_files, cli.silent) else {
        return EXIT_FAILURE;
    };

    match &cli.command {
        Commands::Info { .. } => info::cmd_info(&parser),
        Commands::Attributes { .. } => info::cmd_attributes(&parser),
        Commands::Heuristics { .. } => info::cmd_heuristics(&parser),
        Commands::Sections { .. } => listing::cmd_sections(&parser),
        Commands::Segments { .. } => listing::cmd_segments(&parser),
        Commands::Symbols {
            functions,
            sort,
            limit,
            ..
        } => listing::cmd_symbols(&parser, *functions, *sort, *limit),
        Commands::Query {
            sql,
            params,
            format,
            ..
        } => query::cmd_query(&parser, sql, params, *format),
    }
}

fn load_options(args: &SideFileArgs) -> LoadOptions {
    let mut options = LoadOptions::new()
        .with_side_files(!args.no_side_files)
        .with_strict_side_files(args.strict);
    if let Some(root) = &args.root {
        options = options.with_side_file_root(root);
    }
    options
}

/// Load `input`, reporting failures. `None` means the command cannot run.
fn load(input: &Path, args: &SideFileArgs, quiet: bool) -> Option<ElfParser> {
    let mut parser = ElfParser::new(input).with_options(load_options(args));
    let spinner = Spinner::new(format!("Loading {}", input.display()), quiet);

    match parser.initialize() {
        Ok(DataResult::Ok) => {
            let model = parser.model()?;
            let mut summary = format!(
                "Loaded {} ({} symbols)",
                input.display(),
                model.symbol_count()
            );
            if model.has_call_graph {
                summary.push_str(", stack usage and call graph");
            } else if model.has_stack_usage {
                summary.push_str(", stack usage");
            }
            spinner.finish_with_success(&summary);
            Some(parser)
        }
        Ok(DataResult::Invalid(err)) => {
            spinner.finish_with_failure(&format!("{} is not a valid ELF file: {err}", input.display()));
            None
        }
        Err(err) => {
            spinner.finish_with_failure(&err.to_string());
            None
        }
    }
}

/// Warn when no `.su` data was found.
fn note_missing_stack_data(parser: &ElfParser) {
    if parser.model().is_some_and(|m| !m.has_stack_usage) {
        terminal::warning("no stack-usage files found; build with -fstack-usage for stack figures");
    }
}

fn hex(value: u64) -> String {
    format!("{value:#x}")
}
