//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "elfscope")]
#[command(about = "ELF inspector for embedded firmware - memory map, symbols, stack usage")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(flatten)]
    pub side_files: SideFileArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where `.su`/`.cgraph` files are looked up.
#[derive(Args, Clone, Debug, Default)]
pub struct SideFileArgs {
    /// Do not scan for stack-usage and call-graph files
    #[arg(long, global = true)]
    pub no_side_files: bool,

    /// Directory to scan instead of the one derived from the ELF path
    #[arg(long = "side-files", global = true, value_name = "DIR", conflicts_with = "no_side_files")]
    pub root: Option<PathBuf>,

    /// Fail when the side-file directory cannot be read
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the file header, toolchain and detected platform
    Info {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,
    },
    /// List section headers
    Sections {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,
    },
    /// List segments with the sections they contain
    Segments {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,
    },
    /// List symbols with stack figures
    Symbols {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,

        /// Only show functions
        #[arg(short, long)]
        functions: bool,

        /// Sort order
        #[arg(long, value_enum, default_value = "address")]
        sort: SymbolSort,

        /// Show at most N symbols
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,
    },
    /// Show ARM EABI build attributes
    Attributes {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,
    },
    /// Show platform configuration detected from absolute symbols
    Heuristics {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,
    },
    /// Run a read-only SQL query over the symbols, callers, sections and segments tables
    Query {
        /// Input ELF file
        #[arg(value_name = "ELF")]
        input: PathBuf,

        /// Query text, e.g. "SELECT name, stack FROM symbols ORDER BY stack DESC LIMIT 10"
        #[arg(value_name = "SQL")]
        sql: String,

        /// Value for the next `?` placeholder (integers and 0x-hex are bound as numbers)
        #[arg(short, long = "param", value_name = "VALUE")]
        params: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

impl Commands {
    /// The ELF file every subcommand operates on.
    pub const fn input(&self) -> &PathBuf {
        match self {
            Self::Info { input }
            | Self::Sections { input }
            | Self::Segments { input }
            | Self::Symbols { input, .. }
            | Self::Attributes { input }
            | Self::Heuristics { input }
            | Self::Query { input, .. } => input,
        }
    }
}

/// Symbol listing order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SymbolSort {
    #[default]
    Address,
    Name,
    Size,
    /// Worst-case stack, largest first
    Stack,
}

/// Query output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Markdown table
    #[default]
    Table,
    /// Tab-separated values with a header line
    Tsv,
}
