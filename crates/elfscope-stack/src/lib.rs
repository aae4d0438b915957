//! Stack-usage and call-graph analysis from GCC side files.
//!
//! GCC writes one `.su` file per translation unit with `-fstack-usage` and a
//! call-graph dump with `-fdump-ipa-cgraph`. This crate discovers both next
//! to a firmware image, pairs them per translation unit, and computes the
//! worst-case stack and recursion class of every function.

mod call_graph;
mod scan;
mod stack_usage;

pub use call_graph::{Call, CallGraph, GraphNode, RecursionKind};
pub use scan::{StackFiles, find_stack_files, paired_graph, side_file_root};
pub use stack_usage::{StackUsage, StackUsageFile, StackUsageRecord, merge_stack_usage};

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

/// Side-file errors.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to walk side-file directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, StackError>;

/// Everything parsed from the side files under one root directory.
#[derive(Clone, Debug, Default)]
pub struct StackData {
    /// One entry per `.su` file, in path order.
    pub usage: Vec<StackUsageFile>,
    /// One computed graph per `.su` file that had a paired `.cgraph`.
    pub graphs: Vec<CallGraph>,
    /// Number of `.cgraph` files found, paired or not.
    pub cgraph_files: usize,
}

impl StackData {
    #[must_use]
    pub fn has_stack_usage(&self) -> bool {
        !self.usage.is_empty()
    }

    #[must_use]
    pub fn has_call_graph(&self) -> bool {
        !self.graphs.is_empty()
    }
}

/// Discover, parse and correlate all side files under `root`.
///
/// Files are parsed in parallel; results are collected in path order so the
/// outcome does not depend on scheduling. Unreadable side files are logged
/// and skipped; only a failing directory walk is an error.
pub fn load_stack_data(root: &Path) -> Result<StackData> {
    let files = find_stack_files(root)?;
    debug!(
        root = %root.display(),
        su = files.su.len(),
        cgraph = files.cgraph.len(),
        "found side files"
    );

    let units: Vec<(StackUsageFile, Option<CallGraph>)> = files
        .su
        .par_iter()
        .filter_map(|su_path| {
            let mut usage = match StackUsageFile::read(su_path) {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(error = %e, "skipping stack-usage file");
                    return None;
                }
            };
            let graph = match paired_graph(su_path, &files.cgraph) {
                Some(graph_path) => match CallGraph::read(graph_path) {
                    Ok(mut graph) => {
                        graph.compute(&mut usage.usage);
                        Some(graph)
                    }
                    Err(e) => {
                        warn!(error = %e, "skipping call-graph file");
                        None
                    }
                },
                None => {
                    warn!(file = %su_path.display(), "no call-graph file for stack-usage file");
                    None
                }
            };
            Some((usage, graph))
        })
        .collect();

    let mut data = StackData {
        cgraph_files: files.cgraph.len(),
        ..StackData::default()
    };
    for (usage, graph) in units {
        data.usage.push(usage);
        data.graphs.extend(graph);
    }
    Ok(data)
}
