//! GCC `-fdump-ipa-cgraph` call graphs.
//!
//! Only the `Optimized Symbol table:` part of the dump is read. Nodes live
//! in a flat arena and reference their callees by index, so cyclic call
//! chains need no shared ownership.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, warn};

use crate::stack_usage::StackUsage;
use crate::{Result, StackError};

const TABLE_START: &str = "Optimized Symbol table:";
const TABLE_END: &str = "Materializing clones";
const TYPE_PREFIX: &str = "  Type: ";
const CALLS_PREFIX: &str = "  Calls: ";

static NODE_PATTERN: OnceLock<Regex> = OnceLock::new();
static CALL_PATTERN: OnceLock<Regex> = OnceLock::new();

/// Recursion class of a function, ordered from harmless to worst.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecursionKind {
    /// No call cycle is reachable.
    #[default]
    NoRecursion,
    /// A direct callee lies on a call cycle.
    ReachesRecursion,
    /// A call cycle is reachable further down the graph.
    GraphLoop,
    /// The function itself lies on a call cycle.
    SelfRecursive,
}

impl RecursionKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoRecursion => "NoRecursion",
            Self::ReachesRecursion => "ReachesRecursion",
            Self::GraphLoop => "GraphLoop",
            Self::SelfRecursive => "SelfRecursive",
        }
    }

    #[must_use]
    pub fn is_recursive(self) -> bool {
        self != Self::NoRecursion
    }
}

impl fmt::Display for RecursionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An outgoing edge as written in the dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub name: String,
    pub number: u32,
    pub inlined: bool,
}

/// One function or variable of the symbol table dump.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphNode {
    /// Readable name, as in the `.su` file.
    pub name: String,
    /// Linker name.
    pub mangled_name: String,
    /// Node number, unique within one dump.
    pub number: u32,
    pub address: String,
    pub node_type: String,
    pub calls: Vec<Call>,
    /// Arena indices of resolved callees, without repeats.
    pub callees: Vec<usize>,
    /// Static frame size from the matching `.su` record.
    pub local_stack: u64,
    /// Worst-case stack including callees.
    pub max_stack: u64,
    /// Calls along the worst-case path.
    pub depth: u32,
    pub recursion: RecursionKind,
}

impl GraphNode {
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.node_type.contains("function")
    }

    fn from_line(line: &str) -> Option<Self> {
        let pattern = NODE_PATTERN.get_or_init(|| {
            Regex::new(r"(\S+)/([0-9]+) (\(.+\)) (\S+)").expect("valid node pattern")
        });
        let caps = pattern.captures(line)?;
        let readable = caps.get(3)?.as_str();
        Some(Self {
            name: readable[1..readable.len() - 1].to_string(),
            mangled_name: caps.get(1)?.as_str().to_string(),
            number: caps.get(2)?.as_str().parse().ok()?,
            address: caps.get(4)?.as_str().to_string(),
            ..Self::default()
        })
    }
}

fn parse_calls(list: &str) -> impl Iterator<Item = Call> + '_ {
    let pattern = CALL_PATTERN.get_or_init(|| {
        Regex::new(r"(.+?)/([0-9]+)( \(inlined\))?( \(.+? per call\))?( \(.+?\))?")
            .expect("valid call pattern")
    });
    pattern.captures_iter(list).filter_map(|caps| {
        Some(Call {
            name: caps.get(1)?.as_str().trim().to_string(),
            number: caps.get(2)?.as_str().parse().ok()?,
            inlined: caps.get(3).is_some(),
        })
    })
}

/// The call graph of one translation unit.
#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    pub path: PathBuf,
    pub nodes: Vec<GraphNode>,
    by_number: FxHashMap<u32, usize>,
    by_mangled: FxHashMap<String, usize>,
}

impl CallGraph {
    /// Parse dump text. `path` is used for diagnostics only.
    #[must_use]
    pub fn parse(path: &Path, text: &str) -> Self {
        let mut graph = Self {
            path: path.to_path_buf(),
            ..Self::default()
        };
        let mut in_table = false;
        let mut current: Option<GraphNode> = None;

        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if !in_table {
                in_table = line == TABLE_START;
                continue;
            }
            if line == TABLE_END {
                break;
            }
            if line.len() > 2 && !line.starts_with("  ") {
                graph.push_node(current.take());
                current = GraphNode::from_line(line);
                if current.is_none() {
                    debug!(file = %path.display(), line, "end of symbol table");
                    break;
                }
            } else if let Some(node) = current.as_mut() {
                if let Some(list) = line.strip_prefix(CALLS_PREFIX) {
                    node.calls.extend(parse_calls(list));
                } else if let Some(node_type) = line.strip_prefix(TYPE_PREFIX) {
                    node.node_type = node_type.to_string();
                }
            }
        }
        graph.push_node(current);
        graph
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| StackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(path, &text))
    }

    fn push_node(&mut self, node: Option<GraphNode>) {
        let Some(node) = node else { return };
        if self.by_number.contains_key(&node.number) {
            error!(
                file = %self.path.display(),
                name = %node.name,
                number = node.number,
                "duplicate call-graph node"
            );
        } else {
            self.by_number.insert(node.number, self.nodes.len());
        }
        self.by_mangled
            .entry(node.mangled_name.clone())
            .or_insert(self.nodes.len());
        self.nodes.push(node);
    }

    #[must_use]
    pub fn node_by_number(&self, number: u32) -> Option<&GraphNode> {
        self.by_number.get(&number).map(|&i| &self.nodes[i])
    }

    #[must_use]
    pub fn node_by_mangled(&self, name: &str) -> Option<&GraphNode> {
        self.by_mangled.get(name).map(|&i| &self.nodes[i])
    }

    /// Correlate with the translation unit's stack usage, then compute
    /// recursion classes and worst-case stacks.
    ///
    /// Matching `.su` records learn the linker names of their functions.
    pub fn compute(&mut self, usage: &mut StackUsage) {
        self.correlate(usage);
        self.resolve_calls();

        let cycles = CycleInfo::find(&self.nodes);
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.recursion = if cycles.on_cycle[i] {
                RecursionKind::SelfRecursive
            } else if node.callees.iter().any(|&c| cycles.on_cycle[c]) {
                RecursionKind::ReachesRecursion
            } else if cycles.reaches_cycle[i] {
                RecursionKind::GraphLoop
            } else {
                RecursionKind::NoRecursion
            };
        }

        let mut walk = StackWalk {
            nodes: &self.nodes,
            component: &cycles.component,
            visiting: vec![false; self.nodes.len()],
            memo: vec![None; self.nodes.len()],
        };
        let results: Vec<(u64, u32)> = (0..self.nodes.len()).map(|i| walk.visit(i)).collect();
        for (node, (max_stack, depth)) in self.nodes.iter_mut().zip(results) {
            node.max_stack = max_stack;
            node.depth = depth;
        }
    }

    fn correlate(&mut self, usage: &mut StackUsage) {
        for node in &mut self.nodes {
            if let Some(record) = usage.get_mut(&node.name) {
                node.local_stack = node.local_stack.max(record.stack);
                record.add_mangled_name(&node.mangled_name);
            }
        }
    }

    fn resolve_calls(&mut self) {
        for i in 0..self.nodes.len() {
            let mut callees = Vec::with_capacity(self.nodes[i].calls.len());
            for call in &self.nodes[i].calls {
                match self.by_number.get(&call.number) {
                    Some(&callee) => {
                        if !callees.contains(&callee) {
                            callees.push(callee);
                        }
                    }
                    None => warn!(
                        file = %self.path.display(),
                        caller = %self.nodes[i].name,
                        callee = %call.name,
                        number = call.number,
                        "unresolved call-graph edge"
                    ),
                }
            }
            self.nodes[i].callees = callees;
        }
    }
}

/// Cycle membership per node, from Tarjan's strongly connected components.
struct CycleInfo {
    on_cycle: Vec<bool>,
    reaches_cycle: Vec<bool>,
    /// Component index; callee components always finish first.
    component: Vec<usize>,
    components: usize,
}

impl CycleInfo {
    fn find(nodes: &[GraphNode]) -> Self {
        let n = nodes.len();
        let mut tarjan = Tarjan {
            nodes,
            index: vec![None; n],
            low: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next: 0,
            info: Self {
                on_cycle: vec![false; n],
                reaches_cycle: vec![false; n],
                component: vec![0; n],
                components: 0,
            },
        };
        for v in 0..n {
            if tarjan.index[v].is_none() {
                tarjan.connect(v);
            }
        }
        tarjan.info
    }
}

struct Tarjan<'a> {
    nodes: &'a [GraphNode],
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    info: CycleInfo,
}

impl Tarjan<'_> {
    fn connect(&mut self, v: usize) {
        let nodes = self.nodes;
        self.index[v] = Some(self.next);
        self.low[v] = self.next;
        self.next += 1;
        self.stack.push(v);
        self.on_stack[v] = true;

        for &w in &nodes[v].callees {
            match self.index[w] {
                None => {
                    self.connect(w);
                    self.low[v] = self.low[v].min(self.low[w]);
                }
                Some(index) if self.on_stack[w] => self.low[v] = self.low[v].min(index),
                Some(_) => {}
            }
        }

        if self.index[v] != Some(self.low[v]) {
            return;
        }
        // Components complete callees first, so every edge leaving this
        // component already has its reachability settled.
        let mut members = Vec::new();
        while let Some(w) = self.stack.pop() {
            self.on_stack[w] = false;
            members.push(w);
            if w == v {
                break;
            }
        }
        let cyclic = members.len() > 1 || nodes[v].callees.contains(&v);
        let reaches = cyclic
            || members
                .iter()
                .any(|&m| nodes[m].callees.iter().any(|&c| self.info.reaches_cycle[c]));
        for m in members {
            self.info.on_cycle[m] = cyclic;
            self.info.reaches_cycle[m] = reaches;
            self.info.component[m] = self.info.components;
        }
        self.info.components += 1;
    }
}

/// Worst-case stack search over the component DAG. A node already on the
/// current path ends the path there. Only nodes of the same component can be
/// on the path when a node is entered from another component, so every
/// node's result is cached on that first entry. Paths are enumerated only
/// inside a cyclic component.
struct StackWalk<'a> {
    nodes: &'a [GraphNode],
    component: &'a [usize],
    visiting: Vec<bool>,
    memo: Vec<Option<(u64, u32)>>,
}

impl StackWalk<'_> {
    /// Worst case from `v` entered from outside its component.
    fn visit(&mut self, v: usize) -> (u64, u32) {
        if let Some(result) = self.memo[v] {
            return result;
        }
        let result = self.search(v);
        self.memo[v] = Some(result);
        result
    }

    fn search(&mut self, v: usize) -> (u64, u32) {
        let nodes = self.nodes;
        self.visiting[v] = true;
        let mut best = (0, 0);
        for &callee in &nodes[v].callees {
            if self.visiting[callee] {
                continue;
            }
            let (stack, depth) = if self.component[callee] == self.component[v] {
                self.search(callee)
            } else {
                self.visit(callee)
            };
            if stack > best.0 {
                best = (stack, depth + 1);
            }
        }
        self.visiting[v] = false;
        (nodes[v].local_stack.saturating_add(best.0), best.1)
    }
}
