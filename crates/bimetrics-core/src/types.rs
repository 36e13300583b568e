//! Basic types for the metrics engine

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub use bimetrics_config::{
    DisplayFormat, FieldKind, FieldSpec, RatioScale, ReportDefinition, ZeroDenominatorPolicy,
    DEFAULT_MAX_TREE_DEPTH,
};
pub use bimetrics_ingest::{Row, Value};

/// A report row that owns its children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRow {
    pub row: Row,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeRow>,
}

impl TreeRow {
    /// A node without children
    pub fn leaf(row: Row) -> Self {
        Self { row, children: Vec::new() }
    }

    pub fn with_children(row: Row, children: Vec<TreeRow>) -> Self {
        Self { row, children }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeRow::node_count).sum::<usize>()
    }
}

/// One node of an id-addressed tree as received from a hierarchical endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeInput {
    pub id: String,
    pub row: Row,
    #[serde(default)]
    pub children: Vec<String>,
}

/// Flat node list; edges are child-id references and may be malformed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeInput {
    pub nodes: Vec<TreeNodeInput>,
    /// Longest accepted root-to-leaf path, counted in nodes
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_TREE_DEPTH
}

impl Default for TreeInput {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TreeInput {
    pub fn new(nodes: Vec<TreeNodeInput>) -> Self {
        Self {
            nodes,
            max_depth: DEFAULT_MAX_TREE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Ids never referenced as a child, in node order
    pub fn roots(&self) -> Vec<&str> {
        let referenced: HashSet<&str> = self
            .nodes
            .iter()
            .flat_map(|n| n.children.iter().map(String::as_str))
            .collect();
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !referenced.contains(id))
            .collect()
    }
}

/// Per-request parameters threaded through report building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    /// Dataset the rows were queried from
    pub dataset: String,
    /// Compact currency display
    #[serde(default)]
    pub dense: bool,
    /// Sort rows by the report's period field before sequencing
    #[serde(default)]
    pub order_by_period: bool,
    /// Overrides the report's zero-denominator policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_denominator: Option<ZeroDenominatorPolicy>,
}

impl ReportContext {
    pub fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            dense: false,
            order_by_period: false,
            zero_denominator: None,
        }
    }

    pub fn dense(mut self, dense: bool) -> Self {
        self.dense = dense;
        self
    }

    pub fn ordered_by_period(mut self) -> Self {
        self.order_by_period = true;
        self
    }
}
