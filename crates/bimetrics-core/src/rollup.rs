//! Hierarchical rollup for tree-shaped reports
//!
//! Parents never keep their own sum values: every sum field of a node with
//! children is the sum of its rolled-up children, and ratio/difference
//! fields are recomputed from those sums. Children are processed before
//! their parent and every node is visited once.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::derived::derive_row;
use crate::error::{CoreError, CoreResult};
use crate::reducer::reduce_with_specs;
use crate::types::{FieldKind, FieldSpec, Row, TreeInput, TreeRow, ZeroDenominatorPolicy};

/// Rolled-up roots plus the overall total row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupReport {
    pub roots: Vec<TreeRow>,
    pub total: Row,
}

/// Recompute a tree bottom-up.
///
/// Walks with an explicit stack of ancestors, so depth is bounded by memory
/// rather than by the thread's stack.
pub fn rollup(tree: TreeRow, specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> TreeRow {
    let mut current = PendingNode::new(tree);
    let mut ancestors: Vec<PendingNode> = Vec::new();

    loop {
        if let Some(child) = current.remaining.next() {
            ancestors.push(std::mem::replace(&mut current, PendingNode::new(child)));
            continue;
        }

        let rolled = current.finish(specs, policy);
        match ancestors.pop() {
            Some(mut parent) => {
                parent.rolled.push(rolled);
                current = parent;
            }
            None => return rolled,
        }
    }
}

/// A node whose children are still being rolled up
struct PendingNode {
    row: Row,
    remaining: std::vec::IntoIter<TreeRow>,
    rolled: Vec<TreeRow>,
}

impl PendingNode {
    fn new(tree: TreeRow) -> Self {
        Self {
            row: tree.row,
            rolled: Vec::with_capacity(tree.children.len()),
            remaining: tree.children.into_iter(),
        }
    }

    fn finish(self, specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> TreeRow {
        if self.rolled.is_empty() {
            return TreeRow::leaf(derive_row(&self.row, specs, policy));
        }

        let mut parent = self.row;
        for spec in specs.iter().filter(|s| s.kind == FieldKind::Sum) {
            let name = spec.name.as_str();
            let sum = self.rolled.iter().fold(0.0, |acc, child| acc + child.row.number(name));
            parent.set(name, sum);
        }
        TreeRow::with_children(derive_row(&parent, specs, policy), self.rolled)
    }
}

/// Roll up every root and compute the overall total from the rolled-up roots
pub fn rollup_forest(roots: Vec<TreeRow>, specs: &[FieldSpec], policy: ZeroDenominatorPolicy) -> RollupReport {
    let roots: Vec<TreeRow> = roots
        .into_iter()
        .map(|root| rollup(root, specs, policy))
        .collect();
    let root_rows: Vec<Row> = roots.iter().map(|r| r.row.clone()).collect();
    let total = reduce_with_specs(&root_rows, specs, policy);
    RollupReport { roots, total }
}

/// Roll up the subtree under `root` of an id-addressed node list.
///
/// Fails with [`CoreError::Structural`] when a node is reached twice (a
/// cycle or a child shared by two parents), a child id is unknown, or two
/// nodes share an id.
pub fn rollup_input(
    input: &TreeInput,
    root: &str,
    specs: &[FieldSpec],
    policy: ZeroDenominatorPolicy,
) -> CoreResult<TreeRow> {
    let index = index_nodes(input)?;
    let mut visited = HashSet::new();
    let tree = assemble(input, &index, root, &mut visited)?;
    Ok(rollup(tree, specs, policy))
}

/// Roll up every root of an id-addressed node list.
///
/// Nodes that are unreachable from any root can only be part of a cycle and
/// are reported as a structural error.
pub fn rollup_input_forest(
    input: &TreeInput,
    specs: &[FieldSpec],
    policy: ZeroDenominatorPolicy,
) -> CoreResult<RollupReport> {
    let index = index_nodes(input)?;
    let mut visited = HashSet::new();
    let mut trees = Vec::new();
    for root in input.roots() {
        trees.push(assemble(input, &index, root, &mut visited)?);
    }

    if let Some(stranded) = input.nodes.iter().enumerate().find(|(i, _)| !visited.contains(i)) {
        return Err(CoreError::Structural {
            node: stranded.1.id.clone(),
            reason: "node is not reachable from any root (cycle)".to_string(),
        });
    }

    log::debug!(
        target: "bimetrics::rollup",
        "Rolling up {} roots over {} nodes",
        trees.len(),
        input.nodes.len()
    );
    Ok(rollup_forest(trees, specs, policy))
}

/// Group flat leaf rows into a tree by successive segment fields.
///
/// Groups appear in first-seen order. Each group node carries the segment
/// values that identify it; the innermost groups own the original rows as
/// leaves.
pub fn group_hierarchy<S: AsRef<str>>(rows: &[Row], levels: &[S]) -> Vec<TreeRow> {
    group_level(rows, levels, 0, &Row::new())
}

fn group_level<S: AsRef<str>>(rows: &[Row], levels: &[S], depth: usize, prefix: &Row) -> Vec<TreeRow> {
    let Some(level) = levels.get(depth).map(|l| l.as_ref()) else {
        return rows.iter().cloned().map(TreeRow::leaf).collect();
    };

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Row>> = HashMap::new();
    for row in rows {
        let key = row.get(level).map(|v| v.label()).unwrap_or_default();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row.clone());
    }

    order
        .into_iter()
        .map(|key| {
            let members = groups.remove(&key).unwrap_or_default();
            let node_row = prefix.clone().with(level, key);
            let children = group_level(&members, levels, depth + 1, &node_row);
            TreeRow::with_children(node_row, children)
        })
        .collect()
}

fn index_nodes(input: &TreeInput) -> CoreResult<HashMap<&str, usize>> {
    let mut index = HashMap::with_capacity(input.nodes.len());
    for (i, node) in input.nodes.iter().enumerate() {
        if index.insert(node.id.as_str(), i).is_some() {
            return Err(CoreError::Structural {
                node: node.id.clone(),
                reason: "duplicate node id".to_string(),
            });
        }
    }
    Ok(index)
}

fn assemble(
    input: &TreeInput,
    index: &HashMap<&str, usize>,
    root: &str,
    visited: &mut HashSet<usize>,
) -> CoreResult<TreeRow> {
    let mut current = Frame::new(input, claim(index, root, visited)?);
    let mut ancestors: Vec<Frame<'_>> = Vec::new();

    loop {
        if let Some(child) = current.pending.next() {
            if ancestors.len() + 2 > input.max_depth {
                return Err(CoreError::Structural {
                    node: child.clone(),
                    reason: format!("tree is deeper than {} levels", input.max_depth),
                });
            }
            let position = claim(index, child, visited)?;
            ancestors.push(std::mem::replace(&mut current, Frame::new(input, position)));
            continue;
        }

        let tree = TreeRow::with_children(input.nodes[current.position].row.clone(), current.children);
        match ancestors.pop() {
            Some(mut parent) => {
                parent.children.push(tree);
                current = parent;
            }
            None => return Ok(tree),
        }
    }
}

/// A node being assembled and the child ids not yet visited
struct Frame<'a> {
    position: usize,
    pending: std::slice::Iter<'a, String>,
    children: Vec<TreeRow>,
}

impl<'a> Frame<'a> {
    fn new(input: &'a TreeInput, position: usize) -> Self {
        let node = &input.nodes[position];
        Self {
            position,
            pending: node.children.iter(),
            children: Vec::with_capacity(node.children.len()),
        }
    }
}

/// Resolve `id` and mark it visited; a second visit is a cycle or shared child
fn claim(index: &HashMap<&str, usize>, id: &str, visited: &mut HashSet<usize>) -> CoreResult<usize> {
    let position = *index.get(id).ok_or_else(|| CoreError::Structural {
        node: id.to_string(),
        reason: "unknown node id".to_string(),
    })?;
    if !visited.insert(position) {
        return Err(CoreError::Structural {
            node: id.to_string(),
            reason: "node reached more than once (cycle or shared child)".to_string(),
        });
    }
    Ok(position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TreeNodeInput, Value, DEFAULT_MAX_TREE_DEPTH};
    use bimetrics_utils::as_percent_default;

    fn specs() -> Vec<FieldSpec> {
        vec![
            FieldSpec::passthrough("name"),
            FieldSpec::sum("revenue"),
            FieldSpec::sum("profit"),
            FieldSpec::ratio("profitPercent", "profit", "revenue"),
        ]
    }

    fn leaf(name: &str, revenue: f64, profit: f64) -> TreeRow {
        TreeRow::leaf(Row::new().with("name", name).with("revenue", revenue).with("profit", profit))
    }

    fn node(id: &str, revenue: f64, children: &[&str]) -> TreeNodeInput {
        TreeNodeInput {
            id: id.to_string(),
            row: Row::new().with("name", id).with("revenue", revenue).with("profit", revenue / 10.0),
            children: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_two_level_rollup() {
        let parent = TreeRow::with_children(
            Row::new().with("name", "Ann"),
            vec![leaf("q1", 100.0, 10.0), leaf("q2", 200.0, 50.0)],
        );
        let rolled = rollup(parent, &specs(), ZeroDenominatorPolicy::Zero);

        assert_eq!(rolled.row.number("revenue"), 300.0);
        assert_eq!(rolled.row.number("profit"), 60.0);
        assert_eq!(rolled.row.number("profitPercent"), 20.0);
        assert_eq!(as_percent_default(rolled.row.number("profitPercent")), "20.00%");
        assert_eq!(rolled.children[0].row.number("profitPercent"), 10.0);
        assert_eq!(rolled.children[1].row.number("profitPercent"), 25.0);
    }

    #[test]
    fn test_stale_parent_sums_are_replaced() {
        let parent = TreeRow::with_children(
            Row::new().with("name", "Ann").with("revenue", 999.0).with("profit", 1.0),
            vec![leaf("q1", 40.0, 4.0)],
        );
        let rolled = rollup(parent, &specs(), ZeroDenominatorPolicy::Zero);
        assert_eq!(rolled.row.number("revenue"), 40.0);
        assert_eq!(rolled.row.number("profit"), 4.0);
        assert_eq!(rolled.row.get("name"), Some(&Value::from("Ann")));
    }

    #[test]
    fn test_leaf_passes_through() {
        let rolled = rollup(leaf("solo", 0.0, 5.0), &specs(), ZeroDenominatorPolicy::NotApplicable);
        assert_eq!(rolled.row.number("profit"), 5.0);
        assert_eq!(rolled.row.get("profitPercent"), Some(&Value::Null));
    }

    #[test]
    fn test_three_levels_and_total() {
        let ann = TreeRow::with_children(
            Row::new().with("name", "Ann"),
            vec![TreeRow::with_children(
                Row::new().with("name", "Acme"),
                vec![leaf("q1", 100.0, 10.0), leaf("q2", 100.0, 30.0)],
            )],
        );
        let bob = TreeRow::with_children(Row::new().with("name", "Bob"), vec![leaf("q3", 200.0, 20.0)]);

        let report = rollup_forest(vec![ann, bob], &specs(), ZeroDenominatorPolicy::Zero);
        assert_eq!(report.roots[0].row.number("revenue"), 200.0);
        assert_eq!(report.roots[0].children[0].row.number("profitPercent"), 20.0);
        assert_eq!(report.total.number("revenue"), 400.0);
        assert_eq!(report.total.number("profit"), 60.0);
        assert_eq!(report.total.number("profitPercent"), 15.0);
    }

    #[test]
    fn test_rollup_input() {
        let input = TreeInput::new(vec![
            node("ann", 0.0, &["q1", "q2"]),
            node("q1", 100.0, &[]),
            node("q2", 300.0, &[]),
        ]);
        let tree = rollup_input(&input, "ann", &specs(), ZeroDenominatorPolicy::Zero).unwrap();
        assert_eq!(tree.row.number("revenue"), 400.0);
        assert_eq!(tree.row.number("profit"), 40.0);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn test_cycle_is_structural_error() {
        let input = TreeInput::new(vec![
            node("root", 0.0, &["a"]),
            node("a", 0.0, &["b"]),
            node("b", 0.0, &["a"]),
        ]);
        let err = rollup_input(&input, "root", &specs(), ZeroDenominatorPolicy::Zero).unwrap_err();
        assert!(err.is_structural());
        match err {
            CoreError::Structural { node, .. } => assert_eq!(node, "a"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_shared_child_and_unknown_child() {
        let shared = TreeInput::new(vec![
            node("p1", 0.0, &["c"]),
            node("p2", 0.0, &["c"]),
            node("c", 10.0, &[]),
        ]);
        assert!(rollup_input_forest(&shared, &specs(), ZeroDenominatorPolicy::Zero)
            .unwrap_err()
            .is_structural());

        let unknown = TreeInput::new(vec![node("p", 0.0, &["ghost"])]);
        assert!(rollup_input(&unknown, "p", &specs(), ZeroDenominatorPolicy::Zero).is_err());

        let duplicate = TreeInput::new(vec![node("p", 0.0, &[]), node("p", 0.0, &[])]);
        assert!(rollup_input_forest(&duplicate, &specs(), ZeroDenominatorPolicy::Zero).is_err());
    }

    #[test]
    fn test_detached_cycle_detected() {
        let input = TreeInput::new(vec![
            node("root", 5.0, &[]),
            node("x", 0.0, &["y"]),
            node("y", 0.0, &["x"]),
        ]);
        let err = rollup_input_forest(&input, &specs(), ZeroDenominatorPolicy::Zero).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_input_forest_total() {
        let input = TreeInput::new(vec![
            node("ann", 0.0, &["q1"]),
            node("q1", 100.0, &[]),
            node("bob", 50.0, &[]),
        ]);
        let report = rollup_input_forest(&input, &specs(), ZeroDenominatorPolicy::Zero).unwrap();
        assert_eq!(report.roots.len(), 2);
        assert_eq!(report.total.number("revenue"), 150.0);
    }

    fn chain(len: usize) -> TreeInput {
        let nodes = (0..len)
            .map(|i| {
                let id = format!("n{}", i);
                let next = format!("n{}", i + 1);
                if i + 1 == len {
                    node(&id, 7.0, &[])
                } else {
                    node(&id, 0.0, &[next.as_str()])
                }
            })
            .collect();
        TreeInput::new(nodes)
    }

    #[test]
    fn test_deep_chain_beyond_limit_is_structural_error() {
        let input = chain(15_000);
        let err = rollup_input_forest(&input, &specs(), ZeroDenominatorPolicy::Zero).unwrap_err();
        assert!(err.is_structural());
        match err {
            CoreError::Structural { node, reason } => {
                assert_eq!(node, format!("n{}", DEFAULT_MAX_TREE_DEPTH));
                assert!(reason.contains("deeper than"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_deep_chain_within_raised_limit() {
        let input = chain(2_000).with_max_depth(2_000);
        let report = rollup_input_forest(&input, &specs(), ZeroDenominatorPolicy::Zero).unwrap();
        assert_eq!(report.roots.len(), 1);
        assert_eq!(report.roots[0].row.number("revenue"), 7.0);
        assert_eq!(report.roots[0].node_count(), 2_000);
        assert_eq!(report.total.number("revenue"), 7.0);

        let one_short = chain(2_000).with_max_depth(1_999);
        assert!(rollup_input_forest(&one_short, &specs(), ZeroDenominatorPolicy::Zero).is_err());
    }

    #[test]
    fn test_group_hierarchy() {
        let rows = vec![
            Row::new().with("Salesperson", "Ann").with("Customer", "Acme").with("revenue", 10.0),
            Row::new().with("Salesperson", "Bob").with("Customer", "Initech").with("revenue", 5.0),
            Row::new().with("Salesperson", "Ann").with("Customer", "Globex").with("revenue", 20.0),
            Row::new().with("Salesperson", "Ann").with("Customer", "Acme").with("revenue", 30.0),
        ];
        let forest = group_hierarchy(&rows, &["Salesperson", "Customer"]);

        assert_eq!(forest.len(), 2);
        let ann = &forest[0];
        assert_eq!(ann.row.get("Salesperson"), Some(&Value::from("Ann")));
        assert_eq!(ann.children.len(), 2);
        assert_eq!(ann.children[0].row.get("Customer"), Some(&Value::from("Acme")));
        assert_eq!(ann.children[0].row.get("Salesperson"), Some(&Value::from("Ann")));
        assert_eq!(ann.children[0].children.len(), 2);

        let specs = vec![FieldSpec::sum("revenue")];
        let report = rollup_forest(forest, &specs, ZeroDenominatorPolicy::Zero);
        assert_eq!(report.roots[0].row.number("revenue"), 60.0);
        assert_eq!(report.roots[1].row.number("revenue"), 5.0);
        assert_eq!(report.total.number("revenue"), 65.0);
    }
}
