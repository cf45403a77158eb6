//! Expansion state and the flattened display list.
//!
//! [`flatten`] is a read-only projection of a built tree: toggling a node only
//! changes which already-computed nodes are listed, so the cost of an expand
//! or collapse is bounded by the visible subtree rather than the dataset.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, PivotRowNode};

/// Set of node ids whose children are shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpansionState {
    expanded: BTreeSet<NodeId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expand(&mut self, id: NodeId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: &NodeId) {
        self.expanded.remove(id);
    }

    /// Flips one node and reports whether it is now expanded.
    pub fn toggle(&mut self, id: &NodeId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    /// Expands every node that has children.
    pub fn expand_all(&mut self, roots: &[PivotRowNode]) {
        for root in roots {
            root.walk(&mut |node| {
                if !node.is_leaf() {
                    self.expanded.insert(node.id.clone());
                }
            });
        }
    }

    /// Drops ids that no longer name a node of `roots`, e.g. after a filter
    /// removed their group.
    pub fn retain_existing(&mut self, roots: &[PivotRowNode]) {
        let mut present = BTreeSet::new();
        for root in roots {
            root.walk(&mut |node| {
                present.insert(&node.id);
            });
        }
        self.expanded.retain(|id| present.contains(id));
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.expanded.iter()
    }
}

impl FromIterator<NodeId> for ExpansionState {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            expanded: iter.into_iter().collect(),
        }
    }
}

/// Depth-first pre-order listing, descending into a node's children only
/// when its id is expanded.
pub fn flatten<'a>(roots: &'a [PivotRowNode], expansion: &ExpansionState) -> Vec<&'a PivotRowNode> {
    let mut visible = Vec::new();
    push_visible(roots, expansion, &mut visible);
    visible
}

fn push_visible<'a>(
    nodes: &'a [PivotRowNode],
    expansion: &ExpansionState,
    visible: &mut Vec<&'a PivotRowNode>,
) {
    for node in nodes {
        visible.push(node);
        if let Some(children) = &node.children
            && expansion.is_expanded(&node.id)
        {
            push_visible(children, expansion, visible);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tree::CellMatrix;

    fn node(id: &str, children: Option<Vec<PivotRowNode>>) -> PivotRowNode {
        PivotRowNode {
            id: NodeId::from(id),
            level: id.matches(':').count() / 2,
            label: id.to_string(),
            is_total: false,
            is_expanded: false,
            parent_id: None,
            values: Arc::new(CellMatrix::zeroed(1, 1)),
            children,
        }
    }

    fn tree() -> Vec<PivotRowNode> {
        vec![
            node(
                "root:A:0",
                Some(vec![
                    node("root:A:0:x:1", None),
                    node("root:A:0:y:1", None),
                ]),
            ),
            node("root:B:0", Some(vec![node("root:B:0:x:1", None)])),
        ]
    }

    fn ids(list: &[&PivotRowNode]) -> Vec<String> {
        list.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn collapsed_tree_shows_roots_only() {
        let roots = tree();
        let flat = flatten(&roots, &ExpansionState::new());
        assert_eq!(ids(&flat), vec!["root:A:0", "root:B:0"]);
    }

    #[test]
    fn expanded_node_lists_children_in_place() {
        let roots = tree();
        let mut state = ExpansionState::new();
        assert!(state.toggle(&NodeId::from("root:A:0")));
        let flat = flatten(&roots, &state);
        assert_eq!(
            ids(&flat),
            vec!["root:A:0", "root:A:0:x:1", "root:A:0:y:1", "root:B:0"]
        );
        assert!(!state.toggle(&NodeId::from("root:A:0")));
        assert_eq!(flatten(&roots, &state).len(), 2);
    }

    #[test]
    fn expand_all_and_retain_existing() {
        let roots = tree();
        let mut state = ExpansionState::new();
        state.expand_all(&roots);
        assert_eq!(state.len(), 2);
        assert_eq!(flatten(&roots, &state).len(), 5);

        state.expand(NodeId::from("root:Gone:0"));
        state.retain_existing(&roots);
        assert_eq!(state.len(), 2);
        assert!(!state.is_expanded(&NodeId::from("root:Gone:0")));
    }

    #[test]
    fn flatten_is_idempotent() {
        let roots = tree();
        let state: ExpansionState = [NodeId::from("root:B:0")].into_iter().collect();
        let first = ids(&flatten(&roots, &state));
        let second = ids(&flatten(&roots, &state));
        assert_eq!(first, second);
    }
}
