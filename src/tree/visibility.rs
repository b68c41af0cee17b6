//! Collapsible off-path subtrees of the spawn view.
//!
//! Path nodes are always visible. Every other node belongs to exactly one
//! off-path subtree, rooted at a non-path child of a path node; depth inside
//! that subtree decides what starts hidden.

use log::debug;

use super::path::DecisionPath;
use super::{DecisionTree, NodeId};

pub const DEFAULT_INITIAL_VISIBLE_DEPTH: usize = 2;

/// Reset the spawn flags for `path`: nodes deeper than `initial_visible_depth`
/// inside their off-path subtree start hidden and their parents collapsed.
pub fn prepare(tree: &mut DecisionTree, path: &DecisionPath, initial_visible_depth: usize) {
    tree.reset_view_flags();

    let path_nodes: Vec<NodeId> = path
        .nodes
        .iter()
        .copied()
        .filter(|&id| tree.contains(id))
        .collect();
    for &id in &path_nodes {
        if let Some(node) = tree.node_mut(id) {
            node.is_in_path = true;
            node.is_expanded = true;
        }
    }

    for &anchor in &path_nodes {
        let off_path: Vec<NodeId> = tree
            .children(anchor)
            .iter()
            .copied()
            .filter(|child| !path_nodes.contains(child))
            .collect();
        for root in off_path {
            let mut stack = vec![(root, 0usize)];
            while let Some((id, depth)) = stack.pop() {
                let children = tree.children(id).to_vec();
                if let Some(node) = tree.node_mut(id) {
                    node.is_hidden = depth > initial_visible_depth;
                    let internal = !children.is_empty();
                    node.has_hidden_children = internal && depth >= initial_visible_depth;
                    node.is_expanded = internal && depth < initial_visible_depth;
                }
                stack.extend(children.into_iter().map(|child| (child, depth + 1)));
            }
        }
    }

    debug!(
        "spawn visibility prepared: {} path node(s), {} hidden node(s)",
        path_nodes.len(),
        tree.nodes().filter(|node| node.is_hidden).count()
    );
}

fn is_togglable(tree: &DecisionTree, id: NodeId) -> bool {
    tree.node(id)
        .map_or(false, |node| !node.is_in_path && !node.is_hidden && !node.is_terminal())
}

/// Show every descendant of `id`. Returns `false` when nothing can change
/// (unknown, path, hidden or terminal node).
pub fn expand(tree: &mut DecisionTree, id: NodeId) -> bool {
    if !is_togglable(tree, id) {
        return false;
    }
    for descendant in tree.descendants(id) {
        if let Some(node) = tree.node_mut(descendant) {
            node.is_hidden = false;
            node.is_expanded = !node.children.is_empty();
            node.has_hidden_children = false;
        }
    }
    true
}

/// Hide every descendant of `id` and reset their expansion state.
pub fn collapse(tree: &mut DecisionTree, id: NodeId) -> bool {
    if !is_togglable(tree, id) {
        return false;
    }
    for descendant in tree.descendants(id).into_iter().skip(1) {
        if let Some(node) = tree.node_mut(descendant) {
            node.is_hidden = true;
            node.is_expanded = false;
            node.has_hidden_children = !node.children.is_empty();
        }
    }
    if let Some(node) = tree.node_mut(id) {
        node.is_expanded = false;
        node.has_hidden_children = true;
    }
    true
}

/// Expand a collapsed node, collapse an expanded one.
pub fn toggle(tree: &mut DecisionTree, id: NodeId) -> bool {
    let collapsed = tree
        .node(id)
        .map_or(false, |node| node.has_hidden_children || !node.is_expanded);
    if collapsed {
        expand(tree, id)
    } else {
        collapse(tree, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_hierarchy;
    use crate::tree::fixtures::{instance, sample_records};
    use crate::tree::path::{trace_path, SplitRule};

    fn prepared(depth: usize) -> DecisionTree {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        let path = trace_path(&tree, &instance(&[("x", 1.0), ("y", 1.0)]), SplitRule::default());
        prepare(&mut tree, &path, depth);
        tree
    }

    fn hidden_under(tree: &DecisionTree, id: NodeId) -> Vec<NodeId> {
        tree.descendants(id)
            .into_iter()
            .filter(|&node| tree.node(node).unwrap().is_hidden)
            .collect()
    }

    #[test]
    fn initial_flags_follow_subtree_depth() {
        let tree = prepared(1);

        for id in [0, 1, 3] {
            let node = tree.node(id).unwrap();
            assert!(node.is_in_path && node.is_visible());
        }
        // Subtree at 2: depth 0 = {2}, 1 = {5, 6}, 2 = {9, 10}, 3 = {11, 12}
        assert!(tree.node(2).unwrap().is_expanded);
        assert!(tree.node(6).unwrap().is_visible());
        assert!(tree.node(6).unwrap().has_hidden_children);
        assert!(!tree.node(6).unwrap().is_expanded);
        assert_eq!(hidden_under(&tree, 2), vec![9, 11, 12, 10]);
        // Subtree at 4: leaves 7 and 8 sit at depth 1
        assert!(hidden_under(&tree, 4).is_empty());
        assert!(tree.node(4).unwrap().is_expanded);
    }

    #[test]
    fn default_depth_hides_only_the_deepest_level() {
        let tree = prepared(DEFAULT_INITIAL_VISIBLE_DEPTH);
        assert_eq!(hidden_under(&tree, 2), vec![11, 12]);
        assert!(tree.node(9).unwrap().has_hidden_children);
    }

    #[test]
    fn expand_then_collapse_restores_hidden_set() {
        let mut tree = prepared(1);
        let hidden_before = hidden_under(&tree, 6);
        assert!(!hidden_before.is_empty());

        assert!(expand(&mut tree, 6));
        assert!(hidden_under(&tree, 6).is_empty());
        assert!(tree.node(9).unwrap().is_expanded);
        assert!(expand(&mut tree, 6));
        assert!(hidden_under(&tree, 6).is_empty());

        assert!(collapse(&mut tree, 6));
        assert_eq!(hidden_under(&tree, 6), hidden_before);
        assert!(collapse(&mut tree, 6));
        assert_eq!(hidden_under(&tree, 6), hidden_before);
        assert!(tree.node(6).unwrap().has_hidden_children);
        assert!(tree.node(9).unwrap().has_hidden_children);
    }

    #[test]
    fn toggle_switches_between_states() {
        let mut tree = prepared(1);
        assert!(toggle(&mut tree, 6));
        assert!(tree.node(10).unwrap().is_visible());
        assert!(toggle(&mut tree, 6));
        assert!(tree.node(10).unwrap().is_hidden);
    }

    #[test]
    fn path_leaf_and_hidden_nodes_do_not_toggle() {
        let mut tree = prepared(1);
        assert!(!toggle(&mut tree, 1));
        assert!(!toggle(&mut tree, 5));
        assert!(!expand(&mut tree, 9));
        assert!(!collapse(&mut tree, 42));
        assert!(tree.node(1).unwrap().is_visible());
    }
}
