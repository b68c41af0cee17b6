//! Buchheim–Jünger–Leipert tidy tree pass.
//!
//! Positions are returned in sibling-separation units (leftmost node at 0)
//! together with the depth relative to the laid-out subtree root. Callers
//! scale both into canvas coordinates.

use std::collections::HashMap;

use log::debug;

use crate::tree::{DecisionTree, HierarchyNode, NodeId};

/// Horizontal distance kept between neighbouring nodes on a level.
const SEPARATION: f32 = 1.0;

#[derive(Debug, Clone)]
struct TidyNode {
    id: NodeId,
    depth: usize,
    parent: Option<usize>,
    children: Vec<usize>,
    number: usize,
    prelim: f32,
    modifier: f32,
    shift: f32,
    change: f32,
    thread: Option<usize>,
    ancestor: usize,
}

impl TidyNode {
    fn new(id: NodeId, depth: usize, parent: Option<usize>, number: usize, slot: usize) -> Self {
        Self {
            id,
            depth,
            parent,
            children: Vec::new(),
            number,
            prelim: 0.0,
            modifier: 0.0,
            shift: 0.0,
            change: 0.0,
            thread: None,
            ancestor: slot,
        }
    }
}

/// Lay out the subtree rooted at `root`, descending only into children for
/// which `include` holds. Returns `node id -> (x, relative depth)`; empty if
/// `root` is unknown or excluded.
pub fn layout_subtree<F>(tree: &DecisionTree, root: NodeId, include: F) -> HashMap<NodeId, (f32, usize)>
where
    F: Fn(&HierarchyNode) -> bool,
{
    let Some(root_node) = tree.node(root) else {
        debug!("tidy layout requested for unknown node {}", root);
        return HashMap::new();
    };
    if !include(root_node) {
        return HashMap::new();
    }

    let mut nodes = vec![TidyNode::new(root, 0, None, 0, 0)];
    let mut stack = vec![0usize];
    while let Some(slot) = stack.pop() {
        let (id, depth) = (nodes[slot].id, nodes[slot].depth);
        let mut kids = Vec::new();
        let included = tree
            .children(id)
            .iter()
            .copied()
            .filter(|&child| tree.node(child).map_or(false, |node| include(node)));
        for (number, child) in included.enumerate() {
            let child_slot = nodes.len();
            nodes.push(TidyNode::new(child, depth + 1, Some(slot), number, child_slot));
            kids.push(child_slot);
        }
        stack.extend(kids.iter().rev().copied());
        nodes[slot].children = kids;
    }

    first_walk(&mut nodes, 0);

    // Second walk: accumulate modifiers top-down
    let mut positions = HashMap::with_capacity(nodes.len());
    let mut min_x = f32::INFINITY;
    let mut stack = vec![(0usize, 0.0f32)];
    while let Some((v, modsum)) = stack.pop() {
        let x = nodes[v].prelim + modsum;
        min_x = min_x.min(x);
        positions.insert(nodes[v].id, (x, nodes[v].depth));
        for &w in &nodes[v].children {
            stack.push((w, modsum + nodes[v].modifier));
        }
    }

    if min_x.is_finite() {
        for (x, _) in positions.values_mut() {
            *x -= min_x;
        }
    }
    positions
}

fn first_walk(nodes: &mut [TidyNode], v: usize) {
    let children = nodes[v].children.clone();
    let left = left_sibling(nodes, v);

    if children.is_empty() {
        nodes[v].prelim = match left {
            Some(w) => nodes[w].prelim + SEPARATION,
            None => 0.0,
        };
        return;
    }

    let mut default_ancestor = children[0];
    for &w in &children {
        first_walk(nodes, w);
        default_ancestor = apportion(nodes, w, default_ancestor);
    }
    execute_shifts(nodes, v);

    let first = nodes[children[0]].prelim;
    let last = nodes[children[children.len() - 1]].prelim;
    let midpoint = (first + last) / 2.0;
    match left {
        Some(w) => {
            nodes[v].prelim = nodes[w].prelim + SEPARATION;
            nodes[v].modifier = nodes[v].prelim - midpoint;
        }
        None => nodes[v].prelim = midpoint,
    }
}

fn apportion(nodes: &mut [TidyNode], v: usize, mut default_ancestor: usize) -> usize {
    let Some(w) = left_sibling(nodes, v) else {
        return default_ancestor;
    };

    // i = inner contour, o = outer contour; r = v's side, l = left forest
    let mut vir = v;
    let mut vor = v;
    let mut vil = w;
    let mut vol = leftmost_sibling(nodes, v);
    let mut sir = nodes[vir].modifier;
    let mut sor = nodes[vor].modifier;
    let mut sil = nodes[vil].modifier;
    let mut sol = nodes[vol].modifier;

    while let (Some(next_il), Some(next_ir)) = (next_right(nodes, vil), next_left(nodes, vir)) {
        let (Some(next_ol), Some(next_or)) = (next_left(nodes, vol), next_right(nodes, vor)) else {
            break;
        };
        vil = next_il;
        vir = next_ir;
        vol = next_ol;
        vor = next_or;
        nodes[vor].ancestor = v;

        let shift = (nodes[vil].prelim + sil) - (nodes[vir].prelim + sir) + SEPARATION;
        if shift > 0.0 {
            let ancestor = ancestor_of(nodes, vil, v, default_ancestor);
            move_subtree(nodes, ancestor, v, shift);
            sir += shift;
            sor += shift;
        }
        sil += nodes[vil].modifier;
        sir += nodes[vir].modifier;
        sol += nodes[vol].modifier;
        sor += nodes[vor].modifier;
    }

    if next_right(nodes, vil).is_some() && next_right(nodes, vor).is_none() {
        nodes[vor].thread = next_right(nodes, vil);
        nodes[vor].modifier += sil - sor;
    }
    if next_left(nodes, vir).is_some() && next_left(nodes, vol).is_none() {
        nodes[vol].thread = next_left(nodes, vir);
        nodes[vol].modifier += sir - sol;
        default_ancestor = v;
    }
    default_ancestor
}

fn move_subtree(nodes: &mut [TidyNode], wl: usize, wr: usize, shift: f32) {
    let subtrees = nodes[wr].number.saturating_sub(nodes[wl].number).max(1) as f32;
    nodes[wr].change -= shift / subtrees;
    nodes[wr].shift += shift;
    nodes[wl].change += shift / subtrees;
    nodes[wr].prelim += shift;
    nodes[wr].modifier += shift;
}

fn execute_shifts(nodes: &mut [TidyNode], v: usize) {
    let mut shift = 0.0;
    let mut change = 0.0;
    let children = nodes[v].children.clone();
    for &w in children.iter().rev() {
        nodes[w].prelim += shift;
        nodes[w].modifier += shift;
        change += nodes[w].change;
        shift += nodes[w].shift + change;
    }
}

fn ancestor_of(nodes: &[TidyNode], vil: usize, v: usize, default_ancestor: usize) -> usize {
    let candidate = nodes[vil].ancestor;
    if nodes[candidate].parent.is_some() && nodes[candidate].parent == nodes[v].parent {
        candidate
    } else {
        default_ancestor
    }
}

fn left_sibling(nodes: &[TidyNode], v: usize) -> Option<usize> {
    let parent = nodes[v].parent?;
    let number = nodes[v].number;
    if number == 0 {
        None
    } else {
        nodes[parent].children.get(number - 1).copied()
    }
}

fn leftmost_sibling(nodes: &[TidyNode], v: usize) -> usize {
    nodes[v]
        .parent
        .and_then(|parent| nodes[parent].children.first().copied())
        .unwrap_or(v)
}

fn next_left(nodes: &[TidyNode], v: usize) -> Option<usize> {
    nodes[v].children.first().copied().or(nodes[v].thread)
}

fn next_right(nodes: &[TidyNode], v: usize) -> Option<usize> {
    nodes[v].children.last().copied().or(nodes[v].thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_hierarchy;
    use crate::tree::fixtures::{example_records, sample_records};

    const EPS: f32 = 1e-4;

    #[test]
    fn centers_root_over_two_leaves() {
        let tree = build_hierarchy(&example_records()).unwrap();
        let positions = layout_subtree(&tree, 0, |_| true);

        assert_eq!(positions.len(), 3);
        assert!((positions[&1].0 - 0.0).abs() < EPS);
        assert!((positions[&2].0 - 1.0).abs() < EPS);
        assert!((positions[&0].0 - 0.5).abs() < EPS);
        assert_eq!(positions[&0].1, 0);
        assert_eq!(positions[&2].1, 1);
    }

    #[test]
    fn single_node_sits_at_origin() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let positions = layout_subtree(&tree, 10, |_| true);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[&10], (0.0, 0));
    }

    #[test]
    fn levels_never_overlap_and_parents_are_centered() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let positions = layout_subtree(&tree, 0, |_| true);
        assert_eq!(positions.len(), tree.len());

        let mut by_depth: HashMap<usize, Vec<f32>> = HashMap::new();
        for &(x, depth) in positions.values() {
            by_depth.entry(depth).or_default().push(x);
        }
        for xs in by_depth.values_mut() {
            xs.sort_by(f32::total_cmp);
            for pair in xs.windows(2) {
                assert!(pair[1] - pair[0] >= SEPARATION - EPS, "overlap at {:?}", xs);
            }
        }

        for node in tree.nodes().filter(|node| node.children.len() == 2) {
            let left = positions[&node.children[0]].0;
            let right = positions[&node.children[1]].0;
            assert!(left < right);
            assert!((positions[&node.id].0 - (left + right) / 2.0).abs() < EPS);
        }
    }

    #[test]
    fn respects_include_filter_and_relative_depth() {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        tree.node_mut(9).unwrap().is_hidden = true;

        let positions = layout_subtree(&tree, 2, |node| node.is_visible());
        let mut ids: Vec<NodeId> = positions.keys().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 5, 6, 10]);
        assert_eq!(positions[&2].1, 0);
        assert_eq!(positions[&10].1, 2);

        assert!(layout_subtree(&tree, 9, |node| node.is_visible()).is_empty());
        assert!(layout_subtree(&tree, 99, |_| true).is_empty());
    }
}
