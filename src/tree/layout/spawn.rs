use std::collections::BTreeMap;

use log::{error, warn};

use super::{classic, tidy, LayoutConfig, TreeKind, TreeLayout};
use crate::tree::path::DecisionPath;
use crate::tree::{DecisionTree, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    /// Off-path levels shown before the user expands anything, counted from
    /// each off-path subtree root.
    pub initial_visible_depth: usize,
    /// Distance between adjacent path nodes with nothing hanging off them.
    pub min_path_margin: f32,
    /// Extra path spacing per node of the larger adjacent off-path subtree,
    /// hidden nodes included.
    pub spacing_multiplier: f32,
    /// Vertical distance from the path line to an off-path subtree root.
    pub subtree_gap: f32,
    pub node_spacing: f32,
    pub level_spacing: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            initial_visible_depth: crate::tree::visibility::DEFAULT_INITIAL_VISIBLE_DEPTH,
            min_path_margin: 80.0,
            spacing_multiplier: 12.0,
            subtree_gap: 60.0,
            node_spacing: 36.0,
            level_spacing: 56.0,
        }
    }
}

/// Instance path on one horizontal line with the visible part of every
/// off-path subtree hanging alternately above and below it.
pub fn build(tree: &mut DecisionTree, path: &DecisionPath, config: &LayoutConfig) -> TreeLayout {
    let path_nodes: Vec<NodeId> = path
        .nodes
        .iter()
        .copied()
        .filter(|&id| tree.contains(id))
        .collect();
    if path_nodes.is_empty() {
        warn!("spawn layout has no resolvable path nodes; falling back to the classic layout");
        tree.reset_view_flags();
        let mut fallback = classic::build(tree, config);
        fallback.kind = TreeKind::Spawn;
        return fallback;
    }

    let settings = &config.spawn;
    let tree = &*tree;

    let off_path: Vec<Vec<NodeId>> = path_nodes
        .iter()
        .map(|&id| {
            tree.children(id)
                .iter()
                .copied()
                .filter(|child| !path_nodes.contains(child))
                .collect()
        })
        .collect();
    let hanging_sizes: Vec<usize> = off_path
        .iter()
        .map(|children| children.iter().map(|&child| tree.subtree_size(child)).sum())
        .collect();

    // Path line at y = 0; everything is shifted onto the canvas at the end
    let mut positions: BTreeMap<NodeId, (f32, f32)> = BTreeMap::new();
    let mut x = 0.0f32;
    for (i, &id) in path_nodes.iter().enumerate() {
        if i > 0 {
            let widest = hanging_sizes[i - 1].max(hanging_sizes[i]);
            x += settings.min_path_margin + widest as f32 * settings.spacing_multiplier;
        }
        positions.insert(id, (x, 0.0));
    }

    let mut subtree_index = 0usize;
    for (&anchor, children) in path_nodes.iter().zip(&off_path) {
        let (anchor_x, _) = positions[&anchor];
        for &child in children {
            let Some(child_node) = tree.node(child) else {
                error!("off-path child {} of node {} is missing; skipping", child, anchor);
                continue;
            };
            if child_node.is_hidden {
                continue;
            }

            let units = tidy::layout_subtree(tree, child, |node| node.is_visible());
            let Some(&(root_unit, _)) = units.get(&child) else {
                error!("could not lay out off-path subtree at node {}; skipping", child);
                continue;
            };

            let direction = if subtree_index % 2 == 0 { -1.0 } else { 1.0 };
            subtree_index += 1;
            for (id, (unit_x, depth)) in units {
                let offset = settings.subtree_gap + depth as f32 * settings.level_spacing;
                let node_x = anchor_x + (unit_x - root_unit) * settings.node_spacing;
                positions.insert(id, (node_x, direction * offset));
            }
        }
    }

    let (width, height) = fit_to_canvas(&mut positions, config);
    let (node_radius, stroke_scale) = config.node_sizing(tree.len());
    let links = tree
        .visible_links()
        .into_iter()
        .filter(|(parent, child)| positions.contains_key(parent) && positions.contains_key(child))
        .collect();

    TreeLayout {
        kind: TreeKind::Spawn,
        positions,
        links,
        width,
        height,
        node_radius,
        stroke_scale,
    }
}

/// Center the drawing inside the margins, growing the canvas if needed.
fn fit_to_canvas(positions: &mut BTreeMap<NodeId, (f32, f32)>, config: &LayoutConfig) -> (f32, f32) {
    let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
    for &(x, y) in positions.values() {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if !min_x.is_finite() || !min_y.is_finite() {
        return (config.width, config.height);
    }

    let content_width = max_x - min_x;
    let content_height = max_y - min_y;
    let width = config.width.max(content_width + config.margin.horizontal());
    let height = config.height.max(content_height + config.margin.vertical());
    let shift_x = config.margin.left + (width - config.margin.horizontal() - content_width) / 2.0 - min_x;
    let shift_y = config.margin.top + (height - config.margin.vertical() - content_height) / 2.0 - min_y;

    for (x, y) in positions.values_mut() {
        *x += shift_x;
        *y += shift_y;
    }
    (width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_hierarchy;
    use crate::tree::fixtures::{instance, sample_records};
    use crate::tree::path::{trace_path, SplitRule};
    use crate::tree::visibility;

    fn prepared(pairs: &[(&str, f64)], depth: usize) -> (DecisionTree, DecisionPath) {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        let path = trace_path(&tree, &instance(pairs), SplitRule::default());
        visibility::prepare(&mut tree, &path, depth);
        (tree, path)
    }

    #[test]
    fn path_nodes_share_one_line_left_to_right() {
        let (mut tree, path) = prepared(&[("x", 1.0), ("y", 5.0), ("w", 0.0)], 2);
        assert_eq!(path.nodes, vec![0, 1, 4, 7]);
        let layout = build(&mut tree, &path, &LayoutConfig::default());

        let line_y = layout.position(0).unwrap().1;
        let xs: Vec<f32> = path
            .nodes
            .iter()
            .map(|&id| {
                let (x, y) = layout.position(id).unwrap();
                assert_eq!(y, line_y);
                x
            })
            .collect();
        for pair in xs.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn bigger_hanging_subtrees_get_more_room() {
        let (mut tree, path) = prepared(&[("x", 1.0), ("y", 5.0), ("w", 0.0)], 5);
        let config = LayoutConfig::default();
        let layout = build(&mut tree, &path, &config);
        let x = |id| layout.position(id).unwrap().0;

        // Node 0 carries subtree 2 (7 nodes), node 1 carries leaf 3, node 4 leaf 8
        let gap_01 = x(1) - x(0);
        let gap_47 = x(7) - x(4);
        assert!((gap_01 - (config.spawn.min_path_margin + 7.0 * config.spawn.spacing_multiplier)).abs() < 1e-3);
        assert!((gap_47 - (config.spawn.min_path_margin + config.spawn.spacing_multiplier)).abs() < 1e-3);
    }

    #[test]
    fn path_spacing_ignores_collapsed_state() {
        let (mut tree, path) = prepared(&[("x", 1.0), ("y", 5.0), ("w", 0.0)], 1);
        let config = LayoutConfig::default();
        assert!(tree.node(9).unwrap().is_hidden);

        let collapsed = build(&mut tree, &path, &config);
        let gaps = |layout: &TreeLayout| -> Vec<f32> {
            path.nodes
                .windows(2)
                .map(|pair| layout.position(pair[1]).unwrap().0 - layout.position(pair[0]).unwrap().0)
                .collect()
        };
        // Subtree 2 counts all 7 nodes even though only 3 are visible
        let expected = config.spawn.min_path_margin + 7.0 * config.spawn.spacing_multiplier;
        assert!((gaps(&collapsed)[0] - expected).abs() < 1e-3);

        assert!(visibility::expand(&mut tree, 6));
        let expanded = build(&mut tree, &path, &config);
        assert!(expanded.contains(11));
        assert_eq!(gaps(&collapsed), gaps(&expanded));
        assert_eq!(collapsed.node_radius, expanded.node_radius);
        assert_eq!(collapsed.node_radius, config.node_sizing(tree.len()).0);
    }

    #[test]
    fn off_path_subtrees_alternate_above_and_below() {
        let (mut tree, path) = prepared(&[("x", 1.0), ("y", 5.0), ("w", 0.0)], 5);
        let layout = build(&mut tree, &path, &LayoutConfig::default());
        let line_y = layout.position(0).unwrap().1;

        // Hanging roots in path order: 2 (above), 3 (below), 8 (above)
        assert!(layout.position(2).unwrap().1 < line_y);
        assert!(layout.position(3).unwrap().1 > line_y);
        assert!(layout.position(8).unwrap().1 < line_y);
        assert_eq!(layout.position(2).unwrap().0, layout.position(0).unwrap().0);
        // Deeper nodes move further from the line
        assert!(layout.position(6).unwrap().1 < layout.position(2).unwrap().1);
    }

    #[test]
    fn hidden_nodes_are_neither_placed_nor_linked() {
        let (mut tree, path) = prepared(&[("x", 1.0), ("y", 1.0)], 1);
        let layout = build(&mut tree, &path, &LayoutConfig::default());

        for id in [9, 10, 11, 12] {
            assert!(tree.node(id).unwrap().is_hidden);
            assert!(!layout.contains(id));
        }
        assert!(layout.contains(6));
        for (parent, child) in &layout.links {
            assert!(layout.contains(*parent) && layout.contains(*child));
        }
        assert!(!layout.links.contains(&(6, 9)));
        assert_eq!(layout.links.len(), layout.node_count() - 1);
    }

    #[test]
    fn unresolvable_path_falls_back_to_classic() {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        tree.node_mut(12).unwrap().is_hidden = true;
        let path = DecisionPath {
            nodes: vec![42],
            stop: None,
        };
        let layout = build(&mut tree, &path, &LayoutConfig::default());

        assert_eq!(layout.kind, TreeKind::Spawn);
        assert_eq!(layout.node_count(), tree.len());
        assert!(tree.nodes().all(|node| node.is_visible()));
    }
}
