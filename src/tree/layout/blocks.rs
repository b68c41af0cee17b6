use std::collections::BTreeMap;

use super::{LayoutConfig, TreeKind, TreeLayout};
use crate::tree::path::DecisionPath;
use crate::tree::{DecisionTree, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub struct BlocksConfig {
    /// Vertical distance between stacked paths.
    pub row_spacing: f32,
    /// Minimum horizontal distance between depth columns.
    pub column_spacing: f32,
    /// Extra canvas width per unique node.
    pub width_per_node: f32,
}

impl Default for BlocksConfig {
    fn default() -> Self {
        Self {
            row_spacing: 48.0,
            column_spacing: 110.0,
            width_per_node: 12.0,
        }
    }
}

/// A root-to-tip path together with where it leaves the instance path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedPath {
    pub nodes: Vec<NodeId>,
    pub branch_point: usize,
}

/// Index of the last position where `path` agrees with `instance_path`.
pub fn branch_point(path: &[NodeId], instance_path: &[NodeId]) -> usize {
    path.iter()
        .zip(instance_path)
        .take_while(|(a, b)| a == b)
        .count()
        .saturating_sub(1)
}

/// Every path except the instance's own, ordered by ascending branch point.
/// Ties keep their depth-first enumeration order.
pub fn rank_paths(paths: &[Vec<NodeId>], instance_path: &[NodeId]) -> Vec<RankedPath> {
    let mut ranked: Vec<RankedPath> = paths
        .iter()
        .filter(|path| path.as_slice() != instance_path)
        .map(|path| RankedPath {
            nodes: path.clone(),
            branch_point: branch_point(path, instance_path),
        })
        .collect();
    ranked.sort_by_key(|path| path.branch_point);
    ranked
}

/// Fixed x per depth, spread evenly over `inner_width`.
fn depth_columns(max_depth: usize, left: f32, inner_width: f32) -> Vec<f32> {
    let step = if max_depth > 0 {
        inner_width / max_depth as f32
    } else {
        0.0
    };
    (0..=max_depth).map(|depth| left + depth as f32 * step).collect()
}

/// Depth-only positions, written while the hierarchy is built so the blocks
/// view has something to draw before its first full layout.
pub fn seed_depth_positions(tree: &mut DecisionTree, config: &LayoutConfig) {
    let max_depth = tree.max_depth();
    let inner_width = (config.width - config.margin.horizontal())
        .max(max_depth as f32 * config.blocks.column_spacing);
    let columns = depth_columns(max_depth, config.margin.left, inner_width);
    for node in tree.nodes_mut() {
        node.x = columns.get(node.depth).copied().unwrap_or(config.margin.left);
        node.y = config.margin.top;
    }
}

/// Stack all root-to-tip paths as rows; the instance path is pinned to the
/// bottom row and the others rise above it by branch point.
pub fn build(tree: &DecisionTree, path: &DecisionPath, config: &LayoutConfig) -> TreeLayout {
    let settings = &config.blocks;
    let ranked = rank_paths(&tree.all_paths(), &path.nodes);
    let node_count = tree.len();
    let (node_radius, stroke_scale) = config.node_sizing(node_count);

    let max_depth = tree.max_depth();
    let rows = ranked.len() + 1;
    let inner_width = (config.width - config.margin.horizontal())
        .max(max_depth as f32 * settings.column_spacing)
        .max(node_count as f32 * settings.width_per_node);
    let required_height = config
        .height
        .max(config.margin.vertical() + rows as f32 * settings.row_spacing);
    let columns = depth_columns(max_depth, config.margin.left, inner_width);
    let bottom_y = required_height - config.margin.bottom;

    let column_of = |id: NodeId| {
        tree.node(id)
            .and_then(|node| columns.get(node.depth).copied())
            .unwrap_or(config.margin.left)
    };

    let mut positions = BTreeMap::new();
    for &id in path.nodes.iter().filter(|&&id| tree.contains(id)) {
        positions.entry(id).or_insert((column_of(id), bottom_y));
    }
    for (row, ranked_path) in ranked.iter().enumerate() {
        let y = bottom_y - (row + 1) as f32 * settings.row_spacing;
        for &id in &ranked_path.nodes {
            positions.entry(id).or_insert((column_of(id), y));
        }
    }

    TreeLayout {
        kind: TreeKind::Blocks,
        positions,
        links: tree.links(),
        width: inner_width + config.margin.horizontal(),
        height: required_height,
        node_radius,
        stroke_scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_hierarchy;
    use crate::tree::fixtures::{instance, sample_records};
    use crate::tree::path::{trace_path, SplitRule};

    #[test]
    fn branch_point_is_last_shared_index() {
        assert_eq!(branch_point(&[0, 1, 3], &[0, 1, 4, 8]), 1);
        assert_eq!(branch_point(&[0, 2, 5], &[0, 1, 4, 8]), 0);
        assert_eq!(branch_point(&[0, 1, 4, 7], &[0, 1, 4, 8]), 2);
        assert_eq!(branch_point(&[], &[0]), 0);
    }

    #[test]
    fn alternates_are_ranked_by_non_decreasing_branch_point() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let instance_path = vec![0, 2, 6, 9, 12];
        let ranked = rank_paths(&tree.all_paths(), &instance_path);

        assert_eq!(ranked.len(), 6);
        assert!(ranked.iter().all(|path| path.nodes != instance_path));
        for pair in ranked.windows(2) {
            assert!(pair[0].branch_point <= pair[1].branch_point);
        }
        assert_eq!(ranked[0].branch_point, 0);
        assert_eq!(ranked.last().unwrap().nodes, vec![0, 2, 6, 9, 11]);
        assert_eq!(ranked.last().unwrap().branch_point, 3);
    }

    #[test]
    fn instance_path_is_pinned_to_the_bottom_row() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let path = trace_path(
            &tree,
            &instance(&[("x", 6.0), ("z", 1.0), ("color_red", 1.0)]),
            SplitRule::default(),
        );
        let config = LayoutConfig::default();
        let layout = build(&tree, &path, &config);
        let bottom_y = layout.height - config.margin.bottom;

        assert_eq!(layout.node_count(), tree.len());
        for &id in &path.nodes {
            assert_eq!(layout.position(id).unwrap().1, bottom_y);
        }

        // Shared prefixes keep the row they were first placed on
        let ranked = rank_paths(&tree.all_paths(), &path.nodes);
        let mut previous_row_y = bottom_y;
        for ranked_path in &ranked {
            let tip = *ranked_path.nodes.last().unwrap();
            let y = layout.position(tip).unwrap().1;
            assert!(y < previous_row_y);
            previous_row_y = y;
        }
    }

    #[test]
    fn columns_follow_depth() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let layout = build(&tree, &DecisionPath::default(), &LayoutConfig::default());

        for node in tree.nodes() {
            for &child in &node.children {
                let parent_x = layout.position(node.id).unwrap().0;
                assert!(layout.position(child).unwrap().0 > parent_x);
            }
        }
        let same_depth: Vec<f32> = [1, 2]
            .iter()
            .map(|&id| layout.position(id).unwrap().0)
            .collect();
        assert_eq!(same_depth[0], same_depth[1]);
    }

    #[test]
    fn height_grows_with_path_count() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        let config = LayoutConfig {
            height: 50.0,
            ..LayoutConfig::default()
        };
        let layout = build(&tree, &DecisionPath::default(), &config);
        assert!(layout.height >= 8.0 * config.blocks.row_spacing);
    }
}
