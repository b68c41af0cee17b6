use std::collections::BTreeMap;

use super::{tidy, LayoutConfig, TreeKind, TreeLayout};
use crate::tree::DecisionTree;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassicConfig {
    /// Minimum horizontal room per node; wide trees grow the canvas.
    pub node_spacing: f32,
    /// Minimum vertical distance between depth levels.
    pub level_spacing: f32,
}

impl Default for ClassicConfig {
    fn default() -> Self {
        Self {
            node_spacing: 40.0,
            level_spacing: 80.0,
        }
    }
}

/// Depth-leveled tidy layout of the whole tree, root at the top.
pub fn build(tree: &DecisionTree, config: &LayoutConfig) -> TreeLayout {
    let settings = &config.classic;
    let units = tidy::layout_subtree(tree, tree.root().id, |_| true);
    let node_count = units.len();
    let (node_radius, stroke_scale) = config.node_sizing(node_count);

    let max_unit = units.values().map(|&(x, _)| x).fold(0.0f32, f32::max);
    let max_depth = units.values().map(|&(_, depth)| depth).max().unwrap_or(0);

    let inner_width = (config.width - config.margin.horizontal())
        .max(node_count as f32 * settings.node_spacing);
    let inner_height = (config.height - config.margin.vertical())
        .max(max_depth as f32 * settings.level_spacing);
    let level_step = if max_depth > 0 {
        inner_height / max_depth as f32
    } else {
        0.0
    };

    let positions: BTreeMap<_, _> = units
        .iter()
        .map(|(&id, &(unit_x, depth))| {
            let x = if max_unit > 0.0 {
                config.margin.left + unit_x / max_unit * inner_width
            } else {
                config.margin.left + inner_width / 2.0
            };
            let y = config.margin.top + depth as f32 * level_step;
            (id, (x, y))
        })
        .collect();

    TreeLayout {
        kind: TreeKind::Classic,
        positions,
        links: tree.links(),
        width: inner_width + config.margin.horizontal(),
        height: inner_height + config.margin.vertical(),
        node_radius,
        stroke_scale,
    }
}
