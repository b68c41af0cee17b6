use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use log::debug;
use serde::Serialize;

use super::path::DecisionPath;
use super::{DecisionTree, NodeId};

pub mod blocks;
pub mod classic;
pub mod spawn;
pub mod tidy;

pub use blocks::BlocksConfig;
pub use classic::ClassicConfig;
pub use spawn::SpawnConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Classic,
    Blocks,
    Spawn,
}

impl TreeKind {
    pub const ALL: [TreeKind; 3] = [TreeKind::Classic, TreeKind::Blocks, TreeKind::Spawn];

    pub fn name(self) -> &'static str {
        match self {
            TreeKind::Classic => "classic",
            TreeKind::Blocks => "blocks",
            TreeKind::Spawn => "spawn",
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margin {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

impl Default for Margin {
    fn default() -> Self {
        Self {
            top: 40.0,
            right: 40.0,
            bottom: 40.0,
            left: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub margin: Margin,
    pub base_node_radius: f32,
    pub min_density_scale: f32,
    pub max_density_scale: f32,
    pub classic: ClassicConfig,
    pub blocks: BlocksConfig,
    pub spawn: SpawnConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 600.0,
            margin: Margin::default(),
            base_node_radius: 12.0,
            min_density_scale: 1.0,
            max_density_scale: 3.0,
            classic: ClassicConfig::default(),
            blocks: BlocksConfig::default(),
            spawn: SpawnConfig::default(),
        }
    }
}

impl LayoutConfig {
    /// `sqrt(n / 30)` clamped to the configured range; dense trees shrink.
    pub fn density_scale(&self, node_count: usize) -> f32 {
        let raw = (node_count as f32 / 30.0).sqrt();
        raw.clamp(self.min_density_scale, self.max_density_scale)
    }

    /// Node radius and stroke multiplier for a drawing of `node_count` nodes.
    pub fn node_sizing(&self, node_count: usize) -> (f32, f32) {
        let scale = self.density_scale(node_count);
        (self.base_node_radius / scale, 1.0 / scale)
    }
}

/// Computed coordinates for one view. Pure data; renderers only read it.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    pub kind: TreeKind,
    pub positions: BTreeMap<NodeId, (f32, f32)>,
    pub links: Vec<(NodeId, NodeId)>,
    pub width: f32,
    pub height: f32,
    pub node_radius: f32,
    pub stroke_scale: f32,
}

impl TreeLayout {
    /// Lay out `tree` for `kind` and write the resulting `x`/`y` back into the
    /// positioned nodes.
    pub fn compute(
        kind: TreeKind,
        tree: &mut DecisionTree,
        path: &DecisionPath,
        config: &LayoutConfig,
    ) -> Self {
        let layout = match kind {
            TreeKind::Classic => Self::classic_layout(tree, config),
            TreeKind::Blocks => Self::blocks_layout(tree, path, config),
            TreeKind::Spawn => Self::spawn_layout(tree, path, config),
        };
        layout.apply_to(tree);
        debug!(
            "{} layout: {} node(s), {} link(s), {:.0}x{:.0}",
            kind,
            layout.positions.len(),
            layout.links.len(),
            layout.width,
            layout.height
        );
        layout
    }

    fn classic_layout(tree: &DecisionTree, config: &LayoutConfig) -> Self {
        classic::build(tree, config)
    }

    fn blocks_layout(tree: &DecisionTree, path: &DecisionPath, config: &LayoutConfig) -> Self {
        blocks::build(tree, path, config)
    }

    fn spawn_layout(tree: &mut DecisionTree, path: &DecisionPath, config: &LayoutConfig) -> Self {
        spawn::build(tree, path, config)
    }

    pub fn position(&self, id: NodeId) -> Option<(f32, f32)> {
        self.positions.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    fn apply_to(&self, tree: &mut DecisionTree) {
        for (&id, &(x, y)) in &self.positions {
            if let Some(node) = tree.node_mut(id) {
                node.x = x;
                node.y = y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::build_hierarchy;
    use crate::tree::fixtures::{instance, sample_records};
    use crate::tree::path::{trace_path, SplitRule};

    #[test]
    fn density_scale_is_clamped() {
        let config = LayoutConfig::default();
        assert_eq!(config.density_scale(3), 1.0);
        assert!((config.density_scale(120) - 2.0).abs() < 1e-6);
        assert_eq!(config.density_scale(100_000), 3.0);

        let (radius, stroke) = config.node_sizing(120);
        assert!((radius - 6.0).abs() < 1e-5);
        assert!((stroke - 0.5).abs() < 1e-6);
    }

    #[test]
    fn compute_writes_coordinates_into_nodes() {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        let path = trace_path(&tree, &instance(&[("x", 1.0), ("y", 1.0)]), SplitRule::default());

        for kind in TreeKind::ALL {
            let layout = TreeLayout::compute(kind, &mut tree, &path, &LayoutConfig::default());
            assert_eq!(layout.kind, kind);
            for (&id, &(x, y)) in &layout.positions {
                let node = tree.node(id).unwrap();
                assert_eq!((node.x, node.y), (x, y), "{kind} node {id}");
            }
            assert!(layout.width > 0.0 && layout.height > 0.0);
        }
    }

    #[test]
    fn compute_matches_the_per_kind_builders() {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        let path = trace_path(&tree, &instance(&[("x", 6.0), ("z", 0.2)]), SplitRule::default());
        let config = LayoutConfig::default();

        let classic = TreeLayout::compute(TreeKind::Classic, &mut tree, &path, &config);
        assert_eq!(classic.positions, classic::build(&tree, &config).positions);
        let blocks = TreeLayout::compute(TreeKind::Blocks, &mut tree, &path, &config);
        assert_eq!(blocks.positions, blocks::build(&tree, &path, &config).positions);
        assert_ne!(classic.positions, blocks.positions);
    }

    #[test]
    fn kind_names_round_trip_through_clap() {
        for kind in TreeKind::ALL {
            assert_eq!(TreeKind::from_str(kind.name(), true), Ok(kind));
        }
    }
}
