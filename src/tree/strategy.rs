//! Per-view processing behind one interface, so the three tree kinds share a
//! single builder and tracer instead of drifting copies.

use super::layout::{blocks, LayoutConfig, TreeKind, TreeLayout};
use super::path::{self, DecisionPath, SplitRule};
use super::{visibility, DecisionTree, HierarchyNode, Instance, NodeId, NodeRecord};

pub trait TreeProcessingStrategy {
    fn kind(&self) -> TreeKind;

    fn split_rule(&self) -> SplitRule;

    fn build_hierarchy(&self, records: &[NodeRecord], _config: &LayoutConfig) -> Option<DecisionTree> {
        super::build_hierarchy(records)
    }

    fn trace_path(&self, tree: &DecisionTree, instance: &Instance) -> DecisionPath {
        path::trace_path(tree, instance, self.split_rule())
    }

    fn find_node<'a>(&self, tree: &'a DecisionTree, id: NodeId) -> Option<&'a HierarchyNode> {
        tree.node(id)
    }

    fn all_paths(&self, tree: &DecisionTree) -> Vec<Vec<NodeId>> {
        tree.all_paths()
    }

    /// Per-view state set up before the first layout (visibility flags).
    fn prepare(&self, tree: &mut DecisionTree, _path: &DecisionPath, _config: &LayoutConfig) {
        tree.reset_view_flags();
    }

    fn layout(&self, tree: &mut DecisionTree, path: &DecisionPath, config: &LayoutConfig) -> TreeLayout {
        TreeLayout::compute(self.kind(), tree, path, config)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicStrategy {
    pub rule: SplitRule,
}

impl TreeProcessingStrategy for ClassicStrategy {
    fn kind(&self) -> TreeKind {
        TreeKind::Classic
    }

    fn split_rule(&self) -> SplitRule {
        self.rule
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BlocksStrategy {
    pub rule: SplitRule,
}

impl TreeProcessingStrategy for BlocksStrategy {
    fn kind(&self) -> TreeKind {
        TreeKind::Blocks
    }

    fn split_rule(&self) -> SplitRule {
        self.rule
    }

    fn build_hierarchy(&self, records: &[NodeRecord], config: &LayoutConfig) -> Option<DecisionTree> {
        let mut tree = super::build_hierarchy(records)?;
        blocks::seed_depth_positions(&mut tree, config);
        Some(tree)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnStrategy {
    pub rule: SplitRule,
}

impl TreeProcessingStrategy for SpawnStrategy {
    fn kind(&self) -> TreeKind {
        TreeKind::Spawn
    }

    fn split_rule(&self) -> SplitRule {
        self.rule
    }

    fn prepare(&self, tree: &mut DecisionTree, path: &DecisionPath, config: &LayoutConfig) {
        visibility::prepare(tree, path, config.spawn.initial_visible_depth);
    }
}

pub fn strategy_for(kind: TreeKind, rule: SplitRule) -> Box<dyn TreeProcessingStrategy> {
    match kind {
        TreeKind::Classic => Box::new(ClassicStrategy { rule }),
        TreeKind::Blocks => Box::new(BlocksStrategy { rule }),
        TreeKind::Spawn => Box::new(SpawnStrategy { rule }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fixtures::{instance, sample_records};

    #[test]
    fn factory_returns_matching_kind() {
        for kind in TreeKind::ALL {
            let strategy = strategy_for(kind, SplitRule::LessThan);
            assert_eq!(strategy.kind(), kind);
            assert_eq!(strategy.split_rule(), SplitRule::LessThan);
        }
    }

    #[test]
    fn every_strategy_traces_the_same_path() {
        let records = sample_records();
        let config = LayoutConfig::default();
        let sample = instance(&[("x", 6.0), ("z", 1.0), ("color_red", 0.0)]);

        let traced: Vec<DecisionPath> = TreeKind::ALL
            .iter()
            .map(|&kind| {
                let strategy = strategy_for(kind, SplitRule::default());
                let tree = strategy.build_hierarchy(&records, &config).unwrap();
                assert_eq!(strategy.all_paths(&tree).len(), 7);
                assert_eq!(strategy.find_node(&tree, 9).unwrap().feature_name(), Some("color_red"));
                strategy.trace_path(&tree, &sample)
            })
            .collect();

        assert_eq!(traced[0].nodes, vec![0, 2, 6, 9, 11]);
        assert!(traced.iter().all(|path| *path == traced[0]));
    }

    #[test]
    fn blocks_build_seeds_depth_columns() {
        let config = LayoutConfig::default();
        let tree = BlocksStrategy::default()
            .build_hierarchy(&sample_records(), &config)
            .unwrap();
        assert_eq!(tree.node(0).unwrap().x, config.margin.left);
        assert_eq!(tree.node(1).unwrap().x, tree.node(2).unwrap().x);
        assert!(tree.node(12).unwrap().x > tree.node(9).unwrap().x);
    }

    #[test]
    fn spawn_prepare_hides_deep_off_path_nodes() {
        let config = LayoutConfig::default();
        let strategy = SpawnStrategy::default();
        let mut tree = strategy.build_hierarchy(&sample_records(), &config).unwrap();
        let path = strategy.trace_path(&tree, &instance(&[("x", 1.0), ("y", 1.0)]));

        strategy.prepare(&mut tree, &path, &config);
        assert!(tree.node(11).unwrap().is_hidden);

        let layout = strategy.layout(&mut tree, &path, &config);
        assert!(!layout.contains(11));
        assert!(layout.contains(3));
    }
}
