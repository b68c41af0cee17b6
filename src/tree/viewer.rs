use std::collections::BTreeMap;

use log::{debug, info, warn};

use super::highlight::{HighlightCoordinator, HighlightTarget, Selection, ViewHighlight};
use super::layout::{LayoutConfig, TreeKind, TreeLayout};
use super::painter::TreePainter;
use super::path::{DecisionPath, SplitRule};
use super::strategy::{strategy_for, TreeProcessingStrategy};
use super::{visibility, DecisionTree, Instance, NodeId, NodeRecord};
use crate::features::FeatureMappingInfo;
use crate::io::ExplanationPayload;
use crate::scatter::ScatterPlot;

/// Everything one tree view needs between events. Each view owns its own
/// copy of the hierarchy, so spawn visibility never leaks into other views.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub kind: TreeKind,
    pub tree: Option<DecisionTree>,
    pub instance: Instance,
    pub path: DecisionPath,
    pub layout: Option<TreeLayout>,
    pub highlight: ViewHighlight,
    pub painter: TreePainter,
    rule: SplitRule,
}

impl ViewState {
    pub fn new(kind: TreeKind, rule: SplitRule, painter: TreePainter) -> Self {
        Self {
            kind,
            tree: None,
            instance: Instance::new(),
            path: DecisionPath::unresolved(),
            layout: None,
            highlight: ViewHighlight::default(),
            painter,
            rule,
        }
    }

    fn strategy(&self) -> Box<dyn TreeProcessingStrategy> {
        strategy_for(self.kind, self.rule)
    }

    /// Build, trace, prepare and lay out. Returns `false` when the records
    /// do not form a tree; the view then stays empty.
    pub fn load(&mut self, records: &[NodeRecord], instance: Instance, config: &LayoutConfig) -> bool {
        let strategy = self.strategy();
        self.highlight = ViewHighlight::default();
        self.instance = instance;
        self.tree = strategy.build_hierarchy(records, config);

        let Some(tree) = self.tree.as_mut() else {
            self.path = DecisionPath::unresolved();
            self.layout = None;
            return false;
        };
        self.path = strategy.trace_path(tree, &self.instance);
        strategy.prepare(tree, &self.path, config);
        self.relayout(config)
    }

    /// Recompute the layout from the current flags and re-cache link widths.
    pub fn relayout(&mut self, config: &LayoutConfig) -> bool {
        let strategy = self.strategy();
        let Some(tree) = self.tree.as_mut() else {
            debug!("{} view has no tree to lay out", self.kind);
            return false;
        };
        let layout = strategy.layout(tree, &self.path, config);
        let widths = self.painter.link_widths(tree, &layout);
        self.highlight.cache_original_widths(widths, &self.painter);
        self.layout = Some(layout);
        true
    }

    pub fn has_tree(&self) -> bool {
        self.tree.is_some()
    }
}

impl HighlightTarget for ViewState {
    fn kind(&self) -> TreeKind {
        self.kind
    }

    fn hierarchy(&self) -> Option<&DecisionTree> {
        self.tree.as_ref()
    }

    fn split_rule(&self) -> SplitRule {
        self.rule
    }

    fn reset_highlights(&mut self) {
        self.highlight.reset();
    }

    fn highlight_node(&mut self, id: NodeId) {
        self.highlight.highlight_node(id);
    }

    fn highlight_link(&mut self, parent: NodeId, child: NodeId) {
        self.highlight.highlight_link((parent, child), &self.painter);
    }
}

/// Owner of every active view, the shared selection, the scatter plot and
/// the feature mapping of the current explanation.
#[derive(Debug, Clone, Default)]
pub struct TreeViewManager {
    config: LayoutConfig,
    rule: SplitRule,
    views: BTreeMap<TreeKind, ViewState>,
    coordinator: HighlightCoordinator,
    scatter: Option<ScatterPlot>,
    feature_mapping: Option<FeatureMappingInfo>,
    unique_classes: Vec<String>,
}

impl TreeViewManager {
    pub fn new(config: LayoutConfig, rule: SplitRule) -> Self {
        Self {
            config,
            rule,
            ..Self::default()
        }
    }

    /// Replace the current explanation. Returns `true` if at least one view
    /// has a tree to show.
    pub fn load_explanation(&mut self, payload: &ExplanationPayload, kinds: &[TreeKind]) -> bool {
        self.reset();
        self.feature_mapping = payload.feature_mapping_info.clone();
        self.unique_classes = payload.unique_classes.clone();
        self.scatter = payload
            .scatter_plot_visualization_data
            .clone()
            .map(ScatterPlot::from_data);

        let instance = payload.instance();
        let mut painter = TreePainter::default();
        painter.set_class_palette(&self.unique_classes);

        for &kind in kinds {
            if self.views.contains_key(&kind) {
                continue;
            }
            let mut view = ViewState::new(kind, self.rule, painter.clone());
            if !view.load(&payload.decision_tree_visualization_data, instance.clone(), &self.config) {
                warn!("{} view could not build a tree from the payload", kind);
            }
            self.views.insert(kind, view);
        }

        let built = self.views.values().any(ViewState::has_tree);
        info!(
            "explanation loaded into {} view(s); scatter points: {}",
            self.views.len(),
            self.scatter.as_ref().map_or(0, ScatterPlot::len)
        );
        built
    }

    pub fn view(&self, kind: TreeKind) -> Option<&ViewState> {
        self.views.get(&kind)
    }

    pub fn view_mut(&mut self, kind: TreeKind) -> Option<&mut ViewState> {
        self.views.get_mut(&kind)
    }

    pub fn views(&self) -> impl Iterator<Item = &ViewState> {
        self.views.values()
    }

    pub fn active_kinds(&self) -> Vec<TreeKind> {
        self.views.keys().copied().collect()
    }

    pub fn relayout(&mut self, kind: TreeKind) -> bool {
        match self.views.get_mut(&kind) {
            Some(view) => view.relayout(&self.config),
            None => {
                debug!("no {} view to lay out", kind);
                false
            }
        }
    }

    /// Expand or collapse an off-path node of the spawn view and lay it out
    /// again. Highlighting survives the relayout.
    pub fn toggle_spawn_node(&mut self, id: NodeId) -> bool {
        let Some(view) = self.views.get_mut(&TreeKind::Spawn) else {
            debug!("no spawn view; ignoring toggle of node {}", id);
            return false;
        };
        let changed = view
            .tree
            .as_mut()
            .map_or(false, |tree| visibility::toggle(tree, id));
        if changed {
            view.relayout(&self.config);
        }
        changed
    }

    pub fn select_node(&mut self, id: NodeId, is_leaf: bool) {
        let mut targets: Vec<&mut dyn HighlightTarget> = self
            .views
            .values_mut()
            .map(|view| view as &mut dyn HighlightTarget)
            .collect();
        self.coordinator
            .select_node(id, is_leaf, &mut targets, self.scatter.as_mut());
    }

    /// Node click where the caller does not know whether `id` is a leaf.
    pub fn click_node(&mut self, id: NodeId) {
        let is_leaf = self
            .views
            .values()
            .find_map(|view| view.tree.as_ref())
            .map_or(false, |tree| tree.is_leaf(id));
        self.select_node(id, is_leaf);
    }

    pub fn select_point(&mut self, index: usize) {
        let mut targets: Vec<&mut dyn HighlightTarget> = self
            .views
            .values_mut()
            .map(|view| view as &mut dyn HighlightTarget)
            .collect();
        self.coordinator
            .select_point(index, &mut targets, self.scatter.as_mut());
    }

    pub fn clear_selection(&mut self) {
        let mut targets: Vec<&mut dyn HighlightTarget> = self
            .views
            .values_mut()
            .map(|view| view as &mut dyn HighlightTarget)
            .collect();
        self.coordinator.clear(&mut targets, self.scatter.as_mut());
    }

    /// Drop every view and all per-explanation state (dataset or classifier
    /// change). Only call between events.
    pub fn reset(&mut self) {
        self.views.clear();
        self.coordinator = HighlightCoordinator::new();
        self.scatter = None;
        self.feature_mapping = None;
        self.unique_classes.clear();
    }

    pub fn selection(&self) -> Selection {
        self.coordinator.selection()
    }

    pub fn last_clicked_point(&self) -> Option<usize> {
        self.coordinator.last_clicked_point()
    }

    pub fn scatter(&self) -> Option<&ScatterPlot> {
        self.scatter.as_ref()
    }

    pub fn feature_mapping(&self) -> Option<&FeatureMappingInfo> {
        self.feature_mapping.as_ref()
    }

    pub fn unique_classes(&self) -> &[String] {
        &self.unique_classes
    }

    /// Decision rules of the traced instance path, decoded when a feature
    /// mapping is available.
    pub fn describe_path(&self, kind: TreeKind) -> Vec<String> {
        let Some(view) = self.views.get(&kind) else {
            return Vec::new();
        };
        let Some(tree) = view.tree.as_ref() else {
            return Vec::new();
        };
        let mapping = self.feature_mapping.clone().unwrap_or_default();
        mapping.describe_path(tree, &view.path, self.rule)
    }
}
