use std::collections::{HashMap, HashSet};

use log::debug;

use super::layout::TreeKind;
use super::painter::TreePainter;
use super::path::{trace_path, DecisionPath, SplitRule};
use super::{DecisionTree, NodeId};
use crate::scatter::ScatterPlot;

type Link = (NodeId, NodeId);

/// What the user last clicked, shared by every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    Node(NodeId),
    Point(usize),
}

/// Highlighted nodes and links of one view, plus the link widths the view
/// was last rendered with so that reset can put them back.
#[derive(Debug, Clone, Default)]
pub struct ViewHighlight {
    nodes: HashSet<NodeId>,
    links: HashSet<Link>,
    original_widths: HashMap<Link, f32>,
    link_widths: HashMap<Link, f32>,
}

impl ViewHighlight {
    /// Remember the widths a fresh render produced. Links that are still
    /// highlighted keep their highlighted width.
    pub fn cache_original_widths(&mut self, widths: HashMap<Link, f32>, painter: &TreePainter) {
        self.link_widths = widths
            .iter()
            .map(|(&link, &width)| {
                let current = if self.links.contains(&link) {
                    painter.highlighted_link_width(width)
                } else {
                    width
                };
                (link, current)
            })
            .collect();
        self.original_widths = widths;
    }

    pub fn highlight_node(&mut self, id: NodeId) {
        self.nodes.insert(id);
    }

    pub fn highlight_link(&mut self, link: Link, painter: &TreePainter) {
        if self.links.insert(link) {
            if let Some(&original) = self.original_widths.get(&link) {
                self.link_widths
                    .insert(link, painter.highlighted_link_width(original));
            }
        }
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.link_widths = self.original_widths.clone();
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    pub fn is_node_highlighted(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn is_link_highlighted(&self, link: Link) -> bool {
        self.links.contains(&link)
    }

    pub fn highlighted_nodes(&self) -> &HashSet<NodeId> {
        &self.nodes
    }

    pub fn highlighted_links(&self) -> &HashSet<Link> {
        &self.links
    }

    pub fn link_width(&self, link: Link) -> Option<f32> {
        self.link_widths.get(&link).copied()
    }

    pub fn original_width(&self, link: Link) -> Option<f32> {
        self.original_widths.get(&link).copied()
    }
}

/// Highlight primitives a view exposes to the coordinator.
pub trait HighlightTarget {
    fn kind(&self) -> TreeKind;

    fn hierarchy(&self) -> Option<&DecisionTree>;

    fn split_rule(&self) -> SplitRule;

    fn reset_highlights(&mut self);

    fn highlight_node(&mut self, id: NodeId);

    fn highlight_link(&mut self, parent: NodeId, child: NodeId);

    fn highlight_trace(&mut self, path: &DecisionPath) {
        for &id in &path.nodes {
            self.highlight_node(id);
        }
        for (parent, child) in path.links() {
            self.highlight_link(parent, child);
        }
    }

    fn highlight_path_to_root(&mut self, id: NodeId) {
        let nodes = self
            .hierarchy()
            .map(|tree| tree.path_to_root(id))
            .unwrap_or_default();
        self.highlight_trace(&DecisionPath { nodes, stop: None });
    }

    fn highlight_subtree(&mut self, id: NodeId) {
        let (nodes, links) = match self.hierarchy() {
            Some(tree) => {
                let nodes = tree.descendants(id);
                let links: Vec<Link> = nodes
                    .iter()
                    .flat_map(|&parent| tree.children(parent).iter().map(move |&child| (parent, child)))
                    .collect();
                (nodes, links)
            }
            None => (Vec::new(), Vec::new()),
        };
        for id in nodes {
            self.highlight_node(id);
        }
        for (parent, child) in links {
            self.highlight_link(parent, child);
        }
    }
}

/// Owns the current selection so that every tree view and the scatter plot
/// agree on what is highlighted.
#[derive(Debug, Clone, Default)]
pub struct HighlightCoordinator {
    selection: Selection,
    last_clicked_point: Option<usize>,
}

impl HighlightCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn last_clicked_point(&self) -> Option<usize> {
        self.last_clicked_point
    }

    /// Node click. Clicking the selected node again clears everything.
    pub fn select_node(
        &mut self,
        id: NodeId,
        is_leaf: bool,
        views: &mut [&mut dyn HighlightTarget],
        mut scatter: Option<&mut ScatterPlot>,
    ) {
        if self.selection == Selection::Node(id) {
            debug!("node {} clicked again; clearing selection", id);
            self.clear(views, scatter);
            return;
        }

        self.reset_all(views, scatter.as_deref_mut());
        self.selection = Selection::Node(id);
        self.last_clicked_point = None;

        for view in views.iter_mut() {
            if !view.hierarchy().map_or(false, |tree| tree.contains(id)) {
                debug!("node {} is not in the {} view", id, view.kind());
                continue;
            }
            view.highlight_path_to_root(id);
            if !is_leaf {
                view.highlight_subtree(id);
            }
        }

        let Some(scatter) = scatter else {
            return;
        };
        let points = views.iter().find_map(|view| {
            let tree = view.hierarchy()?;
            let leaves = if is_leaf { vec![id] } else { tree.leaves_under(id) };
            Some(scatter.points_reaching(tree, &leaves, view.split_rule()))
        });
        if let Some(points) = points {
            debug!("node {} covers {} scatter point(s)", id, points.len());
            scatter.highlight_points(points);
        }
    }

    /// Scatter point click: highlight the point and its decision path in
    /// every view. Clicking the same point again, or a point that does not
    /// exist, clears everything.
    pub fn select_point(
        &mut self,
        index: usize,
        views: &mut [&mut dyn HighlightTarget],
        mut scatter: Option<&mut ScatterPlot>,
    ) {
        if self.selection == Selection::Point(index) {
            self.clear(views, scatter);
            return;
        }

        let features = scatter
            .as_deref()
            .and_then(|plot| plot.point(index))
            .map(|point| point.features.clone());
        let Some(features) = features else {
            debug!("no scatter point {}; clearing selection", index);
            self.clear(views, scatter);
            return;
        };

        self.reset_all(views, scatter.as_deref_mut());
        let Some(scatter) = scatter else {
            return;
        };
        self.selection = Selection::Point(index);
        self.last_clicked_point = Some(index);
        scatter.highlight_points([index]);
        for view in views.iter_mut() {
            let path = match view.hierarchy() {
                Some(tree) => trace_path(tree, &features, view.split_rule()),
                None => continue,
            };
            view.highlight_trace(&path);
        }
    }

    /// Back to idle with nothing highlighted anywhere.
    pub fn clear(&mut self, views: &mut [&mut dyn HighlightTarget], scatter: Option<&mut ScatterPlot>) {
        self.reset_all(views, scatter);
        self.selection = Selection::Idle;
        self.last_clicked_point = None;
    }

    fn reset_all(&mut self, views: &mut [&mut dyn HighlightTarget], scatter: Option<&mut ScatterPlot>) {
        for view in views.iter_mut() {
            view.reset_highlights();
        }
        if let Some(scatter) = scatter {
            scatter.reset_highlights();
        }
    }
}
