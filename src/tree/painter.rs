use std::collections::HashMap;
use std::fmt;

use super::layout::TreeLayout;
use super::{DecisionTree, HierarchyNode, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Rgb,
}

impl Stroke {
    pub const fn new(width: f32, color: Rgb) -> Self {
        Self { width, color }
    }
}

// Categorical palette for class labels, cycled when there are more classes.
const CLASS_PALETTE: [Rgb; 8] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
    Rgb(127, 127, 127),
];

/// Style math shared by every renderer: colours, node size and the
/// sample-proportional link widths that highlight reset restores.
#[derive(Debug, Clone)]
pub struct TreePainter {
    pub link_stroke: Stroke,
    pub link_highlight_stroke: Stroke,
    pub node_stroke: Stroke,
    pub node_highlight_stroke: Stroke,
    pub min_link_width: f32,
    pub max_link_width: f32,
    pub internal_node_color: Rgb,
    pub path_node_color: Rgb,
    pub collapsed_node_color: Rgb,
    pub label_color: Rgb,
    pub background_color: Rgb,
    pub scatter_point_radius: f32,
    pub scatter_highlight_color: Rgb,
    pub show_labels: bool,
    pub label_font_size: f32,
    class_colors: HashMap<String, Rgb>,
}

impl Default for TreePainter {
    fn default() -> Self {
        Self {
            link_stroke: Stroke::new(1.0, Rgb(170, 170, 170)),
            link_highlight_stroke: Stroke::new(3.0, Rgb(255, 140, 0)),
            node_stroke: Stroke::new(1.5, Rgb(80, 80, 80)),
            node_highlight_stroke: Stroke::new(3.5, Rgb(255, 140, 0)),
            min_link_width: 1.0,
            max_link_width: 14.0,
            internal_node_color: Rgb(220, 220, 220),
            path_node_color: Rgb(255, 215, 120),
            collapsed_node_color: Rgb(120, 120, 120),
            label_color: Rgb(40, 40, 40),
            background_color: Rgb::WHITE,
            scatter_point_radius: 4.0,
            scatter_highlight_color: Rgb(255, 140, 0),
            show_labels: true,
            label_font_size: 11.0,
            class_colors: HashMap::new(),
        }
    }
}

impl TreePainter {
    /// Assign palette colours to class labels in the given order.
    pub fn set_class_palette(&mut self, classes: &[String]) {
        self.class_colors = classes
            .iter()
            .enumerate()
            .map(|(i, class)| (class.clone(), CLASS_PALETTE[i % CLASS_PALETTE.len()]))
            .collect();
    }

    pub fn class_color(&self, label: &str) -> Rgb {
        self.class_colors
            .get(label)
            .copied()
            .unwrap_or(CLASS_PALETTE[CLASS_PALETTE.len() - 1])
    }

    pub fn node_fill(&self, node: &HierarchyNode) -> Rgb {
        if node.has_hidden_children {
            self.collapsed_node_color
        } else if node.is_leaf() {
            node.class_label()
                .map_or(self.internal_node_color, |label| self.class_color(label))
        } else if node.is_in_path {
            self.path_node_color
        } else {
            self.internal_node_color
        }
    }

    /// Width of the link into `child`, proportional to the share of root
    /// samples reaching it and scaled by the layout's density.
    pub fn link_width(&self, tree: &DecisionTree, child: NodeId, stroke_scale: f32) -> f32 {
        let total = tree.root().n_samples();
        let ratio = match tree.node(child) {
            Some(node) if total > 0 => (node.n_samples() as f32 / total as f32).clamp(0.0, 1.0),
            _ => 0.0,
        };
        (self.min_link_width + ratio * (self.max_link_width - self.min_link_width)) * stroke_scale
    }

    /// Original widths for every link of `layout`.
    pub fn link_widths(&self, tree: &DecisionTree, layout: &TreeLayout) -> HashMap<(NodeId, NodeId), f32> {
        layout
            .links
            .iter()
            .map(|&(parent, child)| ((parent, child), self.link_width(tree, child, layout.stroke_scale)))
            .collect()
    }

    pub fn highlighted_link_width(&self, original: f32) -> f32 {
        original + self.link_highlight_stroke.width
    }

    pub fn node_stroke(&self, highlighted: bool) -> Stroke {
        if highlighted {
            self.node_highlight_stroke
        } else {
            self.node_stroke
        }
    }

    pub fn link_color(&self, highlighted: bool) -> Rgb {
        if highlighted {
            self.link_highlight_stroke.color
        } else {
            self.link_stroke.color
        }
    }

    /// Short text drawn next to a node.
    pub fn node_label(&self, node: &HierarchyNode) -> String {
        match (node.feature_name(), node.threshold()) {
            _ if node.is_leaf() => node.class_label().unwrap_or("?").to_string(),
            (Some(feature), Some(threshold)) => format!("{feature} ≤ {threshold:.2}"),
            _ => format!("#{}", node.id),
        }
    }
}
