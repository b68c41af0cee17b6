use std::collections::{BTreeSet, HashSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::path::{trace_path, SplitRule};
use crate::tree::{DecisionTree, Instance, NodeId};

/// Scatter payload as produced by the explanation backend: 2-D projected
/// coordinates alongside the encoded feature rows they came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterPlotData {
    #[serde(default)]
    pub transformed_data: Vec<[f64; 2]>,
    #[serde(default)]
    pub original_data: Vec<Instance>,
    #[serde(default, deserialize_with = "crate::io::label_list")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub original_points_neigh_points_bool_array: Vec<bool>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub x_axis_label: Option<String>,
    #[serde(default)]
    pub y_axis_label: Option<String>,
    #[serde(default)]
    pub decision_boundary: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub features: Instance,
    pub target: Option<String>,
    /// Drawn from the dataset rather than generated for the neighbourhood.
    pub is_original: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScatterPlot {
    points: Vec<ScatterPoint>,
    method: Option<String>,
    axis_labels: (Option<String>, Option<String>),
    decision_boundary: Option<Value>,
    highlighted: HashSet<usize>,
}

impl ScatterPlot {
    pub fn from_data(data: ScatterPlotData) -> Self {
        if data.transformed_data.len() != data.original_data.len() {
            warn!(
                "scatter payload has {} projected and {} original row(s); using the shorter",
                data.transformed_data.len(),
                data.original_data.len()
            );
        }

        let points = data
            .transformed_data
            .iter()
            .zip(data.original_data)
            .enumerate()
            .map(|(index, (&[x, y], features))| ScatterPoint {
                index,
                x,
                y,
                features,
                target: data.targets.get(index).cloned(),
                is_original: data
                    .original_points_neigh_points_bool_array
                    .get(index)
                    .copied()
                    .unwrap_or(false),
            })
            .collect();

        Self {
            points,
            method: data.method,
            axis_labels: (data.x_axis_label, data.y_axis_label),
            decision_boundary: data.decision_boundary,
            highlighted: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[ScatterPoint] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Option<&ScatterPoint> {
        self.points.get(index)
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn axis_labels(&self) -> (Option<&str>, Option<&str>) {
        (self.axis_labels.0.as_deref(), self.axis_labels.1.as_deref())
    }

    pub fn decision_boundary(&self) -> Option<&Value> {
        self.decision_boundary.as_ref()
    }

    /// Indices of the points whose traced path ends in one of `leaves`.
    pub fn points_reaching(&self, tree: &DecisionTree, leaves: &[NodeId], rule: SplitRule) -> BTreeSet<usize> {
        let leaves: HashSet<NodeId> = leaves.iter().copied().collect();
        let reaching: BTreeSet<usize> = self
            .points
            .iter()
            .filter(|point| {
                trace_path(tree, &point.features, rule)
                    .leaf()
                    .map_or(false, |leaf| leaves.contains(&leaf))
            })
            .map(|point| point.index)
            .collect();
        debug!("{} of {} scatter point(s) reach the selected leaves", reaching.len(), self.points.len());
        reaching
    }

    pub fn highlight_points<I>(&mut self, indices: I)
    where
        I: IntoIterator<Item = usize>,
    {
        let count = self.points.len();
        self.highlighted
            .extend(indices.into_iter().filter(|&index| index < count));
    }

    pub fn reset_highlights(&mut self) {
        self.highlighted.clear();
    }

    pub fn highlighted(&self) -> &HashSet<usize> {
        &self.highlighted
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.highlighted.contains(&index)
    }

    /// Coordinate ranges `((min_x, max_x), (min_y, max_y))`, if any points.
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let first = self.points.first()?;
        let init = ((first.x, first.x), (first.y, first.y));
        Some(self.points.iter().fold(init, |((min_x, max_x), (min_y, max_y)), point| {
            (
                (min_x.min(point.x), max_x.max(point.x)),
                (min_y.min(point.y), max_y.max(point.y)),
            )
        }))
    }
}
