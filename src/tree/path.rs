use std::fmt;

use log::{error, warn};
use serde::Serialize;

use super::{DecisionTree, HierarchyNode, Instance, NodeId};

/// How an instance value is compared against a split threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitRule {
    /// `value <= threshold` descends left (scikit-learn semantics).
    #[default]
    LessOrEqual,
    /// `value < threshold` descends left.
    LessThan,
}

impl SplitRule {
    pub fn goes_left(self, value: f64, threshold: f64) -> bool {
        match self {
            SplitRule::LessOrEqual => value <= threshold,
            SplitRule::LessThan => value < threshold,
        }
    }

    pub fn left_operator(self) -> &'static str {
        match self {
            SplitRule::LessOrEqual => "<=",
            SplitRule::LessThan => "<",
        }
    }

    pub fn right_operator(self) -> &'static str {
        match self {
            SplitRule::LessOrEqual => ">",
            SplitRule::LessThan => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Left,
    Right,
}

impl Branch {
    /// Which side of `parent` the node `child` hangs on.
    pub fn between(parent: &HierarchyNode, child: NodeId) -> Option<Branch> {
        if parent.record.left_child == Some(child) {
            Some(Branch::Left)
        } else if parent.record.right_child == Some(child) {
            Some(Branch::Right)
        } else {
            None
        }
    }
}

/// Why inference replay stopped before reaching a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceStop {
    NoRoot,
    MissingFeature { node: NodeId, feature: String },
    MalformedSplit { node: NodeId },
    MissingChild { node: NodeId, child: NodeId },
}

impl fmt::Display for TraceStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStop::NoRoot => write!(f, "no tree to trace"),
            TraceStop::MissingFeature { node, feature } => {
                write!(f, "instance has no value for '{feature}' (node {node})")
            }
            TraceStop::MalformedSplit { node } => {
                write!(f, "node {node} has no usable split")
            }
            TraceStop::MissingChild { node, child } => {
                write!(f, "child {child} of node {node} is not in the hierarchy")
            }
        }
    }
}

/// Node ids visited from the root towards a leaf.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecisionPath {
    pub nodes: Vec<NodeId>,
    pub stop: Option<TraceStop>,
}

impl DecisionPath {
    pub fn unresolved() -> Self {
        Self {
            nodes: Vec::new(),
            stop: Some(TraceStop::NoRoot),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stop.is_none() && !self.nodes.is_empty()
    }

    /// The leaf reached, only for complete paths.
    pub fn leaf(&self) -> Option<NodeId> {
        if self.is_complete() {
            self.nodes.last().copied()
        } else {
            None
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Consecutive `(parent, child)` pairs along the path.
    pub fn links(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }
}

/// Replay the tree's inference for `instance`, starting at the root.
///
/// Missing feature values end the trace early (logged as a warning); a split
/// pointing at a child absent from the hierarchy ends it as malformed data.
pub fn trace_path(tree: &DecisionTree, instance: &Instance, rule: SplitRule) -> DecisionPath {
    let mut nodes = Vec::new();
    let mut current = tree.root();

    loop {
        nodes.push(current.id);
        if current.is_leaf() {
            return DecisionPath { nodes, stop: None };
        }

        let (Some(feature), Some(threshold)) = (current.feature_name(), current.threshold()) else {
            error!("node {} is internal but has no feature/threshold", current.id);
            return DecisionPath {
                nodes,
                stop: Some(TraceStop::MalformedSplit { node: current.id }),
            };
        };

        let Some(&value) = instance.get(feature) else {
            warn!(
                "instance has no value for feature '{}' at node {}; path is incomplete",
                feature, current.id
            );
            return DecisionPath {
                nodes,
                stop: Some(TraceStop::MissingFeature {
                    node: current.id,
                    feature: feature.to_string(),
                }),
            };
        };

        // One-hot columns are already 0/1, so categorical splits compare the same way.
        let expected = if rule.goes_left(value, threshold) {
            current.record.left_child
        } else {
            current.record.right_child
        };
        let Some(expected) = expected else {
            error!("node {} is missing the child for value {}", current.id, value);
            return DecisionPath {
                nodes,
                stop: Some(TraceStop::MalformedSplit { node: current.id }),
            };
        };

        match tree
            .node(expected)
            .filter(|child| child.parent == Some(current.id))
        {
            Some(next) => current = next,
            None => {
                error!(
                    "child {} of node {} is not in the hierarchy",
                    expected, current.id
                );
                return DecisionPath {
                    nodes,
                    stop: Some(TraceStop::MissingChild {
                        node: current.id,
                        child: expected,
                    }),
                };
            }
        }
    }
}

/// Leaf reached by `instance`, if tracing completes.
pub fn resolve_leaf(tree: &DecisionTree, instance: &Instance, rule: SplitRule) -> Option<NodeId> {
    trace_path(tree, instance, rule).leaf()
}
