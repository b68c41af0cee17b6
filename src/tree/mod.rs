use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use log::{debug, error};
use serde::{Deserialize, Deserializer, Serialize};

pub mod highlight;
pub mod layout;
pub mod painter;
pub mod path;
pub mod strategy;
pub mod viewer;
pub mod visibility;

pub type NodeId = usize;

/// Encoded feature name to numeric value. One-hot encoded categorical
/// features arrive as one 0/1 column per category.
pub type Instance = HashMap<String, f64>;

/// Every decision tree is rooted at node id `0`.
pub const ROOT_ID: NodeId = 0;

/// Flat serialized decision-tree node as produced by the explanation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    #[serde(default)]
    pub feature_name: Option<String>,
    #[serde(default, deserialize_with = "optional_index")]
    pub feature_index: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default, deserialize_with = "optional_index")]
    pub left_child: Option<NodeId>,
    #[serde(default, deserialize_with = "optional_index")]
    pub right_child: Option<NodeId>,
    #[serde(default)]
    pub is_leaf: bool,
    #[serde(default, deserialize_with = "crate::io::optional_label")]
    pub class_label: Option<String>,
    #[serde(default)]
    pub impurity: f64,
    #[serde(default)]
    pub n_samples: usize,
    #[serde(default)]
    pub weighted_n_samples: f64,
    #[serde(default)]
    pub value: NodeValue,
}

impl NodeRecord {
    pub fn internal(
        node_id: NodeId,
        feature_name: &str,
        threshold: f64,
        left_child: NodeId,
        right_child: NodeId,
    ) -> Self {
        Self {
            node_id,
            feature_name: Some(feature_name.to_string()),
            feature_index: None,
            threshold: Some(threshold),
            left_child: Some(left_child),
            right_child: Some(right_child),
            is_leaf: false,
            class_label: None,
            impurity: 0.0,
            n_samples: 0,
            weighted_n_samples: 0.0,
            value: NodeValue::default(),
        }
    }

    pub fn leaf(node_id: NodeId, class_label: &str) -> Self {
        Self {
            node_id,
            feature_name: None,
            feature_index: None,
            threshold: None,
            left_child: None,
            right_child: None,
            is_leaf: true,
            class_label: Some(class_label.to_string()),
            impurity: 0.0,
            n_samples: 0,
            weighted_n_samples: 0.0,
            value: NodeValue::default(),
        }
    }

    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self.weighted_n_samples = n_samples as f64;
        self
    }

    fn child_ids(&self) -> impl Iterator<Item = NodeId> {
        [self.left_child, self.right_child].into_iter().flatten()
    }
}

/// Class distribution of a node. scikit-learn emits one row per output,
/// older payloads a flat list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    PerOutput(Vec<Vec<f64>>),
    Flat(Vec<f64>),
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue::Flat(Vec::new())
    }
}

impl NodeValue {
    pub fn class_counts(&self) -> &[f64] {
        match self {
            NodeValue::PerOutput(rows) => rows.first().map(Vec::as_slice).unwrap_or(&[]),
            NodeValue::Flat(values) => values,
        }
    }
}

// Negative ids are the scikit-learn "no child" sentinel.
fn optional_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| usize::try_from(value).ok()))
}

/// Node of the in-memory hierarchy, plus the transient per-view fields the
/// layout engines and the spawn view write into.
#[derive(Debug, Clone)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub record: NodeRecord,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub is_in_path: bool,
    pub is_hidden: bool,
    pub has_hidden_children: bool,
    pub is_expanded: bool,
}

impl HierarchyNode {
    fn new(record: NodeRecord, parent: Option<NodeId>, children: Vec<NodeId>, depth: usize) -> Self {
        Self {
            id: record.node_id,
            record,
            parent,
            children,
            depth,
            x: 0.0,
            y: 0.0,
            is_in_path: false,
            is_hidden: false,
            has_hidden_children: false,
            is_expanded: false,
        }
    }

    /// Leaf according to the backend record (what inference replay relies on).
    pub fn is_leaf(&self) -> bool {
        self.record.is_leaf
    }

    /// No children in the built hierarchy (what the layouts draw as a tip).
    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_visible(&self) -> bool {
        !self.is_hidden
    }

    pub fn feature_name(&self) -> Option<&str> {
        self.record.feature_name.as_deref()
    }

    pub fn threshold(&self) -> Option<f64> {
        self.record.threshold
    }

    pub fn class_label(&self) -> Option<&str> {
        self.record.class_label.as_deref()
    }

    pub fn n_samples(&self) -> usize {
        self.record.n_samples
    }
}

/// Arena-backed decision tree: nodes live in a flat vector and refer to each
/// other by node id.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<HierarchyNode>,
    slots: HashMap<NodeId, usize>,
}

/// Build the hierarchy from flat node records.
///
/// Returns `None` (and logs) when no record carries the root id. Dangling or
/// duplicate child references are logged and skipped; nodes that end up
/// unreachable from the root are dropped.
pub fn build_hierarchy(records: &[NodeRecord]) -> Option<DecisionTree> {
    // Pass 1: index records by id
    let mut index: HashMap<NodeId, &NodeRecord> = HashMap::with_capacity(records.len());
    for record in records {
        match index.entry(record.node_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => {
                error!(
                    "duplicate node id {} in tree data; keeping the first record",
                    record.node_id
                );
            }
        }
    }

    if !index.contains_key(&ROOT_ID) {
        error!(
            "tree data has no root node (node_id {}); {} record(s) ignored",
            ROOT_ID,
            records.len()
        );
        return None;
    }

    // Pass 2: link every child to its parent via left_child/right_child
    let mut parents: HashMap<NodeId, NodeId> = HashMap::with_capacity(records.len());
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::with_capacity(records.len());
    for record in records {
        let is_indexed = index
            .get(&record.node_id)
            .map_or(false, |indexed| std::ptr::eq(*indexed, record));
        if !is_indexed {
            continue;
        }
        if record.is_leaf {
            if record.child_ids().next().is_some() {
                debug!("leaf node {} lists children; ignoring them", record.node_id);
            }
            continue;
        }

        for child in record.child_ids() {
            if !index.contains_key(&child) {
                error!(
                    "node {} references missing child {}",
                    record.node_id, child
                );
                continue;
            }
            if child == ROOT_ID || child == record.node_id {
                error!(
                    "node {} references node {} as a child; skipping link",
                    record.node_id, child
                );
                continue;
            }
            match parents.entry(child) {
                Entry::Occupied(existing) => {
                    error!(
                        "node {} is already a child of node {}; ignoring link from node {}",
                        child,
                        existing.get(),
                        record.node_id
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.node_id);
                    children.entry(record.node_id).or_default().push(child);
                }
            }
        }
    }

    // Breadth-first from the root so that depth is known when a node is created
    let mut tree = DecisionTree {
        nodes: Vec::with_capacity(index.len()),
        slots: HashMap::with_capacity(index.len()),
    };
    let mut queue = VecDeque::from([(ROOT_ID, None, 0usize)]);
    while let Some((node_id, parent, depth)) = queue.pop_front() {
        let kids = children.remove(&node_id).unwrap_or_default();
        for &child in &kids {
            queue.push_back((child, Some(node_id), depth + 1));
        }
        tree.slots.insert(node_id, tree.nodes.len());
        tree.nodes.push(HierarchyNode::new(
            index[&node_id].clone(),
            parent,
            kids,
            depth,
        ));
    }

    if tree.nodes.len() < index.len() {
        error!(
            "{} node(s) are not reachable from the root and were dropped",
            index.len() - tree.nodes.len()
        );
    }

    Some(tree)
}

impl DecisionTree {
    pub fn root(&self) -> &HierarchyNode {
        // The breadth-first build always places the root in the first slot.
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.slots.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut HierarchyNode> {
        match self.slots.get(&id) {
            Some(&slot) => self.nodes.get_mut(slot),
            None => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut HierarchyNode> {
        self.nodes.iter_mut()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).map_or(false, HierarchyNode::is_leaf)
    }

    /// Ancestors of `id`, nearest first. Empty for the root or unknown ids.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut lineage = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            lineage.push(parent);
            current = self.parent(parent);
        }
        lineage
    }

    /// Node ids from the root down to `id`, inclusive.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut path = self.ancestors(id);
        path.reverse();
        path.push(id);
        path
    }

    /// `id` and all of its descendants in pre-order, left child first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut stack = vec![id];
        let mut nodes = Vec::new();
        while let Some(current) = stack.pop() {
            nodes.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        nodes
    }

    pub fn leaves_under(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node_id| self.children(node_id).is_empty())
            .collect()
    }

    pub fn subtree_size(&self, id: NodeId) -> usize {
        self.descendants(id).len()
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    /// Every root-to-tip path, enumerated depth-first with the left branch first.
    pub fn all_paths(&self) -> Vec<Vec<NodeId>> {
        fn walk(tree: &DecisionTree, node_id: NodeId, current: &mut Vec<NodeId>, paths: &mut Vec<Vec<NodeId>>) {
            current.push(node_id);
            let children = tree.children(node_id);
            if children.is_empty() {
                paths.push(current.clone());
            } else {
                for &child in children {
                    walk(tree, child, current, paths);
                }
            }
            current.pop();
        }

        let mut paths = Vec::new();
        walk(self, ROOT_ID, &mut Vec::new(), &mut paths);
        paths
    }

    /// All `(parent, child)` pairs in pre-order.
    pub fn links(&self) -> Vec<(NodeId, NodeId)> {
        self.descendants(ROOT_ID)
            .into_iter()
            .flat_map(|parent| self.children(parent).iter().map(move |&child| (parent, child)))
            .collect()
    }

    /// Links whose endpoints are both currently visible. Derived from the
    /// parent/child structure on every call.
    pub fn visible_links(&self) -> Vec<(NodeId, NodeId)> {
        self.links()
            .into_iter()
            .filter(|&(parent, child)| {
                let visible = |id| self.node(id).map_or(false, HierarchyNode::is_visible);
                visible(parent) && visible(child)
            })
            .collect()
    }

    /// Clear spawn-view flags: everything visible, nothing on the path.
    pub fn reset_view_flags(&mut self) {
        for node in &mut self.nodes {
            node.is_in_path = false;
            node.is_hidden = false;
            node.has_hidden_children = false;
            node.is_expanded = !node.children.is_empty();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{example_records, sample_records};
    use super::*;

    #[test]
    fn builds_every_record_into_the_hierarchy() {
        let records = sample_records();
        let tree = build_hierarchy(&records).expect("valid records");

        assert_eq!(tree.len(), records.len());
        assert_eq!(tree.subtree_size(ROOT_ID), records.len());
        assert_eq!(tree.root().id, ROOT_ID);

        for record in &records {
            let node = tree.node(record.node_id).unwrap();
            let expected: Vec<NodeId> = record.child_ids().collect();
            assert_eq!(node.children, expected, "children of {}", record.node_id);
            for &child in &node.children {
                assert_eq!(tree.parent(child), Some(record.node_id));
            }
        }
    }

    #[test]
    fn records_depth_from_root() {
        let tree = build_hierarchy(&sample_records()).unwrap();
        assert_eq!(tree.node(0).unwrap().depth, 0);
        assert_eq!(tree.node(4).unwrap().depth, 2);
        assert_eq!(tree.node(12).unwrap().depth, 5);
        assert_eq!(tree.max_depth(), 5);
    }

    #[test]
    fn missing_root_yields_none() {
        let records = vec![NodeRecord::leaf(1, "A"), NodeRecord::leaf(2, "B")];
        assert!(build_hierarchy(&records).is_none());
        assert!(build_hierarchy(&[]).is_none());
    }

    #[test]
    fn dangling_child_is_skipped() {
        let records = vec![
            NodeRecord::internal(0, "x", 5.0, 1, 9),
            NodeRecord::leaf(1, "A"),
        ];
        let tree = build_hierarchy(&records).unwrap();
        assert_eq!(tree.children(0), &[1]);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn second_parent_link_is_ignored() {
        let records = vec![
            NodeRecord::internal(0, "x", 5.0, 1, 2),
            NodeRecord::internal(1, "y", 1.0, 3, 2),
            NodeRecord::leaf(2, "B"),
            NodeRecord::leaf(3, "A"),
        ];
        let tree = build_hierarchy(&records).unwrap();
        assert_eq!(tree.parent(2), Some(0));
        assert_eq!(tree.children(1), &[3]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn unreachable_nodes_are_dropped() {
        let mut records = example_records();
        records.push(NodeRecord::leaf(7, "orphan"));
        let tree = build_hierarchy(&records).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(!tree.contains(7));
    }

    #[test]
    fn traversal_helpers_follow_the_structure() {
        let tree = build_hierarchy(&sample_records()).unwrap();

        assert_eq!(tree.path_to_root(8), vec![0, 1, 4, 8]);
        assert_eq!(tree.ancestors(8), vec![4, 1, 0]);
        assert_eq!(tree.descendants(6), vec![6, 9, 11, 12, 10]);
        assert_eq!(tree.leaves_under(2), vec![5, 11, 12, 10]);
        assert!(tree.path_to_root(42).is_empty());
        assert!(tree.descendants(42).is_empty());

        let paths = tree.all_paths();
        assert_eq!(paths.len(), 7);
        assert_eq!(paths[0], vec![0, 1, 3]);
        assert_eq!(paths[6], vec![0, 2, 6, 10]);

        assert_eq!(tree.links().len(), tree.len() - 1);
    }

    #[test]
    fn visible_links_track_hidden_flags() {
        let mut tree = build_hierarchy(&sample_records()).unwrap();
        assert_eq!(tree.visible_links().len(), 12);

        tree.node_mut(9).unwrap().is_hidden = true;
        let links = tree.visible_links();
        assert!(!links.contains(&(6, 9)));
        assert!(links.contains(&(6, 10)));
        assert_eq!(tree.subtree_size(2), 7);

        tree.node_mut(9).unwrap().is_hidden = false;
        assert!(tree.visible_links().contains(&(6, 9)));
    }

    #[test]
    fn deserializes_backend_records() {
        let raw = r#"[
            {"node_id": 0, "feature_name": "age", "feature_index": 0, "threshold": 30.5,
             "left_child": 1, "right_child": 2, "is_leaf": false, "class_label": null,
             "impurity": 0.5, "n_samples": 10, "weighted_n_samples": 10.0, "value": [[6.0, 4.0]]},
            {"node_id": 1, "feature_name": null, "feature_index": null, "threshold": null,
             "left_child": -1, "right_child": -1, "is_leaf": true, "class_label": "yes",
             "impurity": 0.0, "n_samples": 6, "weighted_n_samples": 6.0, "value": [6.0, 0.0]},
            {"node_id": 2, "is_leaf": true, "class_label": 1, "n_samples": 4}
        ]"#;
        let records: Vec<NodeRecord> = serde_json::from_str(raw).unwrap();

        assert_eq!(records[0].value.class_counts(), &[6.0, 4.0]);
        assert_eq!(records[1].value.class_counts(), &[6.0, 0.0]);
        assert_eq!(records[1].left_child, None);
        assert_eq!(records[2].class_label.as_deref(), Some("1"));

        let tree = build_hierarchy(&records).unwrap();
        assert_eq!(tree.children(0), &[1, 2]);
    }
}
