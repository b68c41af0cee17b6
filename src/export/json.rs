use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde_json::{json, Value};

use crate::features::FeatureMappingInfo;
use crate::tree::highlight::Selection;
use crate::tree::viewer::{TreeViewManager, ViewState};

/// Layout and highlight state of one view, in the shape a web renderer
/// would consume.
pub fn layout_document(view: &ViewState) -> Value {
    let (Some(tree), Some(layout)) = (view.tree.as_ref(), view.layout.as_ref()) else {
        return json!({ "kind": view.kind, "nodes": [], "links": [] });
    };

    let nodes: Vec<Value> = layout
        .positions
        .iter()
        .filter_map(|(&id, &(x, y))| {
            let node = tree.node(id)?;
            Some(json!({
                "id": id,
                "x": x,
                "y": y,
                "depth": node.depth,
                "isLeaf": node.is_leaf(),
                "featureName": node.feature_name(),
                "threshold": node.threshold(),
                "classLabel": node.class_label(),
                "nSamples": node.n_samples(),
                "isInPath": node.is_in_path,
                "hasHiddenChildren": node.has_hidden_children,
                "isExpanded": node.is_expanded,
                "fill": view.painter.node_fill(node).hex(),
                "highlighted": view.highlight.is_node_highlighted(id),
            }))
        })
        .collect();

    let links: Vec<Value> = layout
        .links
        .iter()
        .map(|&(source, target)| {
            json!({
                "source": source,
                "target": target,
                "width": view.highlight.link_width((source, target)),
                "originalWidth": view.highlight.original_width((source, target)),
                "highlighted": view.highlight.is_link_highlighted((source, target)),
            })
        })
        .collect();

    json!({
        "kind": view.kind,
        "width": layout.width,
        "height": layout.height,
        "nodeRadius": layout.node_radius,
        "strokeScale": layout.stroke_scale,
        "path": view.path.nodes,
        "pathComplete": view.path.is_complete(),
        "pathStop": view.path.stop.as_ref().map(ToString::to_string),
        "nodes": nodes,
        "links": links,
    })
}

fn selection_value(selection: Selection) -> Value {
    match selection {
        Selection::Idle => json!({ "type": "idle" }),
        Selection::Node(id) => json!({ "type": "node", "id": id }),
        Selection::Point(index) => json!({ "type": "point", "index": index }),
    }
}

/// Every active view plus the shared selection and scatter highlight.
pub fn manager_document(manager: &TreeViewManager) -> Value {
    let views: Vec<Value> = manager.views().map(layout_document).collect();
    let rules: serde_json::Map<String, Value> = manager
        .active_kinds()
        .into_iter()
        .map(|kind| (kind.name().to_string(), json!(manager.describe_path(kind))))
        .collect();

    let scatter = manager.scatter().map(|plot| {
        let mut highlighted: Vec<usize> = plot.highlighted().iter().copied().collect();
        highlighted.sort_unstable();
        json!({
            "method": plot.method(),
            "axisLabels": plot.axis_labels(),
            "decisionBoundary": plot.decision_boundary(),
            "points": plot.len(),
            "highlighted": highlighted,
        })
    });

    let decoded_instance = manager
        .views()
        .next()
        .map(|view| {
            manager
                .feature_mapping()
                .cloned()
                .unwrap_or_else(FeatureMappingInfo::default)
                .decode_instance(&view.instance)
                .into_iter()
                .map(|(feature, value)| (feature, json!(value.to_string())))
                .collect::<serde_json::Map<String, Value>>()
        })
        .unwrap_or_default();

    json!({
        "selection": selection_value(manager.selection()),
        "lastClickedPoint": manager.last_clicked_point(),
        "classes": manager.unique_classes(),
        "instance": decoded_instance,
        "pathRules": rules,
        "scatter": scatter,
        "views": views,
    })
}

pub fn export_json(manager: &TreeViewManager, path: &Path) -> Result<()> {
    let document = manager_document(manager);
    let rendered = serde_json::to_string_pretty(&document).context("failed to serialise layout")?;
    fs::write(path, rendered)
        .with_context(|| format!("failed to write layout JSON to {}", path.display()))?;
    info!("exported {} view(s) to {}", manager.active_kinds().len(), path.display());
    Ok(())
}
