use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;
use svg::node::element::{Circle, Group, Line, Rectangle, Text};
use svg::Document;

use crate::scatter::ScatterPlot;
use crate::tree::painter::TreePainter;
use crate::tree::viewer::ViewState;

const LABEL_OFFSET: f32 = 6.0;
const SCATTER_MARGIN: f64 = 30.0;

/// Build the SVG document of one laid-out tree view, including its current
/// highlight state. `None` if the view has nothing to draw.
pub fn tree_document(view: &ViewState) -> Option<Document> {
    let tree = view.tree.as_ref()?;
    let layout = view.layout.as_ref()?;
    let painter = &view.painter;

    let mut document = Document::new()
        .set("width", layout.width)
        .set("height", layout.height)
        .set("viewBox", (0, 0, layout.width.ceil() as i32, layout.height.ceil() as i32));

    let background = Rectangle::new()
        .set("width", "100%")
        .set("height", "100%")
        .set("fill", painter.background_color.hex());
    document = document.add(background);

    let mut links = Group::new().set("id", "links");
    for &(parent, child) in &layout.links {
        let (Some(from), Some(to)) = (layout.position(parent), layout.position(child)) else {
            continue;
        };
        let highlighted = view.highlight.is_link_highlighted((parent, child));
        let width = view
            .highlight
            .link_width((parent, child))
            .unwrap_or_else(|| painter.link_width(tree, child, layout.stroke_scale));

        let line = Line::new()
            .set("x1", from.0)
            .set("y1", from.1)
            .set("x2", to.0)
            .set("y2", to.1)
            .set("stroke", painter.link_color(highlighted).hex())
            .set("stroke-width", width)
            .set("stroke-linecap", "round");
        links = links.add(line);
    }
    document = document.add(links);

    let mut nodes = Group::new().set("id", "nodes");
    for (&id, &(x, y)) in &layout.positions {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let stroke = painter.node_stroke(view.highlight.is_node_highlighted(id));

        let circle = Circle::new()
            .set("cx", x)
            .set("cy", y)
            .set("r", layout.node_radius)
            .set("fill", painter.node_fill(node).hex())
            .set("stroke", stroke.color.hex())
            .set("stroke-width", stroke.width * layout.stroke_scale)
            .set("data-node-id", id.to_string());
        nodes = nodes.add(circle);

        if painter.show_labels {
            let text_content = svg::node::Text::new(painter.node_label(node));
            let text = Text::new("")
                .set("x", x + layout.node_radius + LABEL_OFFSET)
                .set("y", y)
                .set("font-size", painter.label_font_size)
                .set("fill", painter.label_color.hex())
                .set("dominant-baseline", "middle")
                .set("text-anchor", "start")
                .add(text_content);
            nodes = nodes.add(text);
        }
    }
    Some(document.add(nodes))
}

fn axis_label(content: &str, x: f64, y: f64, painter: &TreePainter) -> Text {
    Text::new("")
        .set("x", x)
        .set("y", y)
        .set("font-size", painter.label_font_size)
        .set("fill", painter.label_color.hex())
        .set("text-anchor", "middle")
        .add(svg::node::Text::new(content))
}

/// Build the scatter plot panel: projected points coloured by class, with
/// highlighted points drawn larger on top and the axis labels, if any, in
/// the margins.
pub fn scatter_document(plot: &ScatterPlot, painter: &TreePainter, width: f64, height: f64) -> Document {
    let mut document = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width.ceil() as i32, height.ceil() as i32));

    let background = Rectangle::new()
        .set("width", "100%")
        .set("height", "100%")
        .set("fill", painter.background_color.hex());
    document = document.add(background);

    let (x_label, y_label) = plot.axis_labels();
    if let Some(label) = x_label {
        document = document.add(
            axis_label(label, width / 2.0, height - SCATTER_MARGIN / 3.0, painter).set("id", "x-axis-label"),
        );
    }
    if let Some(label) = y_label {
        let (x, y) = (SCATTER_MARGIN / 2.0, height / 2.0);
        document = document.add(
            axis_label(label, x, y, painter)
                .set("id", "y-axis-label")
                .set("transform", format!("rotate(-90 {x} {y})")),
        );
    }

    let Some(((min_x, max_x), (min_y, max_y))) = plot.bounds() else {
        return document;
    };
    let span_x = (max_x - min_x).max(f64::EPSILON);
    let span_y = (max_y - min_y).max(f64::EPSILON);
    let inner_width = (width - 2.0 * SCATTER_MARGIN).max(1.0);
    let inner_height = (height - 2.0 * SCATTER_MARGIN).max(1.0);
    let to_svg = |x: f64, y: f64| {
        (
            SCATTER_MARGIN + (x - min_x) / span_x * inner_width,
            // SVG y grows downwards
            SCATTER_MARGIN + (max_y - y) / span_y * inner_height,
        )
    };

    let radius = f64::from(painter.scatter_point_radius);
    let mut points = Group::new().set("id", "points");
    let mut highlighted = Group::new().set("id", "highlighted-points");
    for point in plot.points() {
        let (cx, cy) = to_svg(point.x, point.y);
        let fill = point
            .target
            .as_deref()
            .map_or(painter.internal_node_color, |label| painter.class_color(label));
        let circle = Circle::new()
            .set("cx", cx)
            .set("cy", cy)
            .set("fill", fill.hex())
            .set("data-index", point.index.to_string());

        if plot.is_highlighted(point.index) {
            highlighted = highlighted.add(
                circle
                    .set("r", radius * 1.75)
                    .set("stroke", painter.scatter_highlight_color.hex())
                    .set("stroke-width", 2.0),
            );
        } else {
            points = points.add(circle.set("r", radius).set("fill-opacity", 0.7));
        }
    }
    document.add(points).add(highlighted)
}

pub fn export_svg(view: &ViewState, path: &Path) -> Result<()> {
    let document = tree_document(view)
        .ok_or_else(|| anyhow!("{} view has no layout to export", view.kind))?;
    svg::save(path, &document)
        .with_context(|| format!("failed to save SVG to {}", path.display()))?;
    info!("exported {} view to {}", view.kind, path.display());
    Ok(())
}

pub fn export_scatter_svg(plot: &ScatterPlot, painter: &TreePainter, path: &Path, width: f64, height: f64) -> Result<()> {
    let document = scatter_document(plot, painter, width, height);
    svg::save(path, &document)
        .with_context(|| format!("failed to save SVG to {}", path.display()))?;
    info!("exported scatter plot with {} point(s) to {}", plot.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scatter::ScatterPlotData;
    use crate::tree::fixtures::{instance, sample_records};
    use crate::tree::layout::{LayoutConfig, TreeKind};
    use crate::tree::path::SplitRule;

    fn classic_view() -> ViewState {
        let mut view = ViewState::new(TreeKind::Classic, SplitRule::default(), TreePainter::default());
        assert!(view.load(&sample_records(), instance(&[("x", 1.0), ("y", 1.0)]), &LayoutConfig::default()));
        view
    }

    #[test]
    fn tree_document_draws_every_positioned_node_and_link() {
        let view = classic_view();
        let rendered = tree_document(&view).unwrap().to_string();

        assert_eq!(rendered.matches("<circle").count(), 13);
        assert_eq!(rendered.matches("<line").count(), 12);
        assert!(rendered.contains("y ≤ 2.00"));
    }

    #[test]
    fn highlighted_links_use_highlight_colour() {
        let mut view = classic_view();
        let painter = view.painter.clone();
        view.highlight.highlight_link((0, 1), &painter);

        let rendered = tree_document(&view).unwrap().to_string();
        assert!(rendered.contains(&painter.link_highlight_stroke.color.hex()));
    }

    #[test]
    fn empty_view_is_not_exported() {
        let view = ViewState::new(TreeKind::Spawn, SplitRule::default(), TreePainter::default());
        let dir = tempfile::tempdir().unwrap();
        assert!(export_svg(&view, &dir.path().join("spawn.svg")).is_err());
    }

    #[test]
    fn writes_svg_file() {
        let view = classic_view();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("classic.svg");

        export_svg(&view, &target).unwrap();
        let written = std::fs::read_to_string(&target).unwrap();
        assert!(written.starts_with("<svg"));
    }

    #[test]
    fn scatter_document_separates_highlighted_points() {
        let data: ScatterPlotData = serde_json::from_str(
            r#"{
                "transformedData": [[0.0, 0.0], [1.0, 2.0], [2.0, 1.0]],
                "originalData": [{"x": 1.0}, {"x": 2.0}, {"x": 7.0}],
                "targets": ["A", "A", "B"]
            }"#,
        )
        .unwrap();
        let mut plot = ScatterPlot::from_data(data);
        plot.highlight_points([2]);

        let rendered = scatter_document(&plot, &TreePainter::default(), 300.0, 200.0).to_string();
        assert_eq!(rendered.matches("<circle").count(), 3);
        assert_eq!(rendered.matches("stroke-width=\"2\"").count(), 1);
        assert!(!rendered.contains("axis-label"));
    }

    #[test]
    fn scatter_document_draws_axis_labels() {
        let data: ScatterPlotData = serde_json::from_str(
            r#"{
                "transformedData": [[0.0, 0.0], [1.0, 2.0]],
                "originalData": [{"x": 1.0}, {"x": 2.0}],
                "xAxisLabel": "PC1",
                "yAxisLabel": "PC2"
            }"#,
        )
        .unwrap();
        let plot = ScatterPlot::from_data(data);

        let rendered = scatter_document(&plot, &TreePainter::default(), 300.0, 200.0).to_string();
        assert!(rendered.contains("PC1"));
        assert!(rendered.contains("PC2"));
        assert!(rendered.contains("rotate(-90"));
    }
}
