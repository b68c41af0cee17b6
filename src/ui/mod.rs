use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::app::{AppConfig, ExportFormat};
use crate::export;
use crate::tree::highlight::Selection;
use crate::tree::layout::TreeKind;
use crate::tree::viewer::TreeViewManager;

const PREVIEW_RULES: usize = 8;

pub fn render_preview(manager: &TreeViewManager, config: &AppConfig) {
    let kinds = manager.active_kinds();
    println!(
        "Loaded explanation into {} view(s) at {}x{} px.",
        kinds.len(),
        config.width,
        config.height
    );

    for kind in &kinds {
        let Some(view) = manager.view(*kind) else {
            continue;
        };
        let Some(tree) = view.tree.as_ref() else {
            println!("- {kind}: no tree");
            continue;
        };
        let positioned = view.layout.as_ref().map_or(0, |layout| layout.node_count());
        let outcome = match (&view.path.stop, view.path.leaf()) {
            (None, Some(leaf)) => {
                let class = tree.node(leaf).and_then(|node| node.class_label()).unwrap_or("?");
                format!("leaf {leaf} (class {class})")
            }
            (Some(stop), _) => format!("stopped: {stop}"),
            (None, None) => "no path".to_string(),
        };
        println!(
            "- {kind}: {} node(s), {positioned} drawn, path {:?} -> {outcome}",
            tree.len(),
            view.path.nodes
        );
    }

    if let Some(kind) = kinds.first() {
        let rules = manager.describe_path(*kind);
        if !rules.is_empty() {
            println!("Decision rules:");
            for rule in rules.iter().take(PREVIEW_RULES) {
                println!("  {rule}");
            }
            if rules.len() > PREVIEW_RULES {
                println!("  ... ({} more rule(s) omitted)", rules.len() - PREVIEW_RULES);
            }
        }
    }

    match manager.selection() {
        Selection::Idle => {}
        Selection::Node(id) => println!("Selected node {id}."),
        Selection::Point(index) => println!("Selected scatter point {index}."),
    }
    if let Some(plot) = manager.scatter() {
        println!(
            "Scatter plot ({}): {} point(s), {} highlighted.",
            plot.method().unwrap_or("unknown projection"),
            plot.len(),
            plot.highlighted().len()
        );
    }
}

/// `layout.svg` becomes `layout-spawn.svg` when several files are written.
fn suffixed(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "explaintree".to_string());
    let extension = output
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "svg".to_string());
    output.with_file_name(format!("{stem}-{suffix}.{extension}"))
}

pub fn export(manager: &TreeViewManager, config: &AppConfig, output: &Path) -> Result<()> {
    match config.export_format {
        ExportFormat::Json => export::json::export_json(manager, output),
        ExportFormat::Svg => {
            let kinds: Vec<TreeKind> = manager
                .active_kinds()
                .into_iter()
                .filter(|kind| manager.view(*kind).map_or(false, |view| view.layout.is_some()))
                .collect();
            if kinds.is_empty() {
                bail!("no laid-out view to export");
            }
            let single = kinds.len() == 1 && manager.scatter().is_none();

            for kind in &kinds {
                if let Some(view) = manager.view(*kind) {
                    let target = if single {
                        output.to_path_buf()
                    } else {
                        suffixed(output, kind.name())
                    };
                    export::svg::export_svg(view, &target)?;
                }
            }
            if let (Some(plot), Some(view)) = (manager.scatter(), manager.view(kinds[0])) {
                export::svg::export_scatter_svg(
                    plot,
                    &view.painter,
                    &suffixed(output, "scatter"),
                    f64::from(config.width),
                    f64::from(config.height),
                )?;
            }
            Ok(())
        }
    }
}
