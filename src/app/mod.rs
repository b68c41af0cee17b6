use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use crate::tree::layout::{LayoutConfig, TreeKind};
use crate::tree::path::SplitRule;
use crate::tree::viewer::TreeViewManager;
use crate::tree::visibility::DEFAULT_INITIAL_VISIBLE_DEPTH;
use crate::tree::NodeId;
use crate::{io, ui};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "explaintree",
    about = "Lay out a decision-tree explanation and trace the explained instance through it."
)]
pub struct AppConfig {
    /// Explanation payload returned by the backend (JSON).
    #[arg(value_name = "PAYLOAD")]
    pub payload_path: PathBuf,

    /// Tree view(s) to compute; repeat for several. Defaults to all.
    #[arg(long = "view", value_enum)]
    pub views: Vec<TreeKind>,

    /// Click this node after loading (highlights it in every view).
    #[arg(long, value_name = "NODE_ID")]
    pub select: Option<NodeId>,

    /// Click this scatter point after loading.
    #[arg(long, value_name = "INDEX")]
    pub select_point: Option<usize>,

    /// Toggle these off-path nodes in the spawn view, in order.
    #[arg(long, value_name = "NODE_ID")]
    pub expand: Vec<NodeId>,

    /// Depth of off-path subtrees shown before collapsing (spawn view).
    #[arg(long, default_value_t = DEFAULT_INITIAL_VISIBLE_DEPTH)]
    pub initial_visible_depth: usize,

    /// Canvas width in pixels
    #[arg(long, default_value_t = 960)]
    pub width: u32,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 600)]
    pub height: u32,

    /// Send values equal to the threshold right (`value < threshold` goes left).
    #[arg(long)]
    pub strict_threshold: bool,

    /// Write the computed layouts here.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Target export format
    #[arg(long, default_value_t = ExportFormat::Json)]
    pub export_format: ExportFormat,
}

impl AppConfig {
    pub fn layout_config(&self) -> LayoutConfig {
        let mut layout = LayoutConfig {
            width: self.width as f32,
            height: self.height as f32,
            ..LayoutConfig::default()
        };
        layout.spawn.initial_visible_depth = self.initial_visible_depth;
        layout
    }

    pub fn split_rule(&self) -> SplitRule {
        if self.strict_threshold {
            SplitRule::LessThan
        } else {
            SplitRule::LessOrEqual
        }
    }

    pub fn kinds(&self) -> Vec<TreeKind> {
        if self.views.is_empty() {
            TreeKind::ALL.to_vec()
        } else {
            self.views.clone()
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Svg,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Svg => write!(f, "svg"),
        }
    }
}

pub struct ExplainTreeApp;

impl ExplainTreeApp {
    pub fn run(config: &AppConfig) -> Result<()> {
        let payload = io::load_payload(&config.payload_path)?;
        let mut manager = TreeViewManager::new(config.layout_config(), config.split_rule());
        if !manager.load_explanation(&payload, &config.kinds()) {
            bail!(
                "no view could build a decision tree from {}",
                config.payload_path.display()
            );
        }

        for &id in &config.expand {
            if !manager.toggle_spawn_node(id) {
                warn!("node {} cannot be expanded or collapsed in the spawn view", id);
            }
        }
        if let Some(id) = config.select {
            info!("selecting node {}", id);
            manager.click_node(id);
        }
        if let Some(index) = config.select_point {
            info!("selecting scatter point {}", index);
            manager.select_point(index);
        }

        ui::render_preview(&manager, config);

        if let Some(dest) = &config.output {
            ui::export(&manager, config, dest)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PAYLOAD: &str = r#"{
        "decisionTreeVisualizationData": [
            {"node_id": 0, "feature_name": "x", "threshold": 5.0, "left_child": 1, "right_child": 2, "n_samples": 10},
            {"node_id": 1, "is_leaf": true, "class_label": "A", "n_samples": 6},
            {"node_id": 2, "is_leaf": true, "class_label": "B", "n_samples": 4}
        ],
        "encodedInstance": {"x": 5.0}
    }"#;

    #[test]
    fn parses_command_line() {
        let config = AppConfig::parse_from([
            "explaintree",
            "payload.json",
            "--view",
            "spawn",
            "--view",
            "classic",
            "--expand",
            "4",
            "--strict-threshold",
            "--export-format",
            "svg",
        ]);
        assert_eq!(config.kinds(), vec![TreeKind::Spawn, TreeKind::Classic]);
        assert_eq!(config.expand, vec![4]);
        assert_eq!(config.split_rule(), SplitRule::LessThan);
        assert_eq!(config.export_format, ExportFormat::Svg);
        assert_eq!(config.layout_config().spawn.initial_visible_depth, 2);
    }

    #[test]
    fn runs_headless_and_exports() {
        let mut payload = tempfile::NamedTempFile::new().unwrap();
        payload.write_all(PAYLOAD.as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("layout.json");

        let config = AppConfig::parse_from([
            "explaintree",
            payload.path().to_str().unwrap(),
            "--select",
            "1",
            "--output",
            output.to_str().unwrap(),
        ]);
        ExplainTreeApp::run(&config).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["views"].as_array().unwrap().len(), 3);
        assert_eq!(written["selection"]["id"], 1);
    }
}
