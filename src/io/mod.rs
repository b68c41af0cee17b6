use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::features::FeatureMappingInfo;
use crate::scatter::ScatterPlotData;
use crate::tree::{Instance, NodeRecord};

/// Response of the explanation backend for one explained instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub decision_tree_visualization_data: Vec<NodeRecord>,
    #[serde(default, alias = "PCAvisualizationData")]
    pub scatter_plot_visualization_data: Option<ScatterPlotData>,
    #[serde(default, deserialize_with = "label_list")]
    pub unique_classes: Vec<String>,
    #[serde(default)]
    pub feature_mapping_info: Option<FeatureMappingInfo>,
    #[serde(default)]
    pub encoded_instance: Option<Instance>,
    #[serde(default)]
    pub original_instance: Option<BTreeMap<String, Value>>,
}

impl ExplanationPayload {
    /// Encoded feature vector to trace. Falls back to encoding the original
    /// instance through the feature mapping.
    pub fn instance(&self) -> Instance {
        if let Some(encoded) = &self.encoded_instance {
            return encoded.clone();
        }
        match (&self.original_instance, &self.feature_mapping_info) {
            (Some(original), Some(mapping)) => mapping.encode_instance(original),
            (Some(original), None) => original
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_f64()?)))
                .collect(),
            _ => Instance::new(),
        }
    }
}

pub fn load_payload(path: &Path) -> Result<ExplanationPayload> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read explanation file: {}", path.display()))?;
    let payload = parse_payload(&raw)
        .with_context(|| format!("invalid explanation payload in {}", path.display()))?;
    info!(
        "loaded {} tree node(s) from {}",
        payload.decision_tree_visualization_data.len(),
        path.display()
    );
    Ok(payload)
}

pub fn parse_payload(raw: &str) -> Result<ExplanationPayload> {
    let payload: ExplanationPayload =
        serde_json::from_str(raw).context("failed to parse explanation JSON")?;

    if payload.status.as_deref() == Some("error") {
        bail!(
            "backend reported an error: {}",
            payload.message.as_deref().unwrap_or("no message")
        );
    }
    if payload.decision_tree_visualization_data.is_empty() {
        bail!("explanation payload does not contain any decision tree nodes");
    }
    if payload.encoded_instance.is_none() && payload.original_instance.is_none() {
        warn!("explanation payload has no instance; no decision path will be traced");
    }
    Ok(payload)
}

/// Class labels arrive as strings or numbers depending on the dataset.
pub(crate) fn label_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(label) => Some(label.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn optional_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(label_from_value))
}

pub(crate) fn label_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map(|value| label_from_value(value).unwrap_or_default())
        .collect())
}
