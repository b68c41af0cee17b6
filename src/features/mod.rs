//! Maps encoded (one-hot) feature names back to the original dataset
//! features for display.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::path::{Branch, DecisionPath, SplitRule};
use crate::tree::{DecisionTree, Instance};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMappingInfo {
    #[serde(default)]
    pub original_feature_names: Vec<String>,
    #[serde(default)]
    pub encoded_feature_names: Vec<String>,
    #[serde(default)]
    pub dataset_descriptor: DatasetDescriptor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    #[serde(default)]
    pub numeric: BTreeMap<String, NumericFeature>,
    #[serde(default)]
    pub categorical: BTreeMap<String, CategoricalFeature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericFeature {
    pub index: usize,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
    #[serde(default)]
    pub median: Option<f64>,
    #[serde(default)]
    pub q1: Option<f64>,
    #[serde(default)]
    pub q3: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeature {
    pub index: usize,
    #[serde(default, deserialize_with = "crate::io::label_list")]
    pub distinct_values: Vec<String>,
    #[serde(default)]
    pub count: Option<Value>,
}

/// A split condition expressed on the original feature.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSplit {
    Numeric { feature: String, threshold: f64 },
    Categorical { feature: String, category: String },
}

impl DecodedSplit {
    pub fn feature(&self) -> &str {
        match self {
            DecodedSplit::Numeric { feature, .. } | DecodedSplit::Categorical { feature, .. } => {
                feature
            }
        }
    }

    /// Rule text for the given side of the split. One-hot columns go left
    /// when they are 0, i.e. when the category does not match.
    pub fn condition(&self, branch: Branch, rule: SplitRule) -> String {
        match (self, branch) {
            (DecodedSplit::Numeric { feature, threshold }, Branch::Left) => {
                format!("{feature} {} {threshold:.2}", rule.left_operator())
            }
            (DecodedSplit::Numeric { feature, threshold }, Branch::Right) => {
                format!("{feature} {} {threshold:.2}", rule.right_operator())
            }
            (DecodedSplit::Categorical { feature, category }, Branch::Left) => {
                format!("{feature} != {category}")
            }
            (DecodedSplit::Categorical { feature, category }, Branch::Right) => {
                format!("{feature} = {category}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Numeric(f64),
    Categorical(String),
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Numeric(value) => write!(f, "{value}"),
            DecodedValue::Categorical(category) => f.write_str(category),
        }
    }
}

impl FeatureMappingInfo {
    pub fn is_empty(&self) -> bool {
        self.encoded_feature_names.is_empty()
            && self.dataset_descriptor.numeric.is_empty()
            && self.dataset_descriptor.categorical.is_empty()
    }

    pub fn encoded_name(&self, index: usize) -> Option<&str> {
        self.encoded_feature_names.get(index).map(String::as_str)
    }

    /// Categorical feature owning the one-hot column `encoded`, with the
    /// category suffix. The longest matching `<feature>_` prefix wins.
    fn categorical_column<'a>(&'a self, encoded: &'a str) -> Option<(&'a str, &'a str)> {
        self.dataset_descriptor
            .categorical
            .keys()
            .filter_map(|name| {
                let category = encoded.strip_prefix(name.as_str())?.strip_prefix('_')?;
                Some((name.as_str(), category))
            })
            .max_by_key(|(name, _)| name.len())
    }

    pub fn decode_split(&self, encoded: &str, threshold: f64) -> DecodedSplit {
        if !self.dataset_descriptor.numeric.contains_key(encoded) {
            if let Some((feature, category)) = self.categorical_column(encoded) {
                return DecodedSplit::Categorical {
                    feature: feature.to_string(),
                    category: category.to_string(),
                };
            }
        }
        DecodedSplit::Numeric {
            feature: encoded.to_string(),
            threshold,
        }
    }

    /// Fold an encoded instance back into original features. One-hot groups
    /// decode to the category whose column is set.
    pub fn decode_instance(&self, encoded: &Instance) -> BTreeMap<String, DecodedValue> {
        let mut decoded = BTreeMap::new();
        let mut best_columns: BTreeMap<&str, (&str, f64)> = BTreeMap::new();

        for (name, &value) in encoded {
            if self.dataset_descriptor.numeric.contains_key(name) {
                decoded.insert(name.clone(), DecodedValue::Numeric(value));
                continue;
            }
            match self.categorical_column(name) {
                Some((feature, category)) => {
                    let entry = best_columns.entry(feature).or_insert((category, f64::NEG_INFINITY));
                    if value > entry.1 {
                        *entry = (category, value);
                    }
                }
                None => {
                    decoded.insert(name.clone(), DecodedValue::Numeric(value));
                }
            }
        }

        for (feature, (category, value)) in best_columns {
            if value >= 0.5 {
                decoded.insert(feature.to_string(), DecodedValue::Categorical(category.to_string()));
            } else {
                debug!("no one-hot column set for feature '{}'", feature);
            }
        }
        decoded
    }

    /// Encode an original instance the way the backend does: numbers pass
    /// through, categories become `<feature>_<category>` one-hot columns.
    pub fn encode_instance(&self, original: &BTreeMap<String, Value>) -> Instance {
        let mut encoded = Instance::new();
        for (name, value) in original {
            if let Some(number) = value.as_f64() {
                if !self.dataset_descriptor.categorical.contains_key(name) {
                    encoded.insert(name.clone(), number);
                    continue;
                }
            }
            let Some(category) = crate::io::label_from_value(value) else {
                continue;
            };
            let columns: Vec<&String> = self
                .encoded_feature_names
                .iter()
                .filter(|column| {
                    self.categorical_column(column)
                        .map_or(false, |(feature, _)| feature == name)
                })
                .collect();
            if columns.is_empty() {
                encoded.insert(format!("{name}_{category}"), 1.0);
            }
            for column in columns {
                let hot = self
                    .categorical_column(column)
                    .map_or(false, |(_, suffix)| suffix == category);
                encoded.insert(column.clone(), if hot { 1.0 } else { 0.0 });
            }
        }
        encoded
    }

    /// Human-readable conditions along `path`, one per traversed split.
    pub fn describe_path(&self, tree: &DecisionTree, path: &DecisionPath, rule: SplitRule) -> Vec<String> {
        path.links()
            .into_iter()
            .filter_map(|(parent, child)| {
                let node = tree.node(parent)?;
                let branch = Branch::between(node, child)?;
                let split = self.decode_split(node.feature_name()?, node.threshold()?);
                Some(split.condition(branch, rule))
            })
            .collect()
    }
}
