//! Dataset payloads.
//!
//! A payload is a feature schema plus an ordered list of rows. The JSON
//! field names follow the dataset viewer format used by the marketplace,
//! so published payloads can be rendered without conversion.
//!
//! # Design Notes
//!
//! Deserialization alone is not enough: serde accepts a payload whose rows
//! disagree with its features. [`DatasetPayload::validate`] enforces the
//! structural invariants and is run on both publish and fetch.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{ContentError, Result};

/// Name of the output column of generated datasets.
pub const GENERATED_OUTPUT_FEATURE: &str = "generated_output";

/// Input column name used when the producer does not name one.
pub const DEFAULT_INPUT_FEATURE: &str = "input";

/// Rows per page advertised to dataset viewers.
pub const DEFAULT_ROWS_PER_PAGE: u32 = 100;

fn default_rows_per_page() -> u32 {
    DEFAULT_ROWS_PER_PAGE
}

/// Column type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureType {
    pub dtype: String,
    #[serde(rename = "_type")]
    pub kind: String,
}

impl FeatureType {
    /// A plain string column.
    pub fn string() -> Self {
        Self {
            dtype: "string".into(),
            kind: "Value".into(),
        }
    }
}

/// One column of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub feature_idx: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub feature_type: FeatureType,
}

/// One generated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Position in generation order.
    pub row_idx: u64,
    /// Cell values keyed by feature name.
    pub row: BTreeMap<String, String>,
    /// Authenticity signature of the inference response.
    pub signature: String,
    /// Hash of the inference response.
    pub response_hash: String,
    #[serde(default)]
    pub truncated_cells: Vec<String>,
}

/// A dataset: schema and rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPayload {
    pub features: Vec<Feature>,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rows_total: Option<u64>,
    #[serde(default = "default_rows_per_page")]
    pub num_rows_per_page: u32,
    /// A partial payload is one page of a larger dataset.
    #[serde(default)]
    pub partial: bool,
}

/// A row as produced by the inference service, before shaping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRow {
    pub input: String,
    pub output: String,
    pub signature: String,
    pub response_hash: String,
    /// Tokens consumed generating this row.
    pub total_tokens: u64,
}

impl DatasetPayload {
    /// Shape generated rows into a two-column payload.
    ///
    /// The input column is named `input_feature`, or `"input"` when empty.
    /// Rows keep their generation order.
    pub fn from_generated(items: &[GeneratedRow], input_feature: &str) -> Result<Self> {
        let input = if input_feature.is_empty() {
            DEFAULT_INPUT_FEATURE
        } else {
            input_feature
        };

        let features = vec![
            Feature {
                feature_idx: 0,
                name: input.to_string(),
                feature_type: FeatureType::string(),
            },
            Feature {
                feature_idx: 1,
                name: GENERATED_OUTPUT_FEATURE.to_string(),
                feature_type: FeatureType::string(),
            },
        ];

        let rows = items
            .iter()
            .enumerate()
            .map(|(idx, item)| Row {
                row_idx: idx as u64,
                row: BTreeMap::from([
                    (input.to_string(), item.input.clone()),
                    (GENERATED_OUTPUT_FEATURE.to_string(), item.output.clone()),
                ]),
                signature: item.signature.clone(),
                response_hash: item.response_hash.clone(),
                truncated_cells: Vec::new(),
            })
            .collect();

        let payload = Self {
            features,
            rows,
            num_rows_total: Some(items.len() as u64),
            num_rows_per_page: DEFAULT_ROWS_PER_PAGE,
            partial: false,
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Check the structural invariants.
    ///
    /// - at least one feature, indexed by position, with unique names
    /// - every row has exactly the feature names as keys
    /// - row indices strictly increase
    /// - a complete payload's `num_rows_total`, when present, counts its rows
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(ContentError::SchemaViolation("no features".into()));
        }

        let mut names = BTreeSet::new();
        for (pos, feature) in self.features.iter().enumerate() {
            if feature.feature_idx as usize != pos {
                return Err(ContentError::SchemaViolation(format!(
                    "feature {:?} has index {} at position {}",
                    feature.name, feature.feature_idx, pos
                )));
            }
            if !names.insert(feature.name.as_str()) {
                return Err(ContentError::SchemaViolation(format!(
                    "duplicate feature {:?}",
                    feature.name
                )));
            }
        }

        let mut previous: Option<u64> = None;
        for row in &self.rows {
            if row.row.len() != names.len()
                || !row.row.keys().all(|k| names.contains(k.as_str()))
            {
                return Err(ContentError::SchemaViolation(format!(
                    "row {} does not match the {} features",
                    row.row_idx,
                    names.len()
                )));
            }
            if previous.is_some_and(|p| row.row_idx <= p) {
                return Err(ContentError::SchemaViolation(format!(
                    "row {} is out of order",
                    row.row_idx
                )));
            }
            previous = Some(row.row_idx);
        }

        if let (false, Some(total)) = (self.partial, self.num_rows_total) {
            if total != self.rows.len() as u64 {
                return Err(ContentError::SchemaViolation(format!(
                    "num_rows_total is {} but {} rows are present",
                    total,
                    self.rows.len()
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let payload: Self = serde_json::from_slice(bytes)
            .map_err(|e| ContentError::SchemaViolation(e.to_string()))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ContentError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generated(n: usize) -> Vec<GeneratedRow> {
        (0..n)
            .map(|i| GeneratedRow {
                input: format!("prompt {}", i),
                output: format!("answer {}", i),
                signature: format!("sig{}", i),
                response_hash: format!("hash{}", i),
                total_tokens: 10,
            })
            .collect()
    }

    #[test]
    fn test_from_generated_shape() {
        let payload = DatasetPayload::from_generated(&generated(3), "question").unwrap();

        let names: Vec<_> = payload.features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["question", "generated_output"]);
        assert_eq!(payload.rows.len(), 3);
        assert_eq!(payload.rows[2].row_idx, 2);
        assert_eq!(payload.rows[2].row["question"], "prompt 2");
        assert_eq!(payload.rows[2].row["generated_output"], "answer 2");
        assert_eq!(payload.num_rows_total, Some(3));
        assert_eq!(payload.num_rows_per_page, 100);
        assert!(!payload.partial);
    }

    #[test]
    fn test_empty_input_feature_defaults() {
        let payload = DatasetPayload::from_generated(&generated(1), "").unwrap();
        assert_eq!(payload.features[0].name, "input");
    }

    #[test]
    fn test_colliding_input_feature_rejected() {
        let err = DatasetPayload::from_generated(&generated(1), "generated_output").unwrap_err();
        assert!(matches!(err, ContentError::SchemaViolation(_)));
    }

    #[test]
    fn test_wire_field_names() {
        let payload = DatasetPayload::from_generated(&generated(1), "").unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload.to_json().unwrap()).unwrap();

        assert_eq!(value["features"][0]["type"]["_type"], "Value");
        assert_eq!(value["features"][1]["feature_idx"], 1);
        assert_eq!(value["rows"][0]["row"]["input"], "prompt 0");
        assert_eq!(value["rows"][0]["truncated_cells"], json!([]));
        assert_eq!(value["partial"], false);
    }

    #[test]
    fn test_missing_rows_is_schema_violation() {
        let bytes = serde_json::to_vec(&json!({
            "features": [{"feature_idx": 0, "name": "input", "type": {"dtype": "string", "_type": "Value"}}]
        }))
        .unwrap();
        assert!(matches!(
            DatasetPayload::from_json(&bytes),
            Err(ContentError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_row_feature_mismatch() {
        let mut payload = DatasetPayload::from_generated(&generated(2), "").unwrap();
        payload.rows[1].row.remove("generated_output");
        assert!(payload.validate().is_err());

        let mut payload = DatasetPayload::from_generated(&generated(2), "").unwrap();
        payload.rows[0]
            .row
            .insert("extra".into(), "cell".into());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_rows_must_keep_order() {
        let mut payload = DatasetPayload::from_generated(&generated(3), "").unwrap();
        payload.rows.swap(0, 1);
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_row_count_checked_unless_partial() {
        let mut payload = DatasetPayload::from_generated(&generated(3), "").unwrap();
        payload.num_rows_total = Some(300);
        assert!(payload.validate().is_err());

        payload.partial = true;
        assert!(payload.validate().is_ok());
    }
}
