//! Label encoder artifact.
//!
//! The label encoder maps model output indices to behavior names. On disk it
//! is JSON, either `{"classes": ["hand_flapping", ...]}` or a bare array.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelEncoderFile {
    Object { classes: Vec<String> },
    Array(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(anyhow!("label encoder has no classes"));
        }
        let mut seen = HashSet::new();
        for class in &classes {
            if class.trim().is_empty() {
                return Err(anyhow!("label encoder contains an empty class name"));
            }
            if !seen.insert(class.as_str()) {
                return Err(anyhow!("label encoder lists '{}' twice", class));
            }
        }
        Ok(Self { classes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label encoder {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid label encoder {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: LabelEncoderFile = serde_json::from_str(raw)?;
        let classes = match parsed {
            LabelEncoderFile::Object { classes } => classes,
            LabelEncoderFile::Array(classes) => classes,
        };
        Self::new(classes)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn contains(&self, label: &str) -> bool {
        self.classes.iter().any(|c| c == label)
    }
}
