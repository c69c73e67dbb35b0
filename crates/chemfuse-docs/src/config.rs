//! Pipeline configuration.
//!
//! Loaded from an optional JSON file; every field has a default, so `{}` is a
//! valid configuration:
//!
//! ```json
//! {
//!   "ontology": { "family_capacity": 2000, "memoize_families": false },
//!   "duplicate_ids": "keep-first",
//!   "payload_key": "chebi"
//! }
//! ```

use crate::FusionError;
use chemfuse_ingest_obo::OntologyConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// What to do when two compound blocks share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateIdPolicy {
    /// Emit the first block, skip later ones.
    #[default]
    KeepFirst,
    /// Fail the read on the first repeated id.
    Reject,
}

impl FromStr for DuplicateIdPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep-first" => Ok(Self::KeepFirst),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "unknown duplicate-id policy `{other}` (expected keep-first or reject)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub ontology: OntologyConfig,
    pub duplicate_ids: DuplicateIdPolicy,
    /// Envelope key holding the finalized document.
    pub payload_key: String,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            ontology: OntologyConfig::default(),
            duplicate_ids: DuplicateIdPolicy::default(),
            payload_key: "chebi".to_string(),
        }
    }
}

impl FusionConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json_str(text: &str) -> Result<Self, FusionError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, FusionError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Reject settings that would silently produce broken documents.
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.ontology.family_capacity == 0 {
            return Err(FusionError::InvalidConfig(
                "ontology.family_capacity must be at least 1".to_string(),
            ));
        }
        if self.payload_key.is_empty() || self.payload_key == "_id" {
            return Err(FusionError::InvalidConfig(format!(
                "payload_key `{}` cannot be empty or `_id`",
                self.payload_key
            )));
        }
        Ok(())
    }
}
