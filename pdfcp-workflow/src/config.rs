//! Configuration for the validation workflow.

use serde::{Deserialize, Serialize};

use crate::types::{Result, WorkflowError};

/// Configuration for a [`WorkflowService`](crate::service::WorkflowService).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Justification rules for cancellations, unlocks and unlock requests
    pub justification: JustificationConfig,
    /// Reject actions on programs outside the actor's territory
    pub enforce_territorial_scope: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            justification: JustificationConfig::default(),
            enforce_territorial_scope: true,
        }
    }
}

impl WorkflowConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Length bounds for free-text justifications, counted after trimming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JustificationConfig {
    /// Minimum characters
    pub min_chars: usize,
    /// Maximum characters (input cap of the forms)
    pub max_chars: usize,
}

impl Default for JustificationConfig {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 500,
        }
    }
}

impl JustificationConfig {
    /// Validate a justification, returning the trimmed text.
    pub fn validate<'a>(&self, field: &str, text: &'a str) -> Result<&'a str> {
        let trimmed = text.trim();
        let len = trimmed.chars().count();

        if len < self.min_chars {
            return Err(WorkflowError::InvalidInput(format!(
                "{field} must be at least {} characters ({len}/{})",
                self.min_chars, self.min_chars
            )));
        }
        if len > self.max_chars {
            return Err(WorkflowError::InvalidInput(format!(
                "{field} must be at most {} characters ({len}/{})",
                self.max_chars, self.max_chars
            )));
        }

        Ok(trimmed)
    }
}
