use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::experiment::ExperimentType;

pub const DEFAULT_LABEL: &str = "releval";
pub const DEFAULT_PRECISION: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Invalid field specification: {0}, expecting <exp_type>:<field_name> or <derived_field_name> or <field_group_name>"
    )]
    InvalidSelector(String),
    #[error("Unknown experiment type: {0}")]
    UnknownExperimentType(String),
    #[error("Unknown field: {0}")]
    UnknownField(String),
    #[error("No experiment directories are specified")]
    NoExperiments,
    #[error("Experiment type {0} has no result directory")]
    NotMeasured(ExperimentType),
    #[error("Separator must be a single ASCII character, got {0:?}")]
    InvalidSeparator(String),
    #[error("Field group {0} shadows a built-in group")]
    ShadowedGroup(String),
    #[error("Field group {group} cannot contain group {member}")]
    NestedGroup { group: String, member: String },
}

/// Optional YAML report configuration, command line flags take precedence.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Result directory per experiment type
    #[serde(default)]
    pub experiments: BTreeMap<ExperimentType, PathBuf>,
    pub label: Option<String>,
    pub precision: Option<usize>,
    /// User field groups, each a list of selectors
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

impl ReportConfig {
    /// Experiment directories in collection order.
    pub fn experiment_dirs(&self) -> Result<Vec<(ExperimentType, PathBuf)>, ConfigError> {
        if let Some(e) = self.experiments.keys().find(|e| **e == ExperimentType::CrossDerived) {
            return Err(ConfigError::NotMeasured(*e));
        }
        let dirs: Vec<_> = ExperimentType::MEASURED
            .into_iter()
            .filter_map(|e| self.experiments.get(&e).map(|dir| (e, dir.clone())))
            .collect();
        if dirs.is_empty() {
            return Err(ConfigError::NoExperiments);
        }
        Ok(dirs)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }

    pub fn precision(&self) -> usize {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }
}

/// Parses a `--sep` value into the single byte the table writer needs.
pub fn parse_separator(sep: &str) -> Result<u8, ConfigError> {
    match sep.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ConfigError::InvalidSeparator(sep.to_owned())),
    }
}
