use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, field::Value, stat_map::StatMap};

/// Variant of the environment a benchmark was run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExperimentType {
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "base_perf_counters")]
    BasePerfCounters,
    #[serde(rename = "parallaft")]
    Parallaft,
    #[serde(rename = "raft")]
    Raft,
    /// Namespace for values computed across experiments, never run itself
    #[serde(rename = "derived")]
    CrossDerived,
}

impl ExperimentType {
    /// Experiment types backed by a result directory, in collection order.
    pub const MEASURED: [ExperimentType; 4] = [
        ExperimentType::Base,
        ExperimentType::BasePerfCounters,
        ExperimentType::Parallaft,
        ExperimentType::Raft,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            ExperimentType::Base => "base",
            ExperimentType::BasePerfCounters => "base_perf_counters",
            ExperimentType::Parallaft => "parallaft",
            ExperimentType::Raft => "raft",
            ExperimentType::CrossDerived => "derived",
        }
    }
}

impl fmt::Display for ExperimentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ExperimentType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::MEASURED
            .into_iter()
            .chain([ExperimentType::CrossDerived])
            .find(|e| e.token() == s)
            .ok_or_else(|| ConfigError::UnknownExperimentType(s.to_owned()))
    }
}

/// All stats of one benchmark, keyed by (experiment, field name).
pub type ExperimentStats = StatMap<(ExperimentType, String)>;

impl ExperimentStats {
    pub fn lookup(&self, experiment: ExperimentType, name: &str) -> Option<&Value> {
        self.get(&(experiment, name.to_owned()))
    }

    pub fn f64(&self, experiment: ExperimentType, name: &str) -> Option<f64> {
        self.lookup(experiment, name).and_then(Value::as_f64)
    }
}
