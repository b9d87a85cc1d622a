use std::{
    collections::{HashMap, HashSet},
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    field::{self, Accumulator, FIELDS, Field, Value},
    stat_map::AggregatedStats,
};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Reading stats file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StatsError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StatsError::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
        }
    }
}

/// The `key=value` pairs of a single sub-run stats file.
pub type ParsedStats = HashMap<String, Value>;

/// Parses the contents of a stats file.
///
/// Registered keys are coerced through their field kind; anything else is
/// kept as text. Lines without `=` or with a value that does not coerce are
/// dropped.
pub fn parse_stats(contents: &str) -> ParsedStats {
    let mut out = ParsedStats::new();
    for line in contents.lines() {
        let Some((key, raw)) = line.split_once('=') else {
            trace!("Skipping line without '=': {line:?}");
            continue;
        };

        let value = match field::get(key) {
            Some(f) => match f.kind.parse(raw) {
                Some(v) => v,
                None => {
                    trace!("Skipping {key}: cannot coerce {raw:?} to {:?}", f.kind);
                    continue;
                }
            },
            None => Value::Text(raw.trim().to_owned()),
        };
        out.insert(key.to_owned(), value);
    }
    out
}

pub fn parse_stats_file(path: &Path) -> Result<ParsedStats, StatsError> {
    let contents = read_to_string(path).map_err(|source| StatsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_stats(&contents))
}

/// Folds sub-runs of one (benchmark, experiment) pair into a single record.
///
/// Sub-runs must be pushed in catalog order. A field whose reduction fails is
/// dropped from the result entirely, so a partial fold is never reported.
#[derive(Debug, Default)]
pub struct SubRunReducer {
    order: Vec<&'static Field>,
    states: HashMap<&'static str, Accumulator>,
    failed: HashSet<&'static str>,
}

impl SubRunReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stats: &ParsedStats) {
        let lookup = |name: &str| stats.get(name).cloned();

        for f in FIELDS {
            let Some(value) = stats.get(f.name) else {
                continue;
            };
            if self.failed.contains(f.name) {
                continue;
            }

            let acc = match self.states.get(f.name) {
                Some(acc) => *acc,
                None => {
                    self.order.push(f);
                    f.initial()
                }
            };
            match f.reduce(value, acc, &lookup) {
                Ok(acc) => {
                    self.states.insert(f.name, acc);
                }
                Err(err) => {
                    warn!("Dropping {}: {err}", f.name);
                    self.failed.insert(f.name);
                }
            }
        }
    }

    pub fn finish(self) -> AggregatedStats {
        self.order
            .iter()
            .filter(|f| !self.failed.contains(f.name))
            .filter_map(|f| {
                let value = self.states.get(f.name)?.value()?;
                Some((f.name.to_owned(), value))
            })
            .collect()
    }
}

/// Parses and reduces every sub-run file of one (benchmark, experiment) pair.
///
/// Fails as soon as any file cannot be read, callers treat that as no data
/// for the whole pair.
pub fn reduce_many<P: AsRef<Path>>(paths: &[P]) -> Result<AggregatedStats, StatsError> {
    let mut reducer = SubRunReducer::new();
    for path in paths {
        let path = path.as_ref();
        debug!("Reducing {path:?}");
        reducer.push(&parse_stats_file(path)?);
    }
    Ok(reducer.finish())
}

/// Fields of `stats` whose reduced value fails the field's validity check.
pub fn invalid_fields(stats: &AggregatedStats) -> Vec<&'static str> {
    FIELDS
        .iter()
        .filter(|f| stats.value(f.name).is_some_and(|v| !f.is_valid(v)))
        .map(|f| f.name)
        .collect()
}
