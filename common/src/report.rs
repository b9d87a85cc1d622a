use std::{collections::HashMap, io::Write};

use eyre::{Context, Result};
use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::{
    collect::BenchmarkStats,
    config::ConfigError,
    derived::{
        PARALLAFT_OVERHEAD_ENERGY, PARALLAFT_OVERHEAD_FORK_AND_COW,
        PARALLAFT_OVERHEAD_LAST_CHECKER_SYNC, PARALLAFT_OVERHEAD_PERF,
        PARALLAFT_OVERHEAD_RESOURCE_CONTENTION, PARALLAFT_OVERHEAD_RUNTIME_WORK,
        RAFT_OVERHEAD_ENERGY, RAFT_OVERHEAD_PERF, cross_experiment_field, derived_field,
    },
    experiment::ExperimentType::{self, CrossDerived},
    field::{self, Value},
    util::{format_real, shifted_geomean},
};

pub const GEOMEAN_ROW: &str = "Geomean";

/// Column of a report, the value of `field` under `experiment`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Column {
    pub experiment: ExperimentType,
    pub field: String,
}

impl Column {
    pub fn new(experiment: ExperimentType, field: &str) -> Self {
        Self {
            experiment,
            field: field.to_owned(),
        }
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.experiment, self.field)
    }
}

pub static FIELD_GROUPS: &[(&str, &[(ExperimentType, &str)])] = &[
    (
        "performance_overhead_parallaft_vs_raft",
        &[
            (CrossDerived, PARALLAFT_OVERHEAD_PERF),
            (CrossDerived, RAFT_OVERHEAD_PERF),
        ],
    ),
    (
        "energy_overhead_parallaft_vs_raft",
        &[
            (CrossDerived, PARALLAFT_OVERHEAD_ENERGY),
            (CrossDerived, RAFT_OVERHEAD_ENERGY),
        ],
    ),
    (
        "parallaft_performance_overhead_breakdown",
        &[
            (CrossDerived, PARALLAFT_OVERHEAD_FORK_AND_COW),
            (CrossDerived, PARALLAFT_OVERHEAD_RESOURCE_CONTENTION),
            (CrossDerived, PARALLAFT_OVERHEAD_LAST_CHECKER_SYNC),
            (CrossDerived, PARALLAFT_OVERHEAD_RUNTIME_WORK),
        ],
    ),
];

fn builtin_group(name: &str) -> Option<&'static [(ExperimentType, &'static str)]> {
    FIELD_GROUPS
        .iter()
        .find(|(group, _)| *group == name)
        .map(|(_, columns)| *columns)
}

/// Resolves a selector that is not a group: a cross-experiment field name or
/// an explicit `<experiment>:<field>` pair.
fn resolve_single(selector: &str) -> Result<Column, ConfigError> {
    if cross_experiment_field(selector).is_some() {
        return Ok(Column::new(CrossDerived, selector));
    }

    let (experiment, name) = selector
        .split_once(':')
        .ok_or_else(|| ConfigError::InvalidSelector(selector.to_owned()))?;
    let experiment: ExperimentType = experiment.parse()?;

    let known = field::get(name).is_some()
        || derived_field(name).is_some()
        || (experiment == CrossDerived && cross_experiment_field(name).is_some());
    if !known {
        return Err(ConfigError::UnknownField(name.to_owned()));
    }
    Ok(Column::new(experiment, name))
}

fn check_groups(groups: &HashMap<String, Vec<String>>) -> Result<(), ConfigError> {
    for (group, members) in groups {
        if builtin_group(group).is_some() {
            return Err(ConfigError::ShadowedGroup(group.clone()));
        }
        for member in members {
            if builtin_group(member).is_some() || groups.contains_key(member) {
                return Err(ConfigError::NestedGroup {
                    group: group.clone(),
                    member: member.clone(),
                });
            }
            resolve_single(member)?;
        }
    }
    Ok(())
}

/// Expands the requested selectors into report columns, in order.
///
/// `groups` are user defined groups; they may neither shadow a built-in group
/// nor contain other groups.
pub fn resolve_columns<S: AsRef<str>>(
    selectors: &[S],
    groups: &HashMap<String, Vec<String>>,
) -> Result<Vec<Column>, ConfigError> {
    check_groups(groups)?;

    let mut columns = Vec::new();
    for selector in selectors {
        let selector = selector.as_ref();
        if let Some(group) = builtin_group(selector) {
            columns.extend(group.iter().map(|(e, f)| Column::new(*e, f)));
        } else if let Some(members) = groups.get(selector) {
            for member in members {
                columns.push(resolve_single(member)?);
            }
        } else {
            columns.push(resolve_single(selector)?);
        }
    }
    debug!(
        "Resolved columns: {}",
        columns.iter().map(Column::label).join(", ")
    );
    Ok(columns)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub name: String,
    /// `None` where the value is not available
    pub cells: Vec<Option<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

/// Looks up every column for every benchmark, keeping catalog order.
pub fn project(results: &[BenchmarkStats], columns: &[Column], short_names: bool) -> Table {
    let rows = results
        .iter()
        .map(|result| Row {
            name: if short_names {
                result.benchmark.short_name()
            } else {
                result.benchmark.name
            }
            .to_owned(),
            cells: columns
                .iter()
                .map(|c| result.stats.lookup(c.experiment, &c.field).cloned())
                .collect(),
        })
        .collect();

    Table {
        columns: columns.to_vec(),
        rows,
    }
}

impl Table {
    /// Appends the shifted geometric mean of each column over all benchmark
    /// rows. A column with any missing or non-numeric cell gets NaN.
    pub fn push_geomean(&mut self) {
        let cells = (0..self.columns.len())
            .map(|i| {
                let values = self
                    .rows
                    .iter()
                    .map(|row| row.cells[i].as_ref().and_then(Value::as_f64));
                Some(Value::Real(shifted_geomean(values)))
            })
            .collect();
        self.rows.push(Row {
            name: GEOMEAN_ROW.to_owned(),
            cells,
        });
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub header: bool,
    pub names: bool,
    pub separator: u8,
    /// Applied to real values only
    pub scale: f64,
    pub precision: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            header: true,
            names: true,
            separator: b',',
            scale: 1.0,
            precision: crate::config::DEFAULT_PRECISION,
        }
    }
}

pub fn format_cell(cell: Option<&Value>, opts: &RenderOptions) -> String {
    match cell {
        Some(Value::Real(x)) => format_real(x * opts.scale, opts.precision),
        Some(other) => other.to_string(),
        None => format_real(f64::NAN, opts.precision),
    }
}

/// Writes `table` as delimited text.
pub fn write_table<W: Write>(table: &Table, opts: &RenderOptions, writer: W) -> Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(opts.separator)
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);

    if opts.header {
        let names = opts.names.then(|| "name".to_owned());
        let header = names.into_iter().chain(table.columns.iter().map(Column::label));
        out.write_record(header.collect_vec())
            .context("Write header")?;
    }

    for row in &table.rows {
        let name = opts.names.then(|| row.name.clone());
        let cells = row.cells.iter().map(|c| format_cell(c.as_ref(), opts));
        out.write_record(name.into_iter().chain(cells).collect_vec())
            .context(format!("Write row {}", row.name))?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonTable<'a> {
    columns: Vec<String>,
    rows: Vec<JsonRow<'a>>,
}

#[derive(Serialize)]
struct JsonRow<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    values: Vec<Option<Value>>,
}

/// Writes `table` as JSON, for plotting scripts. Missing values become `null`.
pub fn write_json<W: Write>(table: &Table, opts: &RenderOptions, mut writer: W) -> Result<()> {
    let rows = table
        .rows
        .iter()
        .map(|row| JsonRow {
            name: opts.names.then_some(row.name.as_str()),
            values: row
                .cells
                .iter()
                .map(|cell| match cell {
                    Some(Value::Real(x)) => Some(Value::Real(x * opts.scale)),
                    other => other.clone(),
                })
                .collect(),
        })
        .collect();

    let json = JsonTable {
        columns: table.columns.iter().map(Column::label).collect(),
        rows,
    };
    serde_json::to_writer_pretty(&mut writer, &json).context("Write json")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bench::{BenchClass, Benchmark},
        derived::MAIN_CPU_TIME,
        experiment::ExperimentStats,
        field::MAIN_WALL_TIME,
    };

    fn no_groups() -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    fn bench_stats(name: &'static str, pairs: &[(ExperimentType, &str, Value)]) -> BenchmarkStats {
        let mut stats = ExperimentStats::new();
        for (e, f, v) in pairs {
            stats.insert((*e, (*f).to_owned()), v.clone());
        }
        BenchmarkStats {
            benchmark: Benchmark::new("2006", BenchClass::Int, name, "x_base", &["000000"]),
            stats,
            suspect: Vec::new(),
        }
    }

    #[test]
    fn resolves_each_selector_kind() {
        let columns = resolve_columns(
            &[
                "performance_overhead_parallaft_vs_raft",
                "parallaft.overhead.energy",
                "base:timing.main_wall_time",
                "parallaft:timing.main_cpu_time",
            ],
            &no_groups(),
        )
        .unwrap();

        assert_eq!(
            columns,
            [
                Column::new(CrossDerived, PARALLAFT_OVERHEAD_PERF),
                Column::new(CrossDerived, RAFT_OVERHEAD_PERF),
                Column::new(CrossDerived, PARALLAFT_OVERHEAD_ENERGY),
                Column::new(ExperimentType::Base, MAIN_WALL_TIME),
                Column::new(ExperimentType::Parallaft, MAIN_CPU_TIME),
            ]
        );
        assert_eq!(columns[3].label(), "base:timing.main_wall_time");
    }

    #[test]
    fn rejects_bad_selectors() {
        let groups = no_groups();
        assert_eq!(
            resolve_columns(&["nonsense"], &groups),
            Err(ConfigError::InvalidSelector("nonsense".to_owned()))
        );
        assert_eq!(
            resolve_columns(&["bogus:timing.main_wall_time"], &groups),
            Err(ConfigError::UnknownExperimentType("bogus".to_owned()))
        );
        assert_eq!(
            resolve_columns(&["base:timing.nope"], &groups),
            Err(ConfigError::UnknownField("timing.nope".to_owned()))
        );
        assert_eq!(
            resolve_columns(&["base:raft.overhead.perf"], &groups),
            Err(ConfigError::UnknownField("raft.overhead.perf".to_owned()))
        );
        assert!(resolve_columns(&["derived:raft.overhead.perf"], &groups).is_ok());
    }

    #[test]
    fn user_groups() {
        let mut groups = no_groups();
        groups.insert(
            "wall".to_owned(),
            vec![
                "base:timing.main_wall_time".to_owned(),
                "raft.overhead.perf".to_owned(),
            ],
        );
        let columns = resolve_columns(&["wall"], &groups).unwrap();
        assert_eq!(
            columns,
            [
                Column::new(ExperimentType::Base, MAIN_WALL_TIME),
                Column::new(CrossDerived, RAFT_OVERHEAD_PERF),
            ]
        );

        groups.insert("outer".to_owned(), vec!["wall".to_owned()]);
        assert!(matches!(
            resolve_columns(&["wall"], &groups),
            Err(ConfigError::NestedGroup { .. })
        ));

        let mut shadowing = no_groups();
        shadowing.insert("energy_overhead_parallaft_vs_raft".to_owned(), vec![]);
        assert!(matches!(
            resolve_columns(&["base:timing.main_wall_time"], &shadowing),
            Err(ConfigError::ShadowedGroup(_))
        ));
    }

    #[test]
    fn projects_missing_as_none() {
        let results = [
            bench_stats(
                "400.perlbench",
                &[(CrossDerived, PARALLAFT_OVERHEAD_PERF, Value::Real(0.1))],
            ),
            bench_stats("401.bzip2", &[]),
        ];
        let columns = [Column::new(CrossDerived, PARALLAFT_OVERHEAD_PERF)];
        let table = project(&results, &columns, true);

        assert_eq!(table.rows[0].name, "perlbench");
        assert_eq!(table.rows[0].cells, [Some(Value::Real(0.1))]);
        assert_eq!(table.rows[1].cells, [None]);
    }

    #[test]
    fn geomean_row() {
        let results = [
            bench_stats("a", &[(CrossDerived, RAFT_OVERHEAD_PERF, Value::Real(0.1))]),
            bench_stats("b", &[(CrossDerived, RAFT_OVERHEAD_PERF, Value::Real(-0.05))]),
            bench_stats("c", &[(CrossDerived, RAFT_OVERHEAD_PERF, Value::Real(0.2))]),
        ];
        let columns = [
            Column::new(CrossDerived, RAFT_OVERHEAD_PERF),
            Column::new(CrossDerived, PARALLAFT_OVERHEAD_PERF),
        ];
        let mut table = project(&results, &columns, false);
        table.push_geomean();

        let last = table.rows.last().unwrap();
        assert_eq!(last.name, GEOMEAN_ROW);
        let Some(Value::Real(mean)) = last.cells[0] else {
            panic!("expected a real geomean");
        };
        assert!((mean - 0.0783).abs() < 1e-3);
        assert!(matches!(last.cells[1], Some(Value::Real(x)) if x.is_nan()));
    }

    #[test]
    fn renders_delimited_table() {
        let results = [bench_stats(
            "400.perlbench",
            &[
                (ExperimentType::Base, MAIN_WALL_TIME, Value::Real(0.5)),
                (ExperimentType::Base, "timing.exit_status", Value::Int(3)),
            ],
        )];
        let columns = [
            Column::new(ExperimentType::Base, MAIN_WALL_TIME),
            Column::new(ExperimentType::Base, "timing.exit_status"),
            Column::new(ExperimentType::Raft, MAIN_WALL_TIME),
        ];
        let table = project(&results, &columns, false);

        let mut buf = Vec::new();
        let opts = RenderOptions {
            separator: b';',
            scale: 100.0,
            precision: 2,
            ..Default::default()
        };
        write_table(&table, &opts, &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "name;base:timing.main_wall_time;base:timing.exit_status;raft:timing.main_wall_time\n\
             400.perlbench;50.00;3;nan\n"
        );

        let mut buf = Vec::new();
        let opts = RenderOptions {
            header: false,
            names: false,
            ..Default::default()
        };
        write_table(&table, &opts, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0.5000,3,nan\n");
    }

    #[test]
    fn renders_json() {
        let results = [bench_stats(
            "401.bzip2",
            &[(ExperimentType::Base, MAIN_WALL_TIME, Value::Real(2.0))],
        )];
        let columns = [
            Column::new(ExperimentType::Base, MAIN_WALL_TIME),
            Column::new(ExperimentType::Raft, MAIN_WALL_TIME),
        ];
        let table = project(&results, &columns, false);

        let mut buf = Vec::new();
        write_json(&table, &RenderOptions::default(), &mut buf).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "columns": ["base:timing.main_wall_time", "raft:timing.main_wall_time"],
                "rows": [{"name": "401.bzip2", "values": [2.0, null]}],
            })
        );
    }
}
