use std::{
    fs::File,
    io::{BufWriter, Write, stdout},
    path::{Path, PathBuf},
};

use common::{
    bench::{Benchmark, ResultDir},
    collect::{BenchmarkStats, collect_benchmark},
    experiment::ExperimentType,
    report::{RenderOptions, Table, write_json, write_table},
};
use eyre::{Context, ContextCompat, Result};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, warn};

/// Benchmarks to report on, the whole catalog unless `names` narrows it.
pub fn select_benchmarks(names: &[String]) -> Result<Vec<Benchmark>> {
    if names.is_empty() {
        return Ok(spec06::BENCHMARKS.to_vec());
    }
    let mut selected = names
        .iter()
        .map(|name| spec06::find(name).context(format!("Unknown benchmark {name}")))
        .collect::<Result<Vec<_>>>()?;
    selected.sort_by_key(|b| {
        spec06::BENCHMARKS
            .iter()
            .position(|x| x.name == b.name)
            .unwrap_or(usize::MAX)
    });
    selected.dedup_by_key(|b| b.name);
    Ok(selected.into_iter().copied().collect())
}

/// Collects every benchmark in parallel, results come back in catalog order.
pub fn collect_all(
    benches: &[Benchmark],
    experiments: &[(ExperimentType, PathBuf)],
    label: &str,
) -> Result<Vec<BenchmarkStats>> {
    let experiments = experiments
        .iter()
        .map(|(experiment, dir)| {
            debug!("{experiment} -> {dir:?}");
            (*experiment, ResultDir::open(dir, label))
        })
        .collect::<Vec<_>>();

    let results = benches
        .par_iter()
        .map(|bench| collect_benchmark(bench, &experiments))
        .collect::<Result<Vec<_>>>()?;

    let suspect = results.iter().filter(|r| !r.is_valid()).count();
    if suspect > 0 {
        warn!("{suspect} benchmarks have results failing validity checks");
    }
    Ok(results)
}

pub fn write_report(
    table: &Table,
    opts: &RenderOptions,
    json: bool,
    output: Option<&Path>,
) -> Result<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context(format!("Creating output file {path:?}"))?,
        )),
        None => Box::new(stdout().lock()),
    };

    if json {
        write_json(table, opts, writer)
    } else {
        write_table(table, opts, writer)
    }
}
