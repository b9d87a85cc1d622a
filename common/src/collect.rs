use eyre::Result;
use tracing::{debug, warn};

use crate::{
    bench::{Benchmark, ResultDir},
    derived::{apply_cross_experiment_fields, apply_derived_fields, with_experiment_type},
    experiment::{ExperimentStats, ExperimentType},
    stat_map::AggregatedStats,
    stats::{invalid_fields, reduce_many},
};

/// Everything known about one benchmark across the requested experiments.
#[derive(Debug, Clone)]
pub struct BenchmarkStats {
    pub benchmark: Benchmark,
    pub stats: ExperimentStats,
    /// Fields whose reduced value failed their validity check
    pub suspect: Vec<(ExperimentType, &'static str)>,
}

impl BenchmarkStats {
    pub fn is_valid(&self) -> bool {
        self.suspect.is_empty()
    }
}

/// Reduces a single experiment of `bench` and runs the derived pass over it.
///
/// Missing or unreadable sub-run files leave the experiment empty.
pub fn collect_experiment(bench: &Benchmark, results: &ResultDir) -> Result<AggregatedStats> {
    let Some(files) = results.sub_run_files(bench)? else {
        debug!("Incomplete sub-runs for {} in {:?}", bench.name, results.root());
        return Ok(AggregatedStats::new());
    };

    let mut stats = match reduce_many(&files) {
        Ok(stats) => stats,
        Err(err) => {
            warn!("Discarding {} in {:?}: {err}", bench.name, results.root());
            return Ok(AggregatedStats::new());
        }
    };
    apply_derived_fields(&mut stats);
    Ok(stats)
}

/// Collects `bench` under every experiment in `experiments` and then adds the
/// cross-experiment fields.
pub fn collect_benchmark(
    bench: &Benchmark,
    experiments: &[(ExperimentType, ResultDir)],
) -> Result<BenchmarkStats> {
    let mut stats = ExperimentStats::new();
    let mut suspect = Vec::new();

    for (experiment, results) in experiments {
        let aggregated = collect_experiment(bench, results)?;
        for name in invalid_fields(&aggregated) {
            warn!("{} has invalid {name} under {experiment}", bench.name);
            suspect.push((*experiment, name));
        }
        stats.extend(with_experiment_type(*experiment, aggregated));
    }
    apply_cross_experiment_fields(&mut stats);

    Ok(BenchmarkStats {
        benchmark: *bench,
        stats,
        suspect,
    })
}
