use tracing::{debug, warn};

use crate::{
    experiment::{
        ExperimentStats,
        ExperimentType::{self, Base, BasePerfCounters, Parallaft, Raft},
    },
    field::{
        ALL_WALL_TIME, FIELDS, HWMON_PREFIX, MAIN_SYS_TIME, MAIN_USER_TIME, MAIN_WALL_TIME, Value,
    },
    stat_map::AggregatedStats,
};

/// A value computed from the reduced fields of one experiment.
///
/// `compute` returns `None` when an input is absent, the field is then left
/// out rather than defaulted.
#[derive(Debug, Clone, Copy)]
pub struct DerivedField {
    pub name: &'static str,
    pub compute: fn(&AggregatedStats) -> Option<Value>,
}

/// A value comparing stats across experiments, stored under
/// [`ExperimentType::CrossDerived`].
#[derive(Debug, Clone, Copy)]
pub struct CrossExperimentField {
    pub name: &'static str,
    pub compute: fn(&ExperimentStats) -> Option<Value>,
}

pub const MAIN_CPU_TIME: &str = "timing.main_cpu_time";
pub const HWMON_ALL_ENERGY: &str = "hwmon.macsmc_hwmon.all_energy";

pub const PARALLAFT_OVERHEAD_PERF: &str = "parallaft.overhead.perf";
pub const PARALLAFT_OVERHEAD_RUNTIME_WORK: &str = "parallaft.overhead.perf.runtime_work";
pub const PARALLAFT_OVERHEAD_LAST_CHECKER_SYNC: &str = "parallaft.overhead.perf.last_checker_sync";
pub const PARALLAFT_OVERHEAD_RESOURCE_CONTENTION: &str =
    "parallaft.overhead.perf.resource_contention";
pub const PARALLAFT_OVERHEAD_FORK_AND_COW: &str = "parallaft.overhead.perf.fork_and_cow";
pub const PARALLAFT_OVERHEAD_ENERGY: &str = "parallaft.overhead.energy";
pub const RAFT_OVERHEAD_PERF: &str = "raft.overhead.perf";
pub const RAFT_OVERHEAD_ENERGY: &str = "raft.overhead.energy";

pub static DERIVED_FIELDS: &[DerivedField] = &[
    DerivedField {
        name: MAIN_CPU_TIME,
        compute: |stats| Some(Value::Real(stats.f64(MAIN_USER_TIME)? + stats.f64(MAIN_SYS_TIME)?)),
    },
    DerivedField {
        name: HWMON_ALL_ENERGY,
        compute: |stats| {
            FIELDS
                .iter()
                .filter(|f| f.name.starts_with(HWMON_PREFIX))
                .map(|f| stats.f64(f.name))
                .sum::<Option<f64>>()
                .map(Value::Real)
        },
    },
];

/// `(value - reference) / base`, missing when `base` is zero or not finite.
pub fn overhead(value: f64, reference: f64, base: f64) -> Option<Value> {
    if base == 0.0 || !base.is_finite() {
        return None;
    }
    Some(Value::Real((value - reference) / base))
}

pub static CROSS_EXPERIMENT_FIELDS: &[CrossExperimentField] = &[
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_PERF,
        compute: |s| {
            let base = s.f64(Base, MAIN_WALL_TIME)?;
            overhead(s.f64(Parallaft, ALL_WALL_TIME)?, base, base)
        },
    },
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_RUNTIME_WORK,
        compute: |s| {
            overhead(
                s.f64(Parallaft, MAIN_WALL_TIME)?,
                s.f64(Parallaft, MAIN_CPU_TIME)?,
                s.f64(Base, MAIN_WALL_TIME)?,
            )
        },
    },
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_LAST_CHECKER_SYNC,
        compute: |s| {
            overhead(
                s.f64(Parallaft, ALL_WALL_TIME)?,
                s.f64(Parallaft, MAIN_WALL_TIME)?,
                s.f64(Base, MAIN_WALL_TIME)?,
            )
        },
    },
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_RESOURCE_CONTENTION,
        compute: |s| {
            overhead(
                s.f64(Parallaft, MAIN_USER_TIME)?,
                s.f64(Base, MAIN_USER_TIME)?,
                s.f64(Base, MAIN_WALL_TIME)?,
            )
        },
    },
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_FORK_AND_COW,
        compute: |s| {
            overhead(
                s.f64(Parallaft, MAIN_SYS_TIME)?,
                s.f64(Base, MAIN_SYS_TIME)?,
                s.f64(Base, MAIN_WALL_TIME)?,
            )
        },
    },
    CrossExperimentField {
        name: PARALLAFT_OVERHEAD_ENERGY,
        compute: |s| {
            let base = s.f64(BasePerfCounters, HWMON_ALL_ENERGY)?;
            overhead(s.f64(Parallaft, HWMON_ALL_ENERGY)?, base, base)
        },
    },
    CrossExperimentField {
        name: RAFT_OVERHEAD_PERF,
        compute: |s| {
            let base = s.f64(Base, MAIN_WALL_TIME)?;
            overhead(s.f64(Raft, ALL_WALL_TIME)?, base, base)
        },
    },
    CrossExperimentField {
        name: RAFT_OVERHEAD_ENERGY,
        compute: |s| {
            let base = s.f64(BasePerfCounters, HWMON_ALL_ENERGY)?;
            overhead(s.f64(Raft, HWMON_ALL_ENERGY)?, base, base)
        },
    },
];

pub fn derived_field(name: &str) -> Option<&'static DerivedField> {
    DERIVED_FIELDS.iter().find(|f| f.name == name)
}

pub fn cross_experiment_field(name: &str) -> Option<&'static CrossExperimentField> {
    CROSS_EXPERIMENT_FIELDS.iter().find(|f| f.name == name)
}

/// First pass: extends one experiment's reduced stats with its derived fields.
pub fn apply_derived_fields(stats: &mut AggregatedStats) {
    for f in DERIVED_FIELDS {
        match (f.compute)(stats) {
            Some(value) => {
                if !stats.insert_new(f.name.to_owned(), value) {
                    warn!("Derived field {} already present, keeping raw value", f.name);
                }
            }
            None => debug!("Skipping derived field {}: missing input", f.name),
        }
    }
}

/// Second pass: runs after every experiment of a benchmark has been merged,
/// later fields may read earlier ones.
pub fn apply_cross_experiment_fields(stats: &mut ExperimentStats) {
    for f in CROSS_EXPERIMENT_FIELDS {
        match (f.compute)(stats) {
            Some(value) => {
                stats.insert_new((ExperimentType::CrossDerived, f.name.to_owned()), value);
            }
            None => debug!("Skipping cross-experiment field {}: missing input", f.name),
        }
    }
}

/// Re-keys one experiment's stats for merging into [`ExperimentStats`].
pub fn with_experiment_type(
    experiment: ExperimentType,
    stats: AggregatedStats,
) -> impl Iterator<Item = ((ExperimentType, String), Value)> {
    stats.into_iter().map(move |(k, v)| ((experiment, k), v))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn aggregated(pairs: &[(&str, f64)]) -> AggregatedStats {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), Value::Real(*v)))
            .collect()
    }

    #[test]
    fn derived_names_do_not_shadow_fields() {
        let mut names = HashSet::new();
        for name in FIELDS
            .iter()
            .map(|f| f.name)
            .chain(DERIVED_FIELDS.iter().map(|f| f.name))
            .chain(CROSS_EXPERIMENT_FIELDS.iter().map(|f| f.name))
        {
            assert!(names.insert(name), "duplicate field {name}");
        }
    }

    #[test]
    fn cpu_time_from_user_and_sys() {
        let mut stats = aggregated(&[(MAIN_USER_TIME, 3.0), (MAIN_SYS_TIME, 1.0)]);
        apply_derived_fields(&mut stats);
        assert_eq!(stats.f64(MAIN_CPU_TIME), Some(4.0));
        assert!(stats.value(HWMON_ALL_ENERGY).is_none());
    }

    #[test]
    fn derived_skipped_when_input_missing() {
        let mut stats = aggregated(&[(MAIN_USER_TIME, 3.0)]);
        apply_derived_fields(&mut stats);
        assert!(stats.value(MAIN_CPU_TIME).is_none());
        assert_eq!(stats.len(), 1);
    }

    #[test]
    fn energy_needs_every_sensor() {
        let sensors: Vec<_> = FIELDS
            .iter()
            .filter(|f| f.name.starts_with(HWMON_PREFIX))
            .map(|f| (f.name, 1.5))
            .collect();
        assert_eq!(sensors.len(), 6);

        let mut stats = aggregated(&sensors);
        apply_derived_fields(&mut stats);
        assert_eq!(stats.f64(HWMON_ALL_ENERGY), Some(9.0));

        let mut partial = aggregated(&sensors[1..]);
        apply_derived_fields(&mut partial);
        assert!(partial.value(HWMON_ALL_ENERGY).is_none());
    }

    #[test]
    fn derived_never_overwrites_raw() {
        let mut stats = aggregated(&[
            (MAIN_USER_TIME, 1.0),
            (MAIN_SYS_TIME, 1.0),
            (MAIN_CPU_TIME, 7.0),
        ]);
        apply_derived_fields(&mut stats);
        assert_eq!(stats.f64(MAIN_CPU_TIME), Some(7.0));
    }

    #[test]
    fn overhead_of_instrumented_wall_time() {
        let mut stats = ExperimentStats::new();
        stats.extend(with_experiment_type(
            Base,
            aggregated(&[(MAIN_WALL_TIME, 10.0)]),
        ));
        stats.extend(with_experiment_type(
            Parallaft,
            aggregated(&[(ALL_WALL_TIME, 15.0)]),
        ));
        apply_cross_experiment_fields(&mut stats);

        assert_eq!(
            stats.f64(ExperimentType::CrossDerived, PARALLAFT_OVERHEAD_PERF),
            Some(0.5)
        );
        assert!(
            stats
                .lookup(ExperimentType::CrossDerived, RAFT_OVERHEAD_PERF)
                .is_none()
        );
    }

    #[test]
    fn runtime_work_reads_derived_cpu_time() {
        let mut parallaft = aggregated(&[
            (MAIN_USER_TIME, 6.0),
            (MAIN_SYS_TIME, 2.0),
            (MAIN_WALL_TIME, 9.0),
        ]);
        apply_derived_fields(&mut parallaft);

        let mut stats = ExperimentStats::new();
        stats.extend(with_experiment_type(Base, aggregated(&[(MAIN_WALL_TIME, 4.0)])));
        stats.extend(with_experiment_type(Parallaft, parallaft));
        apply_cross_experiment_fields(&mut stats);

        assert_eq!(
            stats.f64(ExperimentType::CrossDerived, PARALLAFT_OVERHEAD_RUNTIME_WORK),
            Some(0.25)
        );
    }

    #[test]
    fn zero_base_is_missing() {
        assert_eq!(overhead(1.0, 0.0, 0.0), None);
        assert_eq!(overhead(1.0, 0.0, f64::NAN), None);
        assert_eq!(overhead(3.0, 2.0, 2.0), Some(Value::Real(0.5)));

        let mut stats = ExperimentStats::new();
        stats.extend(with_experiment_type(Base, aggregated(&[(MAIN_WALL_TIME, 0.0)])));
        stats.extend(with_experiment_type(Raft, aggregated(&[(ALL_WALL_TIME, 5.0)])));
        apply_cross_experiment_fields(&mut stats);
        assert_eq!(stats.len(), 2);
        assert!(
            stats
                .lookup(ExperimentType::CrossDerived, RAFT_OVERHEAD_PERF)
                .is_none()
        );
    }
}
