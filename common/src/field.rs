use core::fmt;
use std::{collections::HashMap, sync::LazyLock};

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReduceError {
    #[error("Type mismatch in {field}: cannot fold {value:?} into {acc:?}")]
    TypeMismatch {
        field: &'static str,
        value: Value,
        acc: Accumulator,
    },
    #[error("Weight field {weight} missing for {field}")]
    MissingWeight {
        field: &'static str,
        weight: &'static str,
    },
    #[error("Weight field {weight} for {field} is not a non-negative integer: {value:?}")]
    InvalidWeight {
        field: &'static str,
        weight: &'static str,
        value: Value,
    },
    #[error("Integer overflow while summing {field}")]
    Overflow { field: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Unknown field: {0}")]
    Unknown(String),
}

/// A single measurement, either coerced through a registered field's type or
/// kept verbatim for keys the registry does not know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(x) => Some(*x as f64),
            Value::Real(x) => Some(*x),
            Value::Bool(_) | Value::Text(_) => None,
        }
    }
}

/// Booleans print lowercase, `true` or `false`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(x) => write!(f, "{x}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Bool(x) => write!(f, "{x}"),
            Value::Text(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Real,
    /// `true` iff the raw text is exactly `true`
    Bool,
}

impl FieldKind {
    /// Coerces the raw right hand side of a `key=value` line.
    pub fn parse(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            FieldKind::Int => raw.parse().ok().map(Value::Int),
            FieldKind::Real => raw.parse().ok().map(Value::Real),
            FieldKind::Bool => Some(Value::Bool(raw == "true")),
        }
    }
}

/// Running state of a reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accumulator {
    /// Nothing folded yet, the first value is taken as-is
    Unset,
    Int(i64),
    Real(f64),
    Bool(bool),
    Weighted { mean: f64, weight: i64 },
}

impl Accumulator {
    /// The reduced value this state stands for, `None` before the first fold
    /// or while a weighted average has seen no weight at all.
    pub fn value(&self) -> Option<Value> {
        match *self {
            Accumulator::Unset | Accumulator::Weighted { weight: 0, .. } => None,
            Accumulator::Int(x) => Some(Value::Int(x)),
            Accumulator::Real(x) => Some(Value::Real(x)),
            Accumulator::Bool(x) => Some(Value::Bool(x)),
            Accumulator::Weighted { mean, .. } => Some(Value::Real(mean)),
        }
    }
}

/// Resolves a sibling field of the sub-run currently being folded.
pub type FieldLookup<'a> = &'a dyn Fn(&str) -> Option<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Max,
    /// Merges per sub-run means, weighting each by the integer field `weight`
    /// of the same sub-run.
    WeightedAverage {
        weight: &'static str,
    },
    /// Logical AND, for validity flags
    All,
}

impl Reducer {
    pub fn reduce(
        &self,
        field: &'static str,
        value: &Value,
        acc: Accumulator,
        lookup: FieldLookup<'_>,
    ) -> Result<Accumulator, ReduceError> {
        let mismatch = || ReduceError::TypeMismatch {
            field,
            value: value.clone(),
            acc,
        };

        match (self, acc, value) {
            (Reducer::Sum, Accumulator::Int(a), Value::Int(x)) => a
                .checked_add(*x)
                .map(Accumulator::Int)
                .ok_or(ReduceError::Overflow { field }),
            (Reducer::Sum, Accumulator::Real(a), Value::Real(x)) => Ok(Accumulator::Real(a + x)),

            (Reducer::Max, Accumulator::Unset, Value::Int(x)) => Ok(Accumulator::Int(*x)),
            (Reducer::Max, Accumulator::Unset, Value::Real(x)) => Ok(Accumulator::Real(*x)),
            (Reducer::Max, Accumulator::Int(a), Value::Int(x)) => Ok(Accumulator::Int(a.max(*x))),
            (Reducer::Max, Accumulator::Real(a), Value::Real(x)) => {
                Ok(Accumulator::Real(a.max(*x)))
            }

            (Reducer::All, Accumulator::Bool(a), Value::Bool(x)) => Ok(Accumulator::Bool(a && *x)),

            (Reducer::WeightedAverage { weight }, Accumulator::Weighted { mean, weight: prev }, _) => {
                let weight = *weight;
                let x = value.as_f64().ok_or_else(mismatch)?;
                let cur = match lookup(weight) {
                    Some(Value::Int(w)) if w >= 0 => w,
                    Some(other) => {
                        return Err(ReduceError::InvalidWeight {
                            field,
                            weight,
                            value: other,
                        });
                    }
                    None => return Err(ReduceError::MissingWeight { field, weight }),
                };
                let total = prev.checked_add(cur).ok_or(ReduceError::Overflow { field })?;
                if total == 0 {
                    return Ok(acc);
                }
                let (prev_frac, cur_frac) = (prev as f64 / total as f64, cur as f64 / total as f64);
                Ok(Accumulator::Weighted {
                    mean: mean * prev_frac + x * cur_frac,
                    weight: total,
                })
            }

            _ => Err(mismatch()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Always,
    /// Valid iff the reduced integer equals this code
    Code(i64),
    /// Valid iff the reduced flag is set
    Flag,
}

impl Validity {
    pub fn check(&self, value: &Value) -> bool {
        match (self, value) {
            (Validity::Always, _) => true,
            (Validity::Code(code), Value::Int(x)) => x == code,
            (Validity::Flag, Value::Bool(x)) => *x,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub reducer: Reducer,
    pub validity: Validity,
}

impl Field {
    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            reducer: Reducer::Sum,
            validity: Validity::Always,
        }
    }

    const fn int(name: &'static str) -> Self {
        Self::new(name, FieldKind::Int)
    }

    const fn real(name: &'static str) -> Self {
        Self::new(name, FieldKind::Real)
    }

    const fn max(mut self) -> Self {
        self.reducer = Reducer::Max;
        self
    }

    const fn weighted_by(mut self, weight: &'static str) -> Self {
        self.reducer = Reducer::WeightedAverage { weight };
        self
    }

    const fn valid_if(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    /// Accumulator before the first sub-run is folded in.
    ///
    /// Max starts unset rather than at zero, so an exit status that is
    /// negative in every sub-run is reported as is instead of as `0`.
    pub fn initial(&self) -> Accumulator {
        match (self.reducer, self.kind) {
            (Reducer::Max, _) => Accumulator::Unset,
            (Reducer::WeightedAverage { .. }, _) => Accumulator::Weighted {
                mean: 0.0,
                weight: 0,
            },
            (Reducer::All, _) => Accumulator::Bool(true),
            (Reducer::Sum, FieldKind::Int) => Accumulator::Int(0),
            (Reducer::Sum, FieldKind::Real) => Accumulator::Real(0.0),
            (Reducer::Sum, FieldKind::Bool) => Accumulator::Unset,
        }
    }

    pub fn reduce(
        &self,
        value: &Value,
        acc: Accumulator,
        lookup: FieldLookup<'_>,
    ) -> Result<Accumulator, ReduceError> {
        self.reducer.reduce(self.name, value, acc, lookup)
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validity.check(value)
    }
}

pub const MAIN_USER_TIME: &str = "timing.main_user_time";
pub const MAIN_SYS_TIME: &str = "timing.main_sys_time";
pub const MAIN_WALL_TIME: &str = "timing.main_wall_time";
pub const ALL_WALL_TIME: &str = "timing.all_wall_time";
pub const EXIT_STATUS: &str = "timing.exit_status";
pub const MEMORY_NUM_SAMPLES: &str = "memory.num_samples";
pub const HWMON_PREFIX: &str = "hwmon.macsmc_hwmon/";
pub const HWMON_IS_OK: &str = "hwmon.is_ok";

/// Every raw field the collector knows, in report order.
pub static FIELDS: &[Field] = &[
    Field::real(MAIN_USER_TIME),
    Field::real(MAIN_SYS_TIME),
    Field::real("timing.checker_user_time"),
    Field::real("timing.checker_sys_time"),
    Field::real(MAIN_WALL_TIME),
    Field::real(ALL_WALL_TIME),
    Field::int(EXIT_STATUS).max().valid_if(Validity::Code(0)),
    Field::int("counter.checkpoint_count"),
    Field::int("counter.syscall_count"),
    Field::int("perf.llc_loads"),
    Field::int("perf.llc_load_misses"),
    Field::int("perf.llc_stores"),
    Field::int("perf.llc_store_misses"),
    Field::int("perf.dtlb_loads"),
    Field::int("perf.dtlb_load_misses"),
    Field::int("perf.dtlb_stores"),
    Field::int("perf.dtlb_store_misses"),
    Field::int("perf.instructions"),
    Field::int("perf.energy_pkg"),
    Field::int("perf.energy_cores"),
    Field::int("dirty_pages.total_dirty_pages"),
    Field::int(MEMORY_NUM_SAMPLES),
    Field::real("memory.pss_average").weighted_by(MEMORY_NUM_SAMPLES),
    Field::int("memory.pss_peak").max(),
    Field::real("memory.checkpoint_private_dirty_average").weighted_by(MEMORY_NUM_SAMPLES),
    Field::int("memory.checkpoint_private_dirty_peak").max(),
    Field::real("memory.working_set_upper_lim_average").weighted_by(MEMORY_NUM_SAMPLES),
    Field::int("memory.working_set_upper_lim_peak").max(),
    Field::real("timing.main_syscall_entry_handling_time"),
    Field::real("timing.main_signal_handling_time"),
    Field::real("timing.main_syscall_exit_handling_time"),
    Field::real("timing.main_checkpointing_time"),
    Field::real("timing.main_checkpointing_forking_time"),
    Field::real("timing.main_throttling_time"),
    Field::real("timing.shell_user_time"),
    Field::real("timing.shell_sys_time"),
    Field::real("hwmon.macsmc_hwmon/CPU P-cores Power"),
    Field::real("hwmon.macsmc_hwmon/CPU SRAM 1 Power"),
    Field::real("hwmon.macsmc_hwmon/DRAM VDD2H Power"),
    Field::real("hwmon.macsmc_hwmon/SoC Power"),
    Field::real("hwmon.macsmc_hwmon/CPU E-cores Power"),
    Field::real("hwmon.macsmc_hwmon/CPU SRAM 2 Power"),
    Field {
        name: HWMON_IS_OK,
        kind: FieldKind::Bool,
        reducer: Reducer::All,
        validity: Validity::Flag,
    },
];

static FIELD_INDEX: LazyLock<HashMap<&'static str, &'static Field>> =
    LazyLock::new(|| FIELDS.iter().map(|f| (f.name, f)).collect());

pub fn lookup(name: &str) -> Result<&'static Field, FieldError> {
    FIELD_INDEX
        .get(name)
        .copied()
        .ok_or_else(|| FieldError::Unknown(name.to_owned()))
}

pub fn get(name: &str) -> Option<&'static Field> {
    FIELD_INDEX.get(name).copied()
}
