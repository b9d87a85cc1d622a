use std::path::PathBuf;

use clap::Parser;
use common::{
    config::{ReportConfig, parse_separator},
    experiment::ExperimentType,
    report::{RenderOptions, resolve_columns},
};
use eyre::{Context, Result};
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod collect;

/// Aggregate per sub-run benchmark stats into a report
#[derive(Parser)]
struct Cli {
    /// `<exp_type>:<field_name>`, a cross-experiment field or a field group
    #[arg(required = true)]
    fields: Vec<String>,
    /// Do not print the header row
    #[arg(long, default_value_t = false)]
    no_header: bool,
    /// Do not print benchmark names
    #[arg(long, default_value_t = false)]
    no_names: bool,
    /// Strip the benchmark number, ie. `perlbench` for `400.perlbench`
    #[arg(long, default_value_t = false)]
    no_bench_number: bool,
    /// Cell separator, a single ASCII character such as `,`, `;` or a tab
    #[arg(long, default_value = ",")]
    sep: String,
    /// Write to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    /// Multiplies every real value
    #[arg(long, default_value_t = 1.0)]
    scale: f64,
    /// Append the geometric mean of `1 + value` over all benchmarks, minus one
    #[arg(long, default_value_t = false)]
    geomean: bool,
    /// Emit JSON instead of delimited text
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Digits after the decimal point
    #[arg(long)]
    precision: Option<usize>,
    /// Suite tag in result file names
    #[arg(long)]
    label: Option<String>,
    /// Only report these benchmarks, by full or short name
    #[arg(long = "bench")]
    benches: Vec<String>,
    /// YAML report config
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    base: Option<PathBuf>,
    #[arg(long = "base_perf_counters")]
    base_perf_counters: Option<PathBuf>,
    #[arg(long)]
    parallaft: Option<PathBuf>,
    #[arg(long)]
    raft: Option<PathBuf>,
    /// Extra tracing directives
    #[arg(short, long)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Merges the command line over the config file.
    fn report_config(&self) -> Result<ReportConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .context(format!("Reading config file {path:?}"))?;
                serde_yml::from_str(&contents).context("Parsing config file")?
            }
            None => ReportConfig::default(),
        };

        let dirs = [
            (ExperimentType::Base, &self.base),
            (ExperimentType::BasePerfCounters, &self.base_perf_counters),
            (ExperimentType::Parallaft, &self.parallaft),
            (ExperimentType::Raft, &self.raft),
        ];
        for (experiment, dir) in dirs {
            if let Some(dir) = dir {
                config.experiments.insert(experiment, dir.clone());
            }
        }
        if self.label.is_some() {
            config.label = self.label.clone();
        }
        if self.precision.is_some() {
            config.precision = self.precision;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();

    let mut env_filter = EnvFilter::new(format!("collect_stats={log_level},common={log_level}"));
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    let (file_layer, _guard) = match &args.log_file {
        Some(path) => {
            let file = std::fs::File::create(path).context(format!("Creating log file {path:?}"))?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (
                Some(layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(file_layer)
        .init();

    if let Err(err) = run(&args) {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

fn run(args: &Cli) -> Result<()> {
    let config = args.report_config()?;
    let columns = resolve_columns(args.fields.as_slice(), &config.groups)?;
    let experiments = config.experiment_dirs()?;
    let opts = RenderOptions {
        header: !args.no_header,
        names: !args.no_names,
        separator: parse_separator(&args.sep)?,
        scale: args.scale,
        precision: config.precision(),
    };
    let benches = collect::select_benchmarks(&args.benches)?;

    let results = collect::collect_all(&benches, &experiments, config.label())?;
    let mut table = common::report::project(&results, &columns, args.no_bench_number);
    if args.geomean {
        table.push_geomean();
    }

    collect::write_report(&table, &opts, args.json, args.output.as_deref())
}
