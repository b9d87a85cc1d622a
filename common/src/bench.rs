use std::{
    fs::read_dir,
    path::{Path, PathBuf},
};

use eyre::Result;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BenchClass {
    Int,
    Fp,
}

/// A catalogued benchmark and the sub-runs that make up one execution of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Benchmark {
    pub suite: &'static str,
    pub class: BenchClass,
    pub name: &'static str,
    /// Stem of the result file names, ie. `perlbench_base`
    pub file_stem: &'static str,
    pub sub_runs: &'static [&'static str],
}

impl Benchmark {
    pub const fn new(
        suite: &'static str,
        class: BenchClass,
        name: &'static str,
        file_stem: &'static str,
        sub_runs: &'static [&'static str],
    ) -> Self {
        Self {
            suite,
            class,
            name,
            file_stem,
            sub_runs,
        }
    }

    /// Name without the leading benchmark number, `400.perlbench` -> `perlbench`
    pub fn short_name(&self) -> &'static str {
        match self.name.split_once('.') {
            Some((_, name)) => name,
            None => self.name,
        }
    }
}

/// The `result/` directory of one experiment, listed once up front.
#[derive(Debug, Clone)]
pub struct ResultDir {
    root: PathBuf,
    label: String,
    entries: Vec<String>,
}

impl ResultDir {
    /// Lists `<dir>/result`. A directory that cannot be read yields no
    /// entries, so every benchmark of the experiment comes out empty.
    pub fn open(dir: &Path, label: &str) -> Self {
        let root = dir.join("result");
        let mut entries = match read_dir(&root) {
            Ok(items) => items
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect::<Vec<_>>(),
            Err(err) => {
                warn!("Could not list {root:?}: {err}");
                Vec::new()
            }
        };
        entries.sort();
        debug!("{} entries in {root:?}", entries.len());

        Self {
            root,
            label: label.to_owned(),
            entries,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files for each sub-run of `bench`, in catalog order.
    ///
    /// Files are named `<sub-run>-<file stem>.<label>*.stats.txt`. Returns
    /// `None` if any sub-run has no file.
    pub fn sub_run_files(&self, bench: &Benchmark) -> Result<Option<Vec<PathBuf>>> {
        let mut files = Vec::with_capacity(bench.sub_runs.len());
        for sub_run in bench.sub_runs {
            let pattern = Regex::new(&format!(
                r"^{}-{}\.{}.*\.stats\.txt$",
                regex::escape(sub_run),
                regex::escape(bench.file_stem),
                regex::escape(&self.label),
            ))?;

            let mut matches = self.entries.iter().filter(|x| pattern.is_match(x));
            let Some(first) = matches.next() else {
                debug!("No result for {} sub-run {sub_run} in {:?}", bench.name, self.root);
                return Ok(None);
            };
            if matches.next().is_some() {
                warn!(
                    "Several results for {} sub-run {sub_run} in {:?}, using {first}",
                    bench.name, self.root
                );
            }
            files.push(self.root.join(first));
        }
        Ok(Some(files))
    }
}
