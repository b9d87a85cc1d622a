use common::bench::{
    BenchClass::{Fp, Int},
    Benchmark,
};

const SUITE: &str = "2006";

/// SPEC CPU2006 benchmarks in report order, with the hash of each sub-run
/// (one per reference input) that makes up a full execution.
pub static BENCHMARKS: &[Benchmark] = &[
    Benchmark::new(SUITE, Int, "400.perlbench", "perlbench_base", &["306b23", "53063c", "56f39e"]),
    Benchmark::new(
        SUITE,
        Int,
        "401.bzip2",
        "bzip2_base",
        &["3dfb44", "47607a", "5ff518", "8f5aa6", "c5113e", "cccaf4"],
    ),
    Benchmark::new(
        SUITE,
        Int,
        "403.gcc",
        "gcc_base",
        &["1bdfa0", "278dd0", "2a05b3", "35e1c1", "3f387c", "9587d2", "adcb6e", "e6e141", "f65744"],
    ),
    Benchmark::new(SUITE, Int, "429.mcf", "mcf_base", &["4fb2fd"]),
    Benchmark::new(
        SUITE,
        Int,
        "445.gobmk",
        "gobmk_base",
        &["2b07a7", "5dc95e", "cdeac7", "def92d", "e4d00b"],
    ),
    Benchmark::new(SUITE, Int, "456.hmmer", "hmmer_base", &["ced74f", "df0e1a"]),
    Benchmark::new(SUITE, Int, "458.sjeng", "sjeng_base", &["efbd59"]),
    Benchmark::new(SUITE, Int, "462.libquantum", "libquantum_base", &["654b4d"]),
    Benchmark::new(SUITE, Int, "464.h264ref", "h264ref_base", &["1aafff", "bb8834", "bcba84"]),
    Benchmark::new(SUITE, Int, "471.omnetpp", "omnetpp_base", &["ca5180"]),
    Benchmark::new(SUITE, Int, "473.astar", "astar_base", &["4a80b8", "ebff19"]),
    Benchmark::new(SUITE, Int, "483.xalancbmk", "Xalan_base", &["432258"]),
    Benchmark::new(SUITE, Fp, "410.bwaves", "bwaves_base", &["ee089e"]),
    Benchmark::new(SUITE, Fp, "416.gamess", "gamess_base", &["1ca871", "6bb65b", "94239b"]),
    Benchmark::new(SUITE, Fp, "433.milc", "milc_base", &["508240"]),
    Benchmark::new(SUITE, Fp, "434.zeusmp", "zeusmp_base", &["9e6de0"]),
    Benchmark::new(SUITE, Fp, "435.gromacs", "gromacs_base", &["a2d10f"]),
    Benchmark::new(SUITE, Fp, "436.cactusADM", "cactusADM_base", &["3b331e"]),
    Benchmark::new(SUITE, Fp, "437.leslie3d", "leslie3d_base", &["4641ab"]),
    Benchmark::new(SUITE, Fp, "444.namd", "namd_base", &["43248b"]),
    Benchmark::new(SUITE, Fp, "447.dealII", "dealII_base", &["c2a7d3"]),
    Benchmark::new(SUITE, Fp, "450.soplex", "soplex_base", &["a6be97", "c2a843"]),
    Benchmark::new(SUITE, Fp, "453.povray", "povray_base", &["9b539e"]),
    Benchmark::new(SUITE, Fp, "454.calculix", "calculix_base", &["3722a8"]),
    Benchmark::new(SUITE, Fp, "459.GemsFDTD", "GemsFDTD_base", &["29e55c"]),
    Benchmark::new(SUITE, Fp, "465.tonto", "tonto_base", &["9507e6"]),
    Benchmark::new(SUITE, Fp, "470.lbm", "lbm_base", &["e5f68a"]),
    Benchmark::new(SUITE, Fp, "481.wrf", "wrf_base", &["70336d"]),
    Benchmark::new(SUITE, Fp, "482.sphinx3", "sphinx_livepretend_base", &["3ab418"]),
];

pub fn find(name: &str) -> Option<&'static Benchmark> {
    BENCHMARKS
        .iter()
        .find(|b| b.name == name || b.short_name() == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_is_complete() {
        assert_eq!(BENCHMARKS.len(), 29);
        assert_eq!(BENCHMARKS.iter().filter(|b| b.class == Int).count(), 12);
        let names: HashSet<_> = BENCHMARKS.iter().map(|b| b.name).collect();
        assert_eq!(names.len(), BENCHMARKS.len());
        assert!(BENCHMARKS.iter().all(|b| !b.sub_runs.is_empty()));
    }

    #[test]
    fn find_by_either_name() {
        assert_eq!(find("403.gcc").unwrap().sub_runs.len(), 9);
        assert_eq!(find("xalancbmk").unwrap().file_stem, "Xalan_base");
        assert!(find("999.nope").is_none());
    }
}
