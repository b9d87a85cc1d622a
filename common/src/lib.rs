pub mod bench;
pub mod collect;
pub mod config;
pub mod derived;
pub mod experiment;
pub mod field;
pub mod report;
pub mod stat_map;
pub mod stats;
pub mod util;
