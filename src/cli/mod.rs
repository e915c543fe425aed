//! CLI subcommand implementations for the merchwatch binary.

pub mod doctor;
pub mod merge_cmd;
pub mod output;
pub mod parse_cmd;
pub mod probe_cmd;
pub mod scrape_cmd;
