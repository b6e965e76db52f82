use std::num::NonZeroU16;
use std::path::PathBuf;

use clap::{Args, ValueHint};

/// Server configuration, parsed once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// The host address for the json-depot server.
    #[arg(
        long,
        value_name = "URI",
        value_hint = ValueHint::Hostname,
        default_value = "0.0.0.0",
        env = "JSON_DEPOT_HOST",
    )]
    pub host: String,
    /// The host port for the json-depot server.
    #[arg(
        short,
        long,
        value_name = "PORT",
        value_hint = ValueHint::Other,
        default_value = "3000",
        env = "PORT",
    )]
    pub port: NonZeroU16,
    /// Directory holding all json documents. Never searched recursively.
    #[arg(
        long,
        value_name = "DIR",
        value_hint = ValueHint::DirPath,
        default_value = ".",
        env = "JSON_DEPOT_DATA_DIR",
    )]
    pub data_dir: PathBuf,
    /// File name of the primary document, served under `/api/data`.
    #[arg(long, value_name = "FILE", default_value = "riot-output.json")]
    pub primary_file: String,
    /// File name of the secondary document, served under `/api/data2`.
    #[arg(long, value_name = "FILE", default_value = "riot-output-2.json")]
    pub secondary_file: String,
    /// Split documents are named `<SPLIT_BASE>_split_<n>.json`.
    #[arg(long, value_name = "NAME", default_value = "riot-output")]
    pub split_base: String,
}
