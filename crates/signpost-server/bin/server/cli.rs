use clap::Parser;
use signpost_server::telemetry::LogFormat;
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "SIGNPOST_CONFIG";
pub const LOG_FORMAT_ENV: &str = "SIGNPOST_LOG_FORMAT";

#[derive(Debug, Parser)]
#[command(name = "signpost", version, about = "Cache-aside URL redirect service")]
pub struct Cli {
    /// Path to the `name = value` configuration file.
    #[arg(env = CONFIG_PATH_ENV)]
    pub config: PathBuf,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}
