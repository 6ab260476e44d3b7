//! CLI arguments and subcommands for cgroup-exporter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "cgroup-exporter",
    about = "Prometheus exporter for cgroup CPU, memory and swap metrics",
    long_about = "Prometheus exporter for cgroup CPU, memory and swap metrics.\n\n\
                  Collects per-group accounting from cgroup v1 or v2 hierarchies, \
                  reduces processes to user slices, SLURM/Torque jobs and services, \
                  and optionally counts the executables running in each group.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Comma separated list of cgroup paths, eg /user.slice,/system.slice,/slurm
    #[arg(long)]
    pub paths: Option<String>,

    /// Root path to cgroup fs
    #[arg(long)]
    pub cgroup_root: Option<PathBuf>,

    /// Root path to proc fs
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Count the executables of each cgroup's processes
    #[arg(long)]
    pub collect_proc: bool,

    /// Max length of process executable to record
    #[arg(long)]
    pub collect_proc_max_exec: Option<usize>,

    /// cgroup prefix of Torque jobs (v1)
    #[arg(long)]
    pub torque_prefix: Option<String>,

    /// cgroup hierarchy: auto, v1 or v2
    #[arg(long)]
    pub cgroup_version: Option<String>,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Disable internal cgroup_exporter_* metrics
    #[arg(long)]
    pub disable_exporter_metrics: bool,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Test metrics collection
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Show per-group details
        #[arg(long)]
        verbose: bool,

        /// Print records as JSON, YAML or TOML instead of a summary
        #[arg(long, value_enum)]
        format: Option<ConfigFormat>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand() {
        let args = Args::parse_from(["cgroup-exporter", "--paths", "/slurm", "test", "-n", "3"]);
        assert_eq!(args.paths.as_deref(), Some("/slurm"));
        match args.command {
            Some(Commands::Test { iterations, verbose, format }) => {
                assert_eq!(iterations, 3);
                assert!(!verbose);
                assert!(format.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_test_command_accepts_toml() {
        let args = Args::parse_from(["cgroup-exporter", "test", "--format", "toml"]);
        match args.command {
            Some(Commands::Test { format, .. }) => {
                assert!(matches!(format, Some(ConfigFormat::Toml)));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_log_level_names() {
        let args = Args::parse_from(["cgroup-exporter", "--log-level", "debug"]);
        assert_eq!(args.log_level.map(|l| l.as_str()), Some("debug"));
    }
}
