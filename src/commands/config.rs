//! `config` subcommand: writes a default configuration file.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        paths: Some(vec!["/user.slice".into(), "/system.slice".into()]),
        ..Default::default()
    };
    let output = output.unwrap_or_else(|| PathBuf::from("cgroup-exporter.yaml"));

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# cgroup Exporter Configuration
# =============================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"              # Bind IP (0.0.0.0 = all interfaces)
# port: 9306                   # HTTP port
#
# Collection
# ----------
# paths: [/user.slice]         # cgroup paths to collect (required)
# cgroup_root: /sys/fs/cgroup  # Root path to cgroup fs
# proc_root: /proc             # Root path to proc fs
# collect_proc: false          # Count executables per cgroup
# collect_proc_max_exec: 100   # Max executable path length before truncation
# torque_prefix: /torque       # cgroup prefix of Torque jobs (v1)
# cgroup_version: auto         # auto, v1 or v2
# parallelism: null            # Collection threads (null = auto)
#
# Feature Flags
# -------------
# enable_exporter_metrics: true # Export cgroup_exporter_* metrics
# enable_health: true          # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}
