//! Configuration loading, merging and validation.
//!
//! Effective configuration is built as CLI > config file > defaults. Config
//! files may be YAML (default), JSON or TOML, selected by file extension.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use cgroup_exporter::collector::{
    CollectorConfig, HierarchyMode, DEFAULT_CGROUP_ROOT, DEFAULT_MAX_EXEC_LEN, DEFAULT_PROC_ROOT,
    DEFAULT_TORQUE_PREFIX,
};

use crate::cli::{Args, ConfigFormat};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9306;

/// Exporter configuration as read from file and CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Collection
    /// cgroup paths to collect, e.g. `/user.slice`, `/system.slice`, `/slurm`
    pub paths: Option<Vec<String>>,
    #[serde(alias = "cgroup-root")]
    pub cgroup_root: Option<PathBuf>,
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "collect-proc")]
    pub collect_proc: Option<bool>,
    #[serde(alias = "collect-proc-max-exec")]
    pub collect_proc_max_exec: Option<usize>,
    #[serde(alias = "torque-prefix")]
    pub torque_prefix: Option<String>,
    /// "auto" | "v1" | "v2"
    #[serde(alias = "cgroup-version")]
    pub cgroup_version: Option<String>,
    pub parallelism: Option<usize>,

    // Feature flags
    pub enable_exporter_metrics: Option<bool>,
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            paths: None,
            cgroup_root: Some(PathBuf::from(DEFAULT_CGROUP_ROOT)),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            collect_proc: Some(false),
            collect_proc_max_exec: Some(DEFAULT_MAX_EXEC_LEN),
            torque_prefix: Some(DEFAULT_TORQUE_PREFIX.to_string()),
            cgroup_version: Some("auto".into()),
            parallelism: None,
            enable_exporter_metrics: Some(true),
            enable_health: Some(true),
            log_level: Some("info".into()),
        }
    }
}

impl Config {
    /// Configured cgroup paths, empty when none are set.
    pub fn paths(&self) -> Vec<String> {
        self.paths.clone().unwrap_or_default()
    }

    /// Parses `cgroup_version` into a hierarchy selection.
    pub fn hierarchy(&self) -> Result<HierarchyMode, String> {
        match self.cgroup_version.as_deref().unwrap_or("auto") {
            "auto" => Ok(HierarchyMode::Auto),
            "v1" => Ok(HierarchyMode::V1),
            "v2" => Ok(HierarchyMode::V2),
            other => Err(format!(
                "Invalid cgroup_version '{}', expected 'auto', 'v1' or 'v2'",
                other
            )),
        }
    }

    /// Engine settings derived from the effective configuration.
    pub fn collector_config(&self) -> CollectorConfig {
        let defaults = CollectorConfig::default();
        CollectorConfig {
            cgroup_root: self.cgroup_root.clone().unwrap_or(defaults.cgroup_root),
            proc_root: self.proc_root.clone().unwrap_or(defaults.proc_root),
            collect_proc: self.collect_proc.unwrap_or(defaults.collect_proc),
            collect_proc_max_exec: self
                .collect_proc_max_exec
                .unwrap_or(defaults.collect_proc_max_exec),
            torque_prefix: self.torque_prefix.clone().unwrap_or(defaults.torque_prefix),
            hierarchy: self.hierarchy().unwrap_or_default(),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let paths = cfg.paths();
    if paths.is_empty() {
        return Err("No cgroup paths configured, set 'paths' or --paths".into());
    }
    if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
        return Err(format!("cgroup path '{}' must start with '/'", bad).into());
    }

    for (name, root) in [("cgroup_root", &cfg.cgroup_root), ("proc_root", &cfg.proc_root)] {
        if let Some(root) = root {
            if !root.is_absolute() {
                return Err(format!("{} '{}' must be an absolute path", name, root.display()).into());
            }
        }
    }

    if cfg.collect_proc_max_exec == Some(0) {
        return Err("collect_proc_max_exec must be greater than 0".into());
    }

    cfg.hierarchy()?;

    if let Some(level) = cfg.log_level.as_deref() {
        if !matches!(level, "off" | "error" | "warn" | "info" | "debug" | "trace") {
            return Err(format!("Invalid log_level '{}'", level).into());
        }
    }

    Ok(())
}

/// Builds the effective configuration from config file and CLI arguments.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(port) = args.port {
        config.port = Some(port);
    }

    // Parse comma-separated paths
    if let Some(paths) = &args.paths {
        config.paths = Some(
            paths
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }

    if let Some(root) = &args.cgroup_root {
        config.cgroup_root = Some(root.clone());
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if args.collect_proc {
        config.collect_proc = Some(true);
    }
    if let Some(n) = args.collect_proc_max_exec {
        config.collect_proc_max_exec = Some(n);
    }
    if let Some(prefix) = &args.torque_prefix {
        config.torque_prefix = Some(prefix.clone());
    }
    if let Some(version) = &args.cgroup_version {
        config.cgroup_version = Some(version.clone());
    }
    if let Some(n) = args.parallelism {
        config.parallelism = Some(n);
    }

    // Feature flags
    if args.disable_exporter_metrics {
        config.enable_exporter_metrics = Some(false);
    }
    if args.disable_health {
        config.enable_health = Some(false);
    }

    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    Ok(config)
}

/// Loads a config file, or the first existing default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/cgroup-exporter/config.yaml",
                "/etc/cgroup-exporter/config.yml",
                "/etc/cgroup-exporter/config.json",
                "./cgroup-exporter.yaml",
                "./cgroup-exporter.yml",
                "./cgroup-exporter.json",
            ];
            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Serializes a config in the requested format.
pub fn render_config(config: &Config, format: &ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: &ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn valid() -> Config {
        Config {
            paths: Some(vec!["/user.slice".into(), "/slurm".into()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.port, Some(9306));
        assert_eq!(cfg.collect_proc_max_exec, Some(100));
        let collector = cfg.collector_config();
        assert_eq!(collector.cgroup_root, PathBuf::from("/sys/fs/cgroup"));
        assert_eq!(collector.torque_prefix, "/torque");
        assert!(!collector.collect_proc);
    }

    #[test]
    fn test_validate() {
        assert!(validate_effective_config(&valid()).is_ok());
        assert!(validate_effective_config(&Config::default()).is_err());

        let relative = Config {
            cgroup_root: Some(PathBuf::from("sys/fs/cgroup")),
            ..valid()
        };
        assert!(validate_effective_config(&relative).is_err());

        let zero = Config {
            collect_proc_max_exec: Some(0),
            ..valid()
        };
        assert!(validate_effective_config(&zero).is_err());

        let version = Config {
            cgroup_version: Some("v3".into()),
            ..valid()
        };
        assert!(validate_effective_config(&version).is_err());
    }

    #[test]
    fn test_parse_formats() {
        let yaml = "paths:\n  - /user.slice\ncollect_proc: true\ncgroup_version: v2\n";
        let cfg = parse_config(yaml, Path::new("c.yaml")).unwrap();
        assert_eq!(cfg.paths(), vec!["/user.slice"]);
        assert_eq!(cfg.collect_proc, Some(true));
        assert_eq!(cfg.hierarchy().unwrap(), HierarchyMode::V2);
        // Fields absent from the file stay unset
        assert_eq!(cfg.port, None);

        let json = r#"{"paths": ["/slurm"], "port": 9999}"#;
        let cfg = parse_config(json, Path::new("c.json")).unwrap();
        assert_eq!(cfg.port, Some(9999));

        let toml = "paths = [\"/system.slice\"]\ntorque_prefix = \"/pbs\"\n";
        let cfg = parse_config(toml, Path::new("c.toml")).unwrap();
        assert_eq!(cfg.torque_prefix.as_deref(), Some("/pbs"));
    }

    #[test]
    fn test_resolve_cli_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cgroup-exporter.yaml");
        fs::write(&path, "paths: [/user.slice]\nport: 9000\ncollect_proc_max_exec: 50\n").unwrap();

        let args = Args::parse_from([
            "cgroup-exporter",
            "--config",
            path.to_str().unwrap(),
            "--paths",
            "/user.slice, /slurm",
            "--collect-proc",
        ]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.paths(), vec!["/user.slice", "/slurm"]);
        assert_eq!(cfg.port, Some(9000));
        assert_eq!(cfg.collect_proc, Some(true));
        assert_eq!(cfg.collect_proc_max_exec, Some(50));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("dne.yaml"))).is_err());
    }

    #[test]
    fn test_render_config() {
        let out = render_config(&valid(), &ConfigFormat::Yaml).unwrap();
        assert!(out.contains("/user.slice"));
        let out = render_config(&valid(), &ConfigFormat::Json).unwrap();
        assert!(out.contains("\"port\": 9306"));
    }
}
