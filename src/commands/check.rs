//! `check` subcommand: validates configuration and host requirements.

use cgroup_exporter::collector::{CgroupVersion, Collector};

use crate::config::{validate_effective_config, Config};

/// Runs all checks, printing one line per result. Returns true when all pass.
pub fn run_checks(config: &Config) -> bool {
    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            return false;
        }
    }

    let collector_config = config.collector_config();

    println!("\n📁 Checking filesystems...");
    for (name, root) in [
        ("cgroup root", &collector_config.cgroup_root),
        ("proc root", &collector_config.proc_root),
    ] {
        if root.is_dir() {
            println!("   ✅ {} {} accessible", name, root.display());
        } else {
            println!("   ❌ {} {} not found", name, root.display());
            all_ok = false;
        }
    }

    let detected = CgroupVersion::detect(&collector_config.cgroup_root);
    let collector = Collector::new(collector_config);
    println!(
        "   ℹ️  Detected cgroup {} hierarchy, using {}",
        detected,
        collector.version()
    );

    println!("\n📊 Checking cgroup paths...");
    for path in config.paths() {
        let records = collector.collect(std::slice::from_ref(&path));
        let failed = records.iter().filter(|r| r.collection_failed).count();
        if records.len() == 1 && failed == 1 && records[0].name == path {
            println!("   ❌ {}: cannot be read", path);
            all_ok = false;
        } else if failed > 0 {
            println!("   ⚠️  {}: {} cgroups, {} failed", path, records.len(), failed);
        } else {
            println!("   ✅ {}: {} cgroups", path, records.len());
        }
    }

    all_ok
}

/// Validates system requirements and configuration
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 cgroup Exporter - System Check");
    println!("=================================");

    let all_ok = run_checks(config);

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_run_checks() {
        let dir = tempfile::tempdir().unwrap();
        let cgroup_root = dir.path().join("cgroup");
        let proc_root = dir.path().join("proc");
        fs::create_dir_all(cgroup_root.join("cpuacct/system.slice/sshd.service")).unwrap();
        fs::write(
            cgroup_root.join("cpuacct/system.slice/sshd.service/cgroup.procs"),
            "812\n",
        )
        .unwrap();
        fs::create_dir_all(&proc_root).unwrap();

        let mut config = Config {
            paths: Some(vec!["/system.slice".into()]),
            cgroup_root: Some(cgroup_root),
            proc_root: Some(proc_root),
            ..Default::default()
        };
        assert!(run_checks(&config));

        config.paths = Some(vec!["/system.slice".into(), "/slurm".into()]);
        assert!(!run_checks(&config));

        config.paths = None;
        assert!(!run_checks(&config));
    }
}
