//! Stat reader for the unified (v2) hierarchy.

use std::path::PathBuf;
use tracing::{debug, error};

use super::identity::read_pid_group_path;
use super::naming::{classify_v2, group_name_v2, is_excluded_v2, GroupIdentity};
use super::stats::{
    group_dir, read_keyed, read_stat_key, read_value, walk_procs, CgroupVersion, GroupStats,
    MemberProcess, StatReader,
};
use super::CollectError;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Root used for SLURM jobs under v1, kept as an alias on v2 hosts.
pub const LEGACY_SLURM_ROOT: &str = "/slurm";
/// Scope under which slurmstepd places job step groups on v2 hosts.
pub const SLURM_STEPD_SCOPE: &str = "/system.slice/slurmstepd.scope";

/// Reader for the unified hierarchy mounted at the cgroup root.
#[derive(Debug, Clone)]
pub struct CgroupV2Reader {
    cgroup_root: PathBuf,
    proc_root: PathBuf,
}

impl CgroupV2Reader {
    pub fn new(cgroup_root: impl Into<PathBuf>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            proc_root: proc_root.into(),
        }
    }
}

/// Maps a configured root to the group actually scanned.
pub fn scan_group(root: &str) -> &str {
    if root == LEGACY_SLURM_ROOT {
        SLURM_STEPD_SCOPE
    } else {
        root
    }
}

impl StatReader for CgroupV2Reader {
    fn version(&self) -> CgroupVersion {
        CgroupVersion::V2
    }

    fn member_processes(&self, root: &str) -> Result<Vec<MemberProcess>, CollectError> {
        let group = scan_group(root);
        debug!("Loading cgroup processes: root={} group={}", root, group);

        let processes = walk_procs(&group_dir(&self.cgroup_root, group))?;
        let mut members = Vec::with_capacity(processes.len());
        for (_, pid) in processes {
            let pid_path = match read_pid_group_path(&self.proc_root, pid) {
                Ok(p) => p,
                Err(e) => {
                    error!("Error getting group path for pid {} under {}: {}", pid, root, e);
                    continue;
                }
            };
            let name = group_name_v2(&pid_path, root);
            if is_excluded_v2(&name, root) {
                debug!("Skip system cgroup {}", name);
                continue;
            }
            members.push(MemberProcess { group: name, pid });
        }
        Ok(members)
    }

    fn load_stats(&self, name: &str) -> Result<GroupStats, CollectError> {
        let dir = group_dir(&self.cgroup_root, name);
        if !dir.is_dir() {
            return Err(CollectError::MissingGroup(dir.display().to_string()));
        }

        let cpu = read_keyed(&dir.join("cpu.stat"))?;
        let cpu_seconds = |key: &str| cpu.get(key).copied().unwrap_or(0) as f64 / MICROS_PER_SECOND;

        // swapcached is only exposed through the raw memory.stat keys
        let memory_stat_path = dir.join("memory.stat");
        let swapcached = read_stat_key("swapcached", &memory_stat_path)?;
        let memory = read_keyed(&memory_stat_path)?;
        let anon = memory.get("anon").copied().unwrap_or(0);
        let file = memory.get("file").copied().unwrap_or(0);

        let events = read_keyed(&dir.join("memory.events"))?;

        Ok(GroupStats {
            cpu_user: cpu_seconds("user_usec"),
            cpu_system: cpu_seconds("system_usec"),
            cpu_total: cpu_seconds("usage_usec"),
            memory_rss: anon.saturating_add(swapcached).saturating_add(file) as f64,
            memory_cache: file as f64,
            memory_used: read_value(&dir.join("memory.current"))?.unwrap_or(0) as f64,
            memory_total: read_value(&dir.join("memory.max"))?.unwrap_or(0) as f64,
            memory_fail_count: events.get("oom").copied().unwrap_or(0) as f64,
            swap_used: read_value(&dir.join("memory.swap.current"))?.unwrap_or(0) as f64,
            swap_total: read_value(&dir.join("memory.swap.max"))?.unwrap_or(0) as f64,
            swap_fail_count: None,
        })
    }

    fn cpuset_path(&self, name: &str) -> PathBuf {
        group_dir(&self.cgroup_root, name).join("cpuset.cpus")
    }

    fn identity(&self, name: &str, pids: &[u32]) -> GroupIdentity {
        classify_v2(name, pids, &self.proc_root)
    }
}
