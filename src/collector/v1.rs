//! Stat reader for the legacy (v1) hierarchy, where every controller is
//! mounted separately under the cgroup root (`cpuacct/`, `memory/`, `cpuset/`).

use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::naming::{classify_v1, group_name_v1, GroupIdentity};
use super::stats::{
    group_dir, read_keyed, read_value, walk_procs, CgroupVersion, GroupStats, MemberProcess,
    StatReader,
};
use super::CollectError;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Kernel clock ticks per second, used to scale `cpuacct.stat`.
static CLOCK_TICKS: Lazy<u64> = Lazy::new(|| {
    // SAFETY: sysconf has no preconditions and only reads a constant.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as u64
    } else {
        100
    }
});

/// Reader for the v1 `cpuacct` and `memory` controllers.
#[derive(Debug, Clone)]
pub struct CgroupV1Reader {
    cgroup_root: PathBuf,
    torque_prefix: String,
}

impl CgroupV1Reader {
    pub fn new(cgroup_root: impl Into<PathBuf>, torque_prefix: impl Into<String>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
            torque_prefix: torque_prefix.into(),
        }
    }

    fn controller_dir(&self, controller: &str, name: &str) -> PathBuf {
        group_dir(&self.cgroup_root.join(controller), name)
    }
}

/// Converts `cpuacct.stat` clock ticks into nanoseconds.
fn ticks_to_nanos(ticks: u64) -> u64 {
    ticks.saturating_mul(1_000_000_000) / *CLOCK_TICKS
}

fn value_or_zero(path: &Path) -> Result<f64, CollectError> {
    Ok(read_value(path)?.unwrap_or(0) as f64)
}

impl StatReader for CgroupV1Reader {
    fn version(&self) -> CgroupVersion {
        CgroupVersion::V1
    }

    fn member_processes(&self, root: &str) -> Result<Vec<MemberProcess>, CollectError> {
        let dir = self.controller_dir("cpuacct", root);
        debug!("Loading cgroup processes under {}", dir.display());

        let processes = walk_procs(&dir)?;
        Ok(processes
            .into_iter()
            .map(|(path, pid)| MemberProcess {
                group: group_name_v1(&path.to_string_lossy(), &self.cgroup_root),
                pid,
            })
            .collect())
    }

    fn load_stats(&self, name: &str) -> Result<GroupStats, CollectError> {
        let cpuacct = self.controller_dir("cpuacct", name);
        if !cpuacct.is_dir() {
            return Err(CollectError::MissingGroup(cpuacct.display().to_string()));
        }

        let mut stats = GroupStats {
            swap_fail_count: Some(0.0),
            ..Default::default()
        };

        let usage = read_value(&cpuacct.join("cpuacct.usage"))?.unwrap_or(0);
        let cpu = read_keyed(&cpuacct.join("cpuacct.stat"))?;
        let user = ticks_to_nanos(cpu.get("user").copied().unwrap_or(0));
        let system = ticks_to_nanos(cpu.get("system").copied().unwrap_or(0));
        stats.cpu_user = user as f64 / NANOS_PER_SECOND;
        stats.cpu_system = system as f64 / NANOS_PER_SECOND;
        stats.cpu_total = usage as f64 / NANOS_PER_SECOND;

        let memory = self.controller_dir("memory", name);
        if memory.is_dir() {
            let stat = read_keyed(&memory.join("memory.stat"))?;
            stats.memory_rss = stat.get("total_rss").copied().unwrap_or(0) as f64;
            stats.memory_cache = stat.get("total_cache").copied().unwrap_or(0) as f64;
            stats.memory_used = value_or_zero(&memory.join("memory.usage_in_bytes"))?;
            stats.memory_total = value_or_zero(&memory.join("memory.limit_in_bytes"))?;
            stats.memory_fail_count = value_or_zero(&memory.join("memory.failcnt"))?;
            stats.swap_used = value_or_zero(&memory.join("memory.memsw.usage_in_bytes"))?;
            stats.swap_total = value_or_zero(&memory.join("memory.memsw.limit_in_bytes"))?;
            stats.swap_fail_count = Some(value_or_zero(&memory.join("memory.memsw.failcnt"))?);
        } else {
            debug!("No memory controller directory for {}", name);
        }

        Ok(stats)
    }

    fn cpuset_path(&self, name: &str) -> PathBuf {
        self.controller_dir("cpuset", name).join("cpuset.cpus")
    }

    fn identity(&self, name: &str, _pids: &[u32]) -> GroupIdentity {
        classify_v1(name, &self.torque_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let slice = "user.slice/user-20821.slice";
        write(&root.join("cpuacct").join(slice).join("cgroup.procs"), "");
        write(
            &root.join("cpuacct").join(slice).join("session-1.scope/cgroup.procs"),
            "1000\n1001\n",
        );
        write(&root.join("cpuacct").join(slice).join("cpuacct.usage"), "831825022\n");
        write(
            &root.join("cpuacct").join(slice).join("cpuacct.stat"),
            format!("user {}\nsystem {}\n", 41 * *CLOCK_TICKS, 39 * *CLOCK_TICKS).as_str(),
        );
        write(
            &root.join("memory").join(slice).join("memory.stat"),
            "cache 0\nrss 0\ntotal_cache 2322432\ntotal_rss 5378048\n",
        );
        write(&root.join("memory").join(slice).join("memory.usage_in_bytes"), "27115520\n");
        write(&root.join("memory").join(slice).join("memory.limit_in_bytes"), "68719476736\n");
        write(&root.join("memory").join(slice).join("memory.failcnt"), "0\n");
        write(&root.join("memory").join(slice).join("memory.memsw.usage_in_bytes"), "8081408\n");
        write(
            &root.join("memory").join(slice).join("memory.memsw.limit_in_bytes"),
            "9223372036854771712\n",
        );
        write(&root.join("memory").join(slice).join("memory.memsw.failcnt"), "3\n");
        dir
    }

    #[test]
    fn test_member_processes() {
        let dir = fixture();
        let reader = CgroupV1Reader::new(dir.path(), "/torque");
        let members = reader.member_processes("/user.slice").unwrap();
        assert_eq!(members.len(), 2);
        assert!(members
            .iter()
            .all(|m| m.group == "/user.slice/user-20821.slice/session-1.scope"));
    }

    #[test]
    fn test_load_stats() {
        let dir = fixture();
        let reader = CgroupV1Reader::new(dir.path(), "/torque");
        let stats = reader.load_stats("/user.slice/user-20821.slice").unwrap();
        assert_eq!(stats.cpu_user, 41.0);
        assert_eq!(stats.cpu_system, 39.0);
        assert_eq!(stats.cpu_total, 0.831825022);
        assert_eq!(stats.memory_rss, 5378048.0);
        assert_eq!(stats.memory_cache, 2322432.0);
        assert_eq!(stats.memory_used, 27115520.0);
        assert_eq!(stats.memory_total, 68719476736.0);
        assert_eq!(stats.memory_fail_count, 0.0);
        assert_eq!(stats.swap_used, 8081408.0);
        assert_eq!(stats.swap_total, 9223372036854771712.0);
        assert_eq!(stats.swap_fail_count, Some(3.0));
    }

    #[test]
    fn test_load_stats_missing_group() {
        let dir = fixture();
        let reader = CgroupV1Reader::new(dir.path(), "/torque");
        assert!(matches!(
            reader.load_stats("/user.slice/user-1.slice"),
            Err(CollectError::MissingGroup(_))
        ));
    }

    #[test]
    fn test_load_stats_missing_counters_are_zero() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cpuacct/system.slice/sshd.service")).unwrap();
        let reader = CgroupV1Reader::new(dir.path(), "/torque");
        let stats = reader.load_stats("/system.slice/sshd.service").unwrap();
        assert_eq!(stats.cpu_total, 0.0);
        assert_eq!(stats.memory_rss, 0.0);
        assert_eq!(stats.swap_fail_count, Some(0.0));
    }
}
