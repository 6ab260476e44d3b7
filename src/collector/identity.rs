//! Process identity lookups against the host: UID to username, and
//! per-PID facts read from procfs (executable, effective UID, v2 group path).
//!
//! All functions are read-only; callers decide how a failure is absorbed.

use nix::unistd::{Uid, User};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Resolves a numeric UID string to a username.
///
/// Returns `None` when the UID is not numeric, unknown, or the lookup fails.
pub fn resolve_username(uid: &str) -> Option<String> {
    let raw: u32 = match uid.parse() {
        Ok(v) => v,
        Err(_) => {
            debug!("Not a numeric uid: {}", uid);
            return None;
        }
    };
    match User::from_uid(Uid::from_raw(raw)) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => {
            debug!("No passwd entry for uid {}", uid);
            None
        }
        Err(e) => {
            debug!("Username lookup failed for uid {}: {}", uid, e);
            None
        }
    }
}

/// Reads the executable path of a process from `<proc_root>/<pid>/exe`.
pub fn read_executable(proc_root: &Path, pid: u32) -> io::Result<String> {
    let target = fs::read_link(proc_root.join(pid.to_string()).join("exe"))?;
    let exe = target.to_string_lossy().into_owned();
    if exe.is_empty() {
        return Err(io::Error::other(format!("pid {} has no executable", pid)));
    }
    Ok(exe)
}

/// Reads the effective UID of a process (second field of the `Uid:` line
/// in `<proc_root>/<pid>/status`).
pub fn read_effective_uid(proc_root: &Path, pid: u32) -> io::Result<u32> {
    let content = fs::read_to_string(proc_root.join(pid.to_string()).join("status"))?;
    parse_effective_uid(&content)
}

fn parse_effective_uid(status: &str) -> io::Result<u32> {
    let line = status
        .lines()
        .find_map(|l| l.strip_prefix("Uid:"))
        .ok_or_else(|| io::Error::other("Uid line not found in status"))?;

    // Format: real, effective, saved, filesystem
    line.split_whitespace()
        .nth(1)
        .ok_or_else(|| io::Error::other("Uid line has no effective uid"))?
        .parse::<u32>()
        .map_err(|e| io::Error::other(format!("Invalid effective uid: {}", e)))
}

/// Reads the unified (v2) cgroup path of a process from
/// `<proc_root>/<pid>/cgroup`, i.e. the path of the `0::<path>` entry.
pub fn read_pid_group_path(proc_root: &Path, pid: u32) -> io::Result<String> {
    let content = fs::read_to_string(proc_root.join(pid.to_string()).join("cgroup"))?;
    parse_unified_group_path(&content)
        .ok_or_else(|| io::Error::other(format!("no unified cgroup entry for pid {}", pid)))
}

fn parse_unified_group_path(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let mut parts = line.splitn(3, ':');
        let id = parts.next()?;
        let controllers = parts.next()?;
        let path = parts.next()?;
        (id == "0" && controllers.is_empty()).then(|| path.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_effective_uid() {
        let status = "Name:\tbash\nUmask:\t0022\nUid:\t0\t20821\t20821\t20821\nGid:\t100\t100\t100\t100\n";
        assert_eq!(parse_effective_uid(status).unwrap(), 20821);
    }

    #[test]
    fn test_parse_effective_uid_missing() {
        assert!(parse_effective_uid("Name:\tbash\n").is_err());
        assert!(parse_effective_uid("Uid:\t0\n").is_err());
    }

    #[test]
    fn test_parse_unified_group_path() {
        let content = "12:cpuset:/\n0::/system.slice/slurmstepd.scope/job_4/step_0/user/task_0\n";
        assert_eq!(
            parse_unified_group_path(content).as_deref(),
            Some("/system.slice/slurmstepd.scope/job_4/step_0/user/task_0")
        );
        assert!(parse_unified_group_path("4:memory:/foo\n").is_none());
    }

    #[test]
    fn test_read_executable() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join("42");
        fs::create_dir_all(&pid_dir).unwrap();
        std::os::unix::fs::symlink("/bin/bash", pid_dir.join("exe")).unwrap();

        assert_eq!(read_executable(dir.path(), 42).unwrap(), "/bin/bash");
        assert!(read_executable(dir.path(), 43).is_err());
    }

    #[test]
    fn test_resolve_username() {
        assert_eq!(resolve_username("0").as_deref(), Some("root"));
        assert!(resolve_username("not-a-uid").is_none());
    }
}
