//! Group name normalization and workload classification.
//!
//! The kernel reports the cgroup of every member process. Those paths are
//! reduced to a canonical group key (user slice, scheduler job, or the raw
//! path) and the key is classified to extract the user and job identity.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, error};

use super::identity::{read_effective_uid, read_executable, resolve_username};

static USER_SLICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^user-([0-9]+)\.slice$").expect("valid user slice regex"));
static SLURM_V1_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/slurm/uid_([0-9]+)/job_([0-9]+)$").expect("valid slurm v1 regex")
});
static SLURM_V2_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/job_([0-9]+)$").expect("valid slurm v2 regex"));

/// Executables that never represent the job's user workload.
const JOB_HELPER_EXECUTABLES: &[&str] = &["sleep", "slurmstepd"];

/// Subgroup holding scheduler housekeeping processes under a step scope.
const SCHEDULER_SYSTEM_GROUP: &str = "system";

/// Identity attributes derived from a group key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIdentity {
    pub is_user_slice: bool,
    pub is_job: bool,
    pub uid: String,
    pub username: String,
    pub job_id: String,
}

impl GroupIdentity {
    fn user_slice(uid: &str) -> Self {
        Self {
            is_user_slice: true,
            uid: uid.to_string(),
            username: lookup_username(uid),
            ..Default::default()
        }
    }
}

fn lookup_username(uid: &str) -> String {
    match resolve_username(uid) {
        Some(name) => name,
        None => {
            error!("Error looking up username for uid {}", uid);
            String::new()
        }
    }
}

fn basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// True when `name` is `prefix` itself or a group below it.
fn is_under_prefix(name: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match name.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// True when a root path refers to the SLURM hierarchy.
pub fn is_scheduler_root(root: &str) -> bool {
    root.contains("slurm")
}

/// Reduces a v1 process cgroup directory to its group key.
///
/// `process_path` is the directory holding the process' `cgroup.procs`
/// entry, e.g. `/sys/fs/cgroup/cpuacct/slurm/uid_1/job_2/step_0/task_0`.
pub fn group_name_v1(process_path: &str, cgroup_root: &Path) -> String {
    let cpuacct = cgroup_root.join("cpuacct");
    let cpuacct = cpuacct.to_string_lossy();
    let name = process_path
        .strip_prefix(cpuacct.as_ref())
        .unwrap_or(process_path);
    let name = name.strip_suffix('/').unwrap_or(name);

    let dirs: Vec<&str> = name.split('/').collect();
    debug!("cgroup name dirs {:?}", dirs);

    // user.slice, system.slice and torque groups are already canonical
    if dirs.len() == 3 {
        return name.to_string();
    }

    // Deeper hierarchies (SLURM steps and tasks) collapse into the job
    match dirs.iter().position(|d| d.starts_with("job_")) {
        Some(i) => dirs[..=i].join("/"),
        None => name.to_string(),
    }
}

/// Reduces a v2 per-process group path to its group key.
pub fn group_name_v2(pid_group_path: &str, root: &str) -> String {
    let dirs: Vec<&str> = pid_group_path.split('/').collect();
    let name = match dirs.iter().position(|d| d.starts_with("job_")) {
        Some(i) => dirs[..=i].join("/"),
        None => {
            let keep = if is_scheduler_root(root) { 4 } else { 3 };
            dirs[..keep.min(dirs.len())].join("/")
        }
    };
    debug!(
        "Get name from path: name={} pid_path={} root={}",
        name, pid_group_path, root
    );
    name
}

/// True for the scheduler's housekeeping group, which is not a workload.
pub fn is_excluded_v2(name: &str, root: &str) -> bool {
    is_scheduler_root(root) && basename(name) == SCHEDULER_SYSTEM_GROUP
}

/// Classifies a v1 group key.
pub fn classify_v1(name: &str, torque_prefix: &str) -> GroupIdentity {
    if let Some(caps) = USER_SLICE_PATTERN.captures(basename(name)) {
        return GroupIdentity::user_slice(&caps[1]);
    }

    if let Some(caps) = SLURM_V1_PATTERN.captures(name) {
        let uid = caps[1].to_string();
        return GroupIdentity {
            is_job: true,
            username: lookup_username(&uid),
            uid,
            job_id: caps[2].to_string(),
            ..Default::default()
        };
    }

    let base = basename(name);
    if is_under_prefix(name, torque_prefix) && base.contains('.') {
        let job_id = base.split('.').next().unwrap_or_default();
        return GroupIdentity {
            is_job: true,
            job_id: job_id.to_string(),
            ..Default::default()
        };
    }

    GroupIdentity::default()
}

/// Classifies a v2 group key.
///
/// v2 job paths carry no UID, so the job owner is the effective UID of one
/// member process that is not a scheduler helper.
pub fn classify_v2(name: &str, pids: &[u32], proc_root: &Path) -> GroupIdentity {
    if let Some(caps) = USER_SLICE_PATTERN.captures(basename(name)) {
        return GroupIdentity::user_slice(&caps[1]);
    }

    let Some(caps) = SLURM_V2_PATTERN.captures(name) else {
        return GroupIdentity::default();
    };
    let mut identity = GroupIdentity {
        is_job: true,
        job_id: caps[1].to_string(),
        ..Default::default()
    };

    let Some(pid) = representative_pid(pids, proc_root) else {
        error!("No workload process found for job group {}", name);
        return identity;
    };
    match read_effective_uid(proc_root, pid) {
        Ok(uid) => {
            identity.uid = uid.to_string();
            identity.username = lookup_username(&identity.uid);
        }
        Err(e) => error!("Unable to get proc status for pid {}: {}", pid, e),
    }
    identity
}

fn representative_pid(pids: &[u32], proc_root: &Path) -> Option<u32> {
    pids.iter().copied().find(|&pid| match read_executable(proc_root, pid) {
        Ok(exe) => !JOB_HELPER_EXECUTABLES.contains(&basename(&exe)),
        Err(e) => {
            debug!("Unable to read executable for pid {}: {}", pid, e);
            false
        }
    })
}
