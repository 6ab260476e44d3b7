//! Stat reader abstraction shared by the v1 and v2 hierarchy readers,
//! plus the small cgroupfs file parsers both of them use.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::naming::GroupIdentity;
use super::CollectError;

/// Mounted cgroup hierarchy layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CgroupVersion {
    V1,
    V2,
}

impl CgroupVersion {
    /// Detects the hierarchy mounted at `cgroup_root`. The unified (v2)
    /// hierarchy exposes `cgroup.controllers` at its root.
    pub fn detect(cgroup_root: &Path) -> Self {
        if cgroup_root.join("cgroup.controllers").is_file() {
            CgroupVersion::V2
        } else {
            CgroupVersion::V1
        }
    }
}

impl std::fmt::Display for CgroupVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CgroupVersion::V1 => write!(f, "v1"),
            CgroupVersion::V2 => write!(f, "v2"),
        }
    }
}

/// Hierarchy selection: detect at runtime or force one layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyMode {
    #[default]
    Auto,
    V1,
    V2,
}

impl HierarchyMode {
    pub fn resolve(self, cgroup_root: &Path) -> CgroupVersion {
        match self {
            HierarchyMode::Auto => CgroupVersion::detect(cgroup_root),
            HierarchyMode::V1 => CgroupVersion::V1,
            HierarchyMode::V2 => CgroupVersion::V2,
        }
    }
}

/// A process found under a configured root, already mapped to its group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberProcess {
    pub group: String,
    pub pid: u32,
}

/// Raw counters loaded for one group, already converted to seconds/bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub cpu_user: f64,
    pub cpu_system: f64,
    pub cpu_total: f64,
    pub memory_rss: f64,
    pub memory_cache: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    /// v1: memory controller `failcnt`. v2: `oom` from `memory.events`.
    pub memory_fail_count: f64,
    pub swap_used: f64,
    pub swap_total: f64,
    /// v1: `memory.memsw.failcnt`. v2 has no equivalent and reports `None`.
    pub swap_fail_count: Option<f64>,
}

/// Version-specific access to a cgroup hierarchy.
///
/// Exactly two implementations exist, one per hierarchy layout; the
/// collection engine picks one and never checks the version itself.
pub trait StatReader: Send + Sync {
    fn version(&self) -> CgroupVersion;

    /// Lists every process under `root` together with its group key.
    fn member_processes(&self, root: &str) -> Result<Vec<MemberProcess>, CollectError>;

    /// Loads the CPU, memory and swap counters of one group.
    fn load_stats(&self, name: &str) -> Result<GroupStats, CollectError>;

    /// Location of the group's `cpuset.cpus` file.
    fn cpuset_path(&self, name: &str) -> PathBuf;

    /// Classifies the group and resolves its user and job identity.
    fn identity(&self, name: &str, pids: &[u32]) -> GroupIdentity;
}

/// Joins a cgroup name (always absolute, e.g. `/user.slice`) onto a base dir.
pub(crate) fn group_dir(base: &Path, name: &str) -> PathBuf {
    base.join(name.trim_start_matches('/'))
}

/// Reads a single-value cgroup file. A missing file reads as `None`;
/// the literal `max` reads as `u64::MAX`.
pub(crate) fn read_value(path: &Path) -> Result<Option<u64>, CollectError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CollectError::io(path, e)),
    };
    let value = content.trim();
    if value == "max" {
        return Ok(Some(u64::MAX));
    }
    value
        .parse::<u64>()
        .map(Some)
        .map_err(|e| CollectError::parse(path, format!("'{}': {}", value, e)))
}

/// Reads a flat-keyed cgroup file (`key value` per line). A missing file
/// yields an empty map; lines that are not `key <u64>` are skipped.
pub(crate) fn read_keyed(path: &Path) -> Result<HashMap<String, u64>, CollectError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(CollectError::io(path, e)),
    };
    let mut values = HashMap::new();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
            if let Ok(v) = value.parse::<u64>() {
                values.insert(key.to_string(), v);
            }
        }
    }
    Ok(values)
}

/// Strictly scans a flat-keyed file for one key.
///
/// Unlike [`read_keyed`], the file must exist, every line must be exactly
/// `key <u64>`, and the key must be present.
pub fn read_stat_key(key: &str, path: &Path) -> Result<u64, CollectError> {
    if !path.is_file() {
        return Err(CollectError::MissingFile(path.display().to_string()));
    }
    let content = fs::read_to_string(path).map_err(|e| CollectError::io(path, e))?;
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 2 {
            return Err(CollectError::parse(path, format!("invalid line '{}'", line)));
        }
        let value = parts[1]
            .parse::<u64>()
            .map_err(|e| CollectError::parse(path, format!("'{}': {}", parts[1], e)))?;
        if parts[0] == key {
            return Ok(value);
        }
    }
    Err(CollectError::MissingKey {
        key: key.to_string(),
        path: path.display().to_string(),
    })
}

/// Walks a cgroup directory tree and returns every `(directory, pid)` pair
/// listed in the `cgroup.procs` files below it, including `dir` itself.
///
/// The top directory must exist; missing `cgroup.procs` files in
/// subdirectories are treated as empty.
pub(crate) fn walk_procs(dir: &Path) -> Result<Vec<(PathBuf, u32)>, CollectError> {
    if !dir.is_dir() {
        return Err(CollectError::MissingGroup(dir.display().to_string()));
    }

    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for pid in read_procs(&current)? {
            out.push((current.clone(), pid));
        }

        let mut children = child_dirs(&current)?;
        // Reverse-sorted so the stack pops children in name order
        children.sort_unstable_by(|a, b| b.cmp(a));
        stack.extend(children);
    }
    Ok(out)
}

/// Lists the subdirectories of a cgroup. A group removed while the tree is
/// being walked has no children.
fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CollectError::io(dir, e)),
    };
    Ok(entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect())
}

fn read_procs(dir: &Path) -> Result<Vec<u32>, CollectError> {
    let path = dir.join("cgroup.procs");
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CollectError::io(&path, e)),
    };
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<u32>()
                .map_err(|e| CollectError::parse(&path, format!("pid '{}': {}", l, e)))
        })
        .collect()
}
