//! Cgroup metrics collection engine.
//!
//! One call to [`Collector::collect`] is one scrape: it enumerates the
//! processes under each configured root, reduces them to workload groups,
//! collects every group concurrently and returns a fresh snapshot. Failures
//! are absorbed at the smallest scope (root, group, PID, field) and surface
//! only as [`GroupRecord::collection_failed`].

pub mod cpuset;
pub mod identity;
pub mod naming;
pub mod procinfo;
pub mod stats;
pub mod v1;
pub mod v2;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, warn};

use self::cpuset::read_cpuset;
use self::naming::GroupIdentity;
use self::procinfo::profile_executables;
pub use self::stats::{CgroupVersion, GroupStats, HierarchyMode, StatReader};
use self::v1::CgroupV1Reader;
use self::v2::CgroupV2Reader;

pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";
pub const DEFAULT_PROC_ROOT: &str = "/proc";
pub const DEFAULT_MAX_EXEC_LEN: usize = 100;
pub const DEFAULT_TORQUE_PREFIX: &str = "/torque";

/// Errors raised while enumerating a root or loading a group.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("cgroup {0} does not exist")]
    MissingGroup(String),
    #[error("path {0} does not exist")]
    MissingFile(String),
    #[error("unable to find stat key {key} in {path}")]
    MissingKey { key: String, path: String },
    #[error("failed to parse {path}: {detail}")]
    Parse { path: String, detail: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl CollectError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CollectError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn parse(path: &Path, detail: String) -> Self {
        CollectError::Parse {
            path: path.display().to_string(),
            detail,
        }
    }
}

/// Engine settings, supplied by the caller at construction.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub cgroup_root: PathBuf,
    pub proc_root: PathBuf,
    /// Count the executables of each group's processes.
    pub collect_proc: bool,
    /// Executable paths longer than this are shortened.
    pub collect_proc_max_exec: usize,
    /// v1 groups under this prefix are Torque jobs.
    pub torque_prefix: String,
    pub hierarchy: HierarchyMode,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            collect_proc: false,
            collect_proc_max_exec: DEFAULT_MAX_EXEC_LEN,
            torque_prefix: DEFAULT_TORQUE_PREFIX.to_string(),
            hierarchy: HierarchyMode::Auto,
        }
    }
}

/// Metrics of one workload group within one scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub cpu_user: f64,
    pub cpu_system: f64,
    pub cpu_total: f64,
    pub cpu_count: usize,
    pub cpu_list: Vec<String>,
    pub memory_rss: f64,
    pub memory_cache: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub memory_fail_count: f64,
    pub swap_used: f64,
    pub swap_total: f64,
    pub swap_fail_count: Option<f64>,
    pub is_user_slice: bool,
    pub is_job: bool,
    pub uid: String,
    pub username: String,
    pub job_id: String,
    pub collection_failed: bool,
    #[serde(skip_serializing_if = "is_empty_map")]
    pub process_executables: HashMap<String, u64>,
}

fn is_empty_map(map: &HashMap<String, u64>) -> bool {
    map.is_empty()
}

impl GroupRecord {
    /// A record for a group or root that could not be collected.
    pub fn failed(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collection_failed: true,
            ..Default::default()
        }
    }

    fn from_stats(name: &str, stats: GroupStats) -> Self {
        Self {
            name: name.to_string(),
            cpu_user: stats.cpu_user,
            cpu_system: stats.cpu_system,
            cpu_total: stats.cpu_total,
            memory_rss: stats.memory_rss,
            memory_cache: stats.memory_cache,
            memory_used: stats.memory_used,
            memory_total: stats.memory_total,
            memory_fail_count: stats.memory_fail_count,
            swap_used: stats.swap_used,
            swap_total: stats.swap_total,
            swap_fail_count: stats.swap_fail_count,
            ..Default::default()
        }
    }

    fn apply_identity(&mut self, identity: GroupIdentity) {
        self.is_user_slice = identity.is_user_slice;
        self.is_job = identity.is_job;
        self.uid = identity.uid;
        self.username = identity.username;
        self.job_id = identity.job_id;
    }

    /// Comma-separated CPU list, as exported in the `cpus` label.
    pub fn cpu_list_label(&self) -> String {
        self.cpu_list.join(",")
    }
}

/// The collection engine. Cheap to build; holds no state between scrapes.
pub struct Collector {
    config: CollectorConfig,
    reader: Box<dyn StatReader>,
}

impl Collector {
    /// Builds a collector, selecting the stat reader for the hierarchy.
    pub fn new(config: CollectorConfig) -> Self {
        let reader: Box<dyn StatReader> = match config.hierarchy.resolve(&config.cgroup_root) {
            CgroupVersion::V1 => Box::new(CgroupV1Reader::new(
                &config.cgroup_root,
                config.torque_prefix.clone(),
            )),
            CgroupVersion::V2 => Box::new(CgroupV2Reader::new(&config.cgroup_root, &config.proc_root)),
        };
        Self::with_reader(config, reader)
    }

    /// Builds a collector around an explicit stat reader.
    pub fn with_reader(config: CollectorConfig, reader: Box<dyn StatReader>) -> Self {
        debug!("Using cgroup {} stat reader", reader.version());
        Self { config, reader }
    }

    pub fn version(&self) -> CgroupVersion {
        self.reader.version()
    }

    /// Collects one snapshot of every group under `roots`.
    ///
    /// Returns only after every group has been collected. A root that cannot
    /// be enumerated yields one failed record named after the root.
    pub fn collect(&self, roots: &[String]) -> Vec<GroupRecord> {
        let mut records = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for root in roots {
            debug!(
                "Loading cgroup root={} cgroup_root={}",
                root,
                self.config.cgroup_root.display()
            );
            let members = match self.reader.member_processes(root) {
                Ok(m) => m,
                Err(e) => {
                    error!("Error loading cgroup processes for {}: {}", root, e);
                    if seen.insert(root.clone()) {
                        records.push(self.failed_record(root));
                    }
                    continue;
                }
            };
            debug!("Found {} processes under {}", members.len(), root);

            // Group keys in first-seen order, each with its distinct PIDs
            let mut names: Vec<String> = Vec::new();
            let mut pids: HashMap<String, Vec<u32>> = HashMap::new();
            for member in members {
                if seen.contains(&member.group) {
                    continue;
                }
                let entry = pids.entry(member.group.clone()).or_insert_with(|| {
                    names.push(member.group.clone());
                    Vec::new()
                });
                if !entry.contains(&member.pid) {
                    entry.push(member.pid);
                }
            }
            seen.extend(names.iter().cloned());

            let collected = Mutex::new(Vec::with_capacity(names.len()));
            rayon::scope(|s| {
                let collected = &collected;
                let pids = &pids;
                for (index, name) in names.iter().enumerate() {
                    s.spawn(move |_| {
                        let group_pids = pids.get(name).map(Vec::as_slice).unwrap_or_default();
                        let record = self.collect_group(name, group_pids);
                        collected
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((index, record));
                    });
                }
            });

            // Completion order varies; keep discovery order
            let mut collected = collected.into_inner().unwrap_or_else(PoisonError::into_inner);
            collected.sort_unstable_by_key(|(index, _)| *index);
            records.extend(collected.into_iter().map(|(_, record)| record));
        }

        records
    }

    /// A failed record shaped like this hierarchy's records: v1 always
    /// reports a swap fail count, v2 never does.
    fn failed_record(&self, name: &str) -> GroupRecord {
        let mut record = GroupRecord::failed(name);
        if self.version() == CgroupVersion::V1 {
            record.swap_fail_count = Some(0.0);
        }
        record
    }

    fn collect_group(&self, name: &str, pids: &[u32]) -> GroupRecord {
        debug!("Loading cgroup {} with {} pids", name, pids.len());
        let stats = match self.reader.load_stats(name) {
            Ok(stats) => stats,
            Err(e) => {
                error!("Failed to load cgroup stats for {}: {}", name, e);
                return self.failed_record(name);
            }
        };

        let mut record = GroupRecord::from_stats(name, stats);

        let cpuset_path = self.reader.cpuset_path(name);
        match read_cpuset(&cpuset_path) {
            Ok(cpus) => {
                record.cpu_count = cpus.len();
                record.cpu_list = cpus;
            }
            Err(e) => warn!("Error reading cpuset {}: {}", cpuset_path.display(), e),
        }

        record.apply_identity(self.reader.identity(name, pids));

        if self.config.collect_proc {
            debug!("Get process info for {}: pids={:?}", name, pids);
            record.process_executables = profile_executables(
                &self.config.proc_root,
                pids,
                self.config.collect_proc_max_exec,
            );
        }

        record
    }
}
