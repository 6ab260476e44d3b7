//! Prometheus metrics definitions for cgroup-exporter.
//!
//! Every metric carries a `cgroup` label holding the group key. Gauges are
//! reset before each scrape so groups that disappeared are not exported.

use cgroup_exporter::collector::GroupRecord;
use prometheus::{Gauge, GaugeVec, Opts, Registry};

const NAMESPACE: &str = "cgroup";

fn gauge_vec(name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec, prometheus::Error> {
    GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
}

/// Per-cgroup metric families.
#[derive(Clone)]
pub struct CgroupMetrics {
    pub cpu_user: GaugeVec,
    pub cpu_system: GaugeVec,
    pub cpu_total: GaugeVec,
    pub cpus: GaugeVec,
    pub cpu_info: GaugeVec,
    pub memory_rss: GaugeVec,
    pub memory_cache: GaugeVec,
    pub memory_used: GaugeVec,
    pub memory_total: GaugeVec,
    pub memory_fail_count: GaugeVec,
    pub memsw_used: GaugeVec,
    pub memsw_total: GaugeVec,
    pub memsw_fail_count: GaugeVec,
    pub info: GaugeVec,
    pub process_exec_count: GaugeVec,
    pub collect_error: GaugeVec,
}

impl CgroupMetrics {
    /// Creates and registers all Prometheus metrics with the registry.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let labels = &["cgroup"];

        let metrics = Self {
            cpu_user: gauge_vec("cpu_user_seconds", "Cumulative CPU user seconds for cgroup", labels)?,
            cpu_system: gauge_vec(
                "cpu_system_seconds",
                "Cumulative CPU system seconds for cgroup",
                labels,
            )?,
            cpu_total: gauge_vec("cpu_total_seconds", "Cumulative CPU total seconds for cgroup", labels)?,
            cpus: gauge_vec("cpus", "Number of CPUs in the cgroup", labels)?,
            cpu_info: gauge_vec("cpu_info", "Information about the cgroup CPUs", &["cgroup", "cpus"])?,
            memory_rss: gauge_vec("memory_rss_bytes", "Memory RSS used in bytes", labels)?,
            memory_cache: gauge_vec("memory_cache_bytes", "Memory cache used in bytes", labels)?,
            memory_used: gauge_vec("memory_used_bytes", "Memory used in bytes", labels)?,
            memory_total: gauge_vec(
                "memory_total_bytes",
                "Memory total given to cgroup in bytes",
                labels,
            )?,
            memory_fail_count: gauge_vec("memory_fail_count", "Memory fail count", labels)?,
            memsw_used: gauge_vec("memsw_used_bytes", "Swap used in bytes", labels)?,
            memsw_total: gauge_vec("memsw_total_bytes", "Swap total given to cgroup in bytes", labels)?,
            memsw_fail_count: gauge_vec("memsw_fail_count", "Swap fail count", labels)?,
            info: gauge_vec(
                "info",
                "User slice information",
                &["cgroup", "username", "uid", "jobid"],
            )?,
            process_exec_count: gauge_vec(
                "process_exec_count",
                "Count of instances of a given process",
                &["cgroup", "exec"],
            )?,
            collect_error: GaugeVec::new(
                Opts::new(
                    "collect_error",
                    "Indicates collection error, 0=no error, 1=error",
                )
                .namespace(NAMESPACE)
                .subsystem("exporter"),
                labels,
            )?,
        };

        for collector in metrics.all() {
            registry.register(Box::new(collector.clone()))?;
        }
        Ok(metrics)
    }

    fn all(&self) -> [&GaugeVec; 16] {
        [
            &self.cpu_user,
            &self.cpu_system,
            &self.cpu_total,
            &self.cpus,
            &self.cpu_info,
            &self.memory_rss,
            &self.memory_cache,
            &self.memory_used,
            &self.memory_total,
            &self.memory_fail_count,
            &self.memsw_used,
            &self.memsw_total,
            &self.memsw_fail_count,
            &self.info,
            &self.process_exec_count,
            &self.collect_error,
        ]
    }

    /// Clears all label sets from the previous scrape.
    pub fn reset(&self) {
        for collector in self.all() {
            collector.reset();
        }
    }

    /// Exports one group record.
    pub fn set_for_group(&self, record: &GroupRecord) {
        let name = record.name.as_str();
        let labels = &[name];

        if record.collection_failed {
            self.collect_error.with_label_values(labels).set(1.0);
        }

        self.cpu_user.with_label_values(labels).set(record.cpu_user);
        self.cpu_system.with_label_values(labels).set(record.cpu_system);
        self.cpu_total.with_label_values(labels).set(record.cpu_total);
        self.cpus.with_label_values(labels).set(record.cpu_count as f64);
        self.cpu_info
            .with_label_values(&[name, record.cpu_list_label().as_str()])
            .set(1.0);
        self.memory_rss.with_label_values(labels).set(record.memory_rss);
        self.memory_cache.with_label_values(labels).set(record.memory_cache);
        self.memory_used.with_label_values(labels).set(record.memory_used);
        self.memory_total.with_label_values(labels).set(record.memory_total);
        self.memory_fail_count
            .with_label_values(labels)
            .set(record.memory_fail_count);
        self.memsw_used.with_label_values(labels).set(record.swap_used);
        self.memsw_total.with_label_values(labels).set(record.swap_total);

        // v2 has no swap fail counter
        if let Some(fail_count) = record.swap_fail_count {
            self.memsw_fail_count.with_label_values(labels).set(fail_count);
        }

        if record.is_user_slice || record.is_job {
            self.info
                .with_label_values(&[
                    name,
                    record.username.as_str(),
                    record.uid.as_str(),
                    record.job_id.as_str(),
                ])
                .set(1.0);
        }

        for (exec, count) in &record.process_executables {
            self.process_exec_count
                .with_label_values(&[name, exec.as_str()])
                .set(*count as f64);
        }
    }
}

/// Metrics about the exporter itself.
#[derive(Clone)]
pub struct ExporterMetrics {
    pub scrape_duration: Gauge,
    pub groups_total: Gauge,
    pub groups_failed: Gauge,
}

impl ExporterMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let scrape_duration = Gauge::with_opts(
            Opts::new("scrape_duration_seconds", "Time spent collecting cgroup metrics")
                .namespace(NAMESPACE)
                .subsystem("exporter"),
        )?;
        let groups_total = Gauge::with_opts(
            Opts::new("groups", "Number of cgroups exported by the last scrape")
                .namespace(NAMESPACE)
                .subsystem("exporter"),
        )?;
        let groups_failed = Gauge::with_opts(
            Opts::new("groups_failed", "Number of cgroups that failed in the last scrape")
                .namespace(NAMESPACE)
                .subsystem("exporter"),
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(groups_total.clone()))?;
        registry.register(Box::new(groups_failed.clone()))?;

        Ok(Self {
            scrape_duration,
            groups_total,
            groups_failed,
        })
    }
}
