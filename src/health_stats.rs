//! Running scrape statistics rendered by the `/health` endpoint.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (current, average, max, min, count)
    fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

pub struct HealthStats {
    groups: Stat,
    failed_groups: Stat,
    scrape_duration_seconds: Stat,
    total_scrapes: AtomicU64,
    http_requests: AtomicU64,
    started: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            groups: Stat::default(),
            failed_groups: Stat::default(),
            scrape_duration_seconds: Stat::default(),
            total_scrapes: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_scrape(&self, groups: u64, failed: u64, duration_seconds: f64) {
        self.groups.add_sample(groups as f64);
        self.failed_groups.add_sample(failed as f64);
        self.scrape_duration_seconds.add_sample(duration_seconds);
        self.total_scrapes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_scrapes(&self) -> u64 {
        self.total_scrapes.load(Ordering::Relaxed)
    }

    /// Failed groups in the most recent scrape.
    pub fn last_failed_groups(&self) -> u64 {
        self.failed_groups.snapshot().0 as u64
    }

    pub fn render_table(&self) -> String {
        let (g_cur, g_avg, g_max, g_min, _) = self.groups.snapshot();
        let (f_cur, f_avg, f_max, f_min, _) = self.failed_groups.snapshot();
        let (d_cur, d_avg, d_max, d_min, _) = self.scrape_duration_seconds.snapshot();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        let rows = [
            ("exported cgroups", g_cur, g_avg, g_max, g_min, 0usize),
            ("failed cgroups", f_cur, f_avg, f_max, f_min, 0),
            ("scrape duration (s)", d_cur, d_avg, d_max, d_min, 3),
        ];
        for (label, cur, avg, max, min, precision) in rows {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.p$}", cur, p = precision),
                format!("{:.p$}", avg, p = precision.max(1)),
                format!("{:.p$}", max, p = precision),
                format!("{:.p$}", min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of done scrapes: {}", self.total_scrapes()).ok();
        writeln!(out, "http requests: {}", self.http_requests.load(Ordering::Relaxed)).ok();
        writeln!(out, "uptime (s): {}", self.started.elapsed().as_secs()).ok();

        out
    }
}
