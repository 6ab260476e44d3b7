//! Executable profiling for the processes of one group.

use ahash::AHashMap as HashMap;
use rayon::prelude::*;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use super::identity::read_executable;

/// Marker inserted between the kept head and tail of a long path.
const ELLIPSIS: &str = "...";

/// Shortens an executable path longer than `max_len` characters by keeping
/// the first and last `max_len / 2` characters around an ellipsis.
pub fn truncate_executable(exe: &str, max_len: usize) -> String {
    let len = exe.chars().count();
    if len <= max_len {
        return exe.to_string();
    }
    let keep = max_len / 2;
    let head: String = exe.chars().take(keep).collect();
    let tail: String = exe.chars().skip(len - keep).collect();
    format!("{head}{ELLIPSIS}{tail}")
}

/// Counts executables among `pids`, resolving each PID in parallel.
///
/// PIDs whose executable cannot be read (exited, kernel threads, no
/// permission) are skipped.
pub fn profile_executables(proc_root: &Path, pids: &[u32], max_len: usize) -> HashMap<String, u64> {
    let executables: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());

    pids.par_iter().for_each(|&pid| {
        let exe = match read_executable(proc_root, pid) {
            Ok(exe) => exe,
            Err(e) => {
                debug!("Unable to get executable for pid {}: {}", pid, e);
                return;
            }
        };
        let exe = if exe.chars().count() > max_len {
            debug!("Executable will be truncated: exe={} pid={}", exe, pid);
            truncate_executable(&exe, max_len)
        } else {
            exe
        };
        let mut map = executables.lock().unwrap_or_else(PoisonError::into_inner);
        *map.entry(exe).or_insert(0) += 1;
    });

    executables
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
}
