//! Parsing of the kernel's cpuset range-list syntax (`cpuset.cpus`).
//!
//! Format: comma-separated tokens, each either a single CPU index (`3`)
//! or an inclusive range (`0-7`). Example: `"0-1,4-5,8-9"`.

use std::fs;
use std::io;
use std::num::ParseIntError;
use std::path::Path;

use tracing::debug;

/// Error returned when a cpuset list cannot be parsed or read.
#[derive(Debug, thiserror::Error)]
pub enum CpusetError {
    #[error("invalid cpuset boundary '{token}': {source}")]
    InvalidBoundary {
        token: String,
        #[source]
        source: ParseIntError,
    },
    #[error("invalid cpuset range '{0}'")]
    InvalidRange(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

fn parse_boundary(token: &str) -> Result<u32, CpusetError> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|source| CpusetError::InvalidBoundary {
            token: token.to_string(),
            source,
        })
}

/// Expands a cpuset list into explicit CPU indices, in input order.
///
/// Empty input means "no explicit restriction" and yields an empty list.
/// A malformed token fails the whole input; no partial result is returned.
pub fn parse_cpuset(cpuset: &str) -> Result<Vec<String>, CpusetError> {
    let cpuset = cpuset.trim();
    if cpuset.is_empty() {
        return Ok(Vec::new());
    }

    let mut cpus = Vec::new();
    for token in cpuset.split(',') {
        let (start, end) = match token.split_once('-') {
            Some((start, end)) => (parse_boundary(start)?, parse_boundary(end)?),
            None => {
                let cpu = parse_boundary(token)?;
                (cpu, cpu)
            }
        };
        if end < start {
            return Err(CpusetError::InvalidRange(token.to_string()));
        }
        cpus.extend((start..=end).map(|cpu| cpu.to_string()));
    }
    Ok(cpus)
}

/// Reads and parses a `cpuset.cpus` file. A missing file yields an empty list.
pub fn read_cpuset(path: &Path) -> Result<Vec<String>, CpusetError> {
    if !path.is_file() {
        debug!("No cpuset file at {}", path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|source| CpusetError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_cpuset(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_range() {
        assert_eq!(parse_cpuset("0-2").unwrap(), vec!["0", "1", "2"]);
    }

    #[test]
    fn test_parse_multiple_ranges() {
        assert_eq!(
            parse_cpuset("0-1,4-5,8-9").unwrap(),
            vec!["0", "1", "4", "5", "8", "9"]
        );
    }

    #[test]
    fn test_parse_single_cpus() {
        assert_eq!(parse_cpuset("1,3,5,7").unwrap(), vec!["1", "3", "5", "7"]);
    }

    #[test]
    fn test_parse_empty_and_trailing_newline() {
        assert!(parse_cpuset("").unwrap().is_empty());
        assert_eq!(parse_cpuset("2-3\n").unwrap(), vec!["2", "3"]);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(parse_cpuset("a-2").is_err());
        assert!(parse_cpuset("0-b").is_err());
        assert!(parse_cpuset("0,x").is_err());
        assert!(matches!(
            parse_cpuset("4-1"),
            Err(CpusetError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_read_cpuset_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cpus = read_cpuset(&dir.path().join("cpuset.cpus")).unwrap();
        assert!(cpus.is_empty());
    }

    #[test]
    fn test_read_cpuset_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpuset.cpus");
        fs::write(&path, "0-1\n").unwrap();
        assert_eq!(read_cpuset(&path).unwrap(), vec!["0", "1"]);
    }
}
