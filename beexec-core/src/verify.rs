/*!
Offline verification of produced logs.

The verifier decodes every log of a family (`logfile*.log` written by the
file strategies, `beelog*.log` written by the delegated file log), replays
them in order over its own map and reports how many distinct keys they touch.
*/

use crate::command::{Command, Operation};
use crate::{framing, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name prefix of logs written by the discard, immediate and batched strategies
pub const DISK_LOG_PREFIX: &str = "logfile";

/// File name prefix of segments written by the delegated file log
pub const SEGMENT_LOG_PREFIX: &str = "beelog";

const LOG_SUFFIX: &str = ".log";

/// Replays decoded logs over a private map, counting distinct keys
#[derive(Debug, Default)]
pub struct LogVerifier {
    state: HashMap<String, Vec<u8>>,
}

impl LogVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `log` and return how many of its keys were not seen before
    ///
    /// GET records an empty value so reads of unique keys are counted once;
    /// DELETE records nothing.
    pub fn count_distinct_keys(&mut self, log: &[Command]) -> usize {
        let mut diff = 0;
        for command in log {
            if !self.state.contains_key(&command.key) {
                diff += 1;
            }

            match command.op {
                Operation::Set => {
                    self.state
                        .insert(command.key.clone(), command.value.clone());
                }
                Operation::Get => {
                    self.state.insert(command.key.clone(), Vec::new());
                }
                Operation::Delete => {}
            }
        }
        diff
    }
}

/// Summary of one log family
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFamilyReport {
    pub family: String,
    pub logs: usize,
    pub commands: usize,
    pub unique_keys: usize,
    pub total_bytes: u64,
}

/// Verify both log families found in `dir`
///
/// When `sort` is set, logs are applied ordered by file name length and then
/// lexicographically; otherwise in lexicographic order.
pub fn verify_dir<P: AsRef<Path>>(dir: P, sort: bool) -> Result<Vec<LogFamilyReport>> {
    let dir = dir.as_ref();
    info!(dir = %dir.display(), sort, "Running log verifier");

    let mut reports = Vec::new();
    for (family, prefix) in [("disktrad", DISK_LOG_PREFIX), ("beelog", SEGMENT_LOG_PREFIX)] {
        let mut logs = keep_first_node(discover_logs(dir, prefix)?);
        if sort {
            sort_by_len_then_name(&mut logs);
        }
        reports.push(verify_family(family, &logs)?);
    }
    Ok(reports)
}

/// Log files in `dir` whose name starts with `prefix` and ends in `.log`
pub fn discover_logs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = file_name(&path) {
            if name.starts_with(prefix) && name.ends_with(LOG_SUFFIX) {
                logs.push(path);
            }
        }
    }
    logs.sort();
    Ok(logs)
}

/// Keep only logs produced by the same node as the first one
///
/// The node id is the text between the first `-` and the first `.` of a file
/// name (`beelog-node1.1000.log` → `node1.`). Names without an id are all kept.
pub fn keep_first_node(logs: Vec<PathBuf>) -> Vec<PathBuf> {
    let Some(first) = logs.first().and_then(|p| file_name(p)) else {
        return logs;
    };

    let head = match first.find('.') {
        Some(dot) => &first[..=dot],
        None => first,
    };
    let Some(dash) = head.find('-') else {
        return logs;
    };
    let id = head[dash + 1..].to_string();

    logs.into_iter()
        .filter(|p| file_name(p).map_or(false, |name| name.contains(&id)))
        .collect()
}

/// Order by file name length, then lexicographically
pub fn sort_by_len_then_name(logs: &mut [PathBuf]) {
    logs.sort_by(|a, b| {
        let a = file_name(a).unwrap_or_default();
        let b = file_name(b).unwrap_or_default();
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });
}

fn verify_family(family: &str, logs: &[PathBuf]) -> Result<LogFamilyReport> {
    let mut verifier = LogVerifier::new();
    let mut report = LogFamilyReport {
        family: family.to_string(),
        logs: logs.len(),
        commands: 0,
        unique_keys: 0,
        total_bytes: 0,
    };

    for path in logs {
        let file = File::open(path)?;
        report.total_bytes += file.metadata()?.len();

        let commands = framing::read_log(BufReader::new(file))?;
        let diff = verifier.count_distinct_keys(&commands);
        debug!(path = %path.display(), commands = commands.len(), new_keys = diff, "Verified log");

        report.commands += commands.len();
        report.unique_keys += diff;
    }
    Ok(report)
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_log(dir: &Path, name: &str, commands: &[Command]) {
        let mut file = File::create(dir.join(name)).unwrap();
        framing::write_log(&mut file, commands).unwrap();
    }

    #[test]
    fn test_repeated_key_counted_once() {
        let trace = vec![
            Command::set("k1", "v1"),
            Command::set("k2", "v2"),
            Command::get("k1"),
        ];
        let mut verifier = LogVerifier::new();
        assert_eq!(verifier.count_distinct_keys(&trace), 2);
    }

    #[test]
    fn test_reads_of_unique_keys_count() {
        let mut verifier = LogVerifier::new();
        let trace = vec![Command::get("a"), Command::get("a"), Command::get("b")];
        assert_eq!(verifier.count_distinct_keys(&trace), 2);
    }

    #[test]
    fn test_state_persists_across_logs() {
        let mut verifier = LogVerifier::new();
        assert_eq!(verifier.count_distinct_keys(&[Command::set("a", "1")]), 1);
        assert_eq!(verifier.count_distinct_keys(&[Command::set("a", "2")]), 0);
    }

    #[test]
    fn test_keep_first_node() {
        let logs = vec![
            PathBuf::from("/logs/beelog-node1.0.9.log"),
            PathBuf::from("/logs/beelog-node1.10.19.log"),
            PathBuf::from("/logs/beelog-node2.0.9.log"),
        ];
        let kept = keep_first_node(logs);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p.to_string_lossy().contains("node1.")));
    }

    #[test]
    fn test_keep_first_node_without_id_keeps_all() {
        let logs = vec![
            PathBuf::from("/logs/beelog.0.9.log"),
            PathBuf::from("/logs/beelog.10.19.log"),
        ];
        assert_eq!(keep_first_node(logs).len(), 2);
        assert!(keep_first_node(Vec::new()).is_empty());
    }

    #[test]
    fn test_sort_by_len_then_name() {
        let mut logs = vec![
            PathBuf::from("beelog.10.19.log"),
            PathBuf::from("beelog.0.9.log"),
            PathBuf::from("beelog.100.109.log"),
            PathBuf::from("beelog.20.29.log"),
        ];
        sort_by_len_then_name(&mut logs);
        let names: Vec<_> = logs.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "beelog.0.9.log",
                "beelog.10.19.log",
                "beelog.20.29.log",
                "beelog.100.109.log"
            ]
        );
    }

    #[test]
    fn test_verify_dir_reports_both_families() {
        let temp_dir = TempDir::new().unwrap();
        write_log(
            temp_dir.path(),
            "logfile.log",
            &[Command::set("k1", "v1"), Command::set("k2", "v2"), Command::get("k1")],
        );
        write_log(temp_dir.path(), "beelog.0.1.log", &[Command::set("a", "1"), Command::get("b")]);
        write_log(temp_dir.path(), "beelog.2.3.log", &[Command::get("a"), Command::set("c", "3")]);
        std::fs::write(temp_dir.path().join("thr-int-2.out"), "4\n").unwrap();

        let reports = verify_dir(temp_dir.path(), true).unwrap();
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].family, "disktrad");
        assert_eq!(reports[0].logs, 1);
        assert_eq!(reports[0].commands, 3);
        assert_eq!(reports[0].unique_keys, 2);

        assert_eq!(reports[1].family, "beelog");
        assert_eq!(reports[1].logs, 2);
        assert_eq!(reports[1].commands, 4);
        assert_eq!(reports[1].unique_keys, 3);
        assert!(reports[1].total_bytes > 0);
    }

    #[test]
    fn test_verify_dir_propagates_corrupt_log() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("logfile.log"), b"garbage").unwrap();

        let result = verify_dir(temp_dir.path(), false);
        assert!(matches!(result, Err(crate::ReplayError::InvalidFormat(_))));
    }
}
