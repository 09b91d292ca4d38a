/*!
End-to-end replay tests.
These tests drive the executor from configuration through to the files it leaves behind.
*/

use beexec_core::{
    framing, verify_dir, Command, CommandTrace, Executor, ExecutorConfig, PersistStrategy,
    ReplayError, Result, StrategyKind, StrategyStats,
};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn config_for(kind: StrategyKind, temp_dir: &TempDir) -> ExecutorConfig {
    ExecutorConfig::default()
        .with_strategy(kind)
        .with_output_dir(temp_dir.path().join("out"))
        .with_log_dir(temp_dir.path().join("logs"))
        .with_sample_interval(Duration::from_millis(25))
}

fn workload(len: usize) -> Vec<Command> {
    (0..len)
        .map(|i| match i % 3 {
            0 => Command::set(format!("user:{}", i % 17), format!("payload-{i}")),
            1 => Command::get(format!("user:{}", i % 11)),
            _ => Command::delete(format!("user:{}", i % 5)),
        })
        .collect()
}

fn read_throughput(path: &Path) -> Vec<u64> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| line.parse().unwrap())
        .collect()
}

#[test]
fn test_immediate_log_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::ImmediateLog, &temp_dir)
        .with_batch_threshold(250)
        .with_latency(true);
    let commands = workload(120);

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(commands.clone().into());
    let summary = executor.run().unwrap();
    let report = executor.shutdown().unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.applied, 120);
    assert_eq!(report.strategy.persisted, 120);

    // replaying the produced log gives back the exact trace
    let reloaded = CommandTrace::load(config.log_path()).unwrap();
    assert_eq!(reloaded.commands(), commands.as_slice());

    // unit threshold in every file name and one latency sample per command
    assert!(temp_dir.path().join("out/thr-int-1.out").exists());
    let latency = std::fs::read_to_string(temp_dir.path().join("logs/trad-1-latency.out")).unwrap();
    assert_eq!(latency.lines().count(), 120);
}

#[test]
fn test_batched_log_flush_count() {
    for (len, threshold) in [(10, 4), (12, 4), (3, 8), (1, 1)] {
        let temp_dir = TempDir::new().unwrap();
        let config =
            config_for(StrategyKind::BatchedLog, &temp_dir).with_batch_threshold(threshold);
        let commands = workload(len);

        let mut executor = Executor::new(config.clone()).unwrap();
        executor.load_trace(commands.clone().into());
        executor.run().unwrap();
        let report = executor.shutdown().unwrap();

        assert_eq!(report.strategy.flushes as usize, len.div_ceil(threshold));
        let reloaded = CommandTrace::load(config.log_path()).unwrap();
        assert_eq!(reloaded.commands(), commands.as_slice());
    }
}

#[test]
fn test_discard_writes_header_only() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::Discard, &temp_dir);

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(workload(50).into());
    let summary = executor.run().unwrap();
    executor.shutdown().unwrap();

    assert_eq!(summary.applied, 50);
    let raw = std::fs::read(config.log_path()).unwrap();
    assert_eq!(raw, b"0\n0\n-1\n");
}

#[test]
fn test_out_of_range_selector_creates_no_files() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::ImmediateLog, &temp_dir).with_selector(4);

    let result = Executor::new(config);
    assert!(matches!(result, Err(ReplayError::Configuration(_))));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[test]
fn test_mock_state_after_replay() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::ImmediateLog, &temp_dir);
    let commands = vec![
        Command::set("k1", "v1"),
        Command::set("k2", "v2"),
        Command::get("k1"),
    ];

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(commands.into());
    executor.run().unwrap();
    executor.shutdown().unwrap();

    let state = executor.state();
    assert_eq!(state.len(), 2);
    assert_eq!(state.get("k1"), Some(b"v1".as_slice()));
    assert_eq!(state.get("k2"), Some(b"v2".as_slice()));

    let reports = verify_dir(&config.log_dir, false).unwrap();
    assert_eq!(reports[0].family, "disktrad");
    assert_eq!(reports[0].commands, 3);
    assert_eq!(reports[0].unique_keys, 2);
}

#[test]
fn test_throughput_samples_sum_to_applied() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::BatchedLog, &temp_dir).with_batch_threshold(64);

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(workload(5_000).into());
    let summary = executor.run().unwrap();
    let report = executor.shutdown().unwrap();

    let samples = read_throughput(&config.throughput_path());
    assert!(!samples.is_empty());
    assert_eq!(samples.iter().sum::<u64>(), summary.applied);
    assert_eq!(report.throughput.total, summary.applied);
}

#[test]
fn test_loaded_trace_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let recorded = temp_dir.path().join("recorded.log");
    let commands = workload(30);
    framing::write_log(&mut File::create(&recorded).unwrap(), &commands).unwrap();

    let mut executor = Executor::new(config_for(StrategyKind::Discard, &temp_dir)).unwrap();
    executor.load(&recorded).unwrap();
    assert_eq!(executor.trace().unwrap().len(), 30);
    assert_eq!(executor.run().unwrap().applied, 30);
    executor.shutdown().unwrap();
}

#[test]
fn test_corrupt_trace_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let recorded = temp_dir.path().join("recorded.log");
    std::fs::write(&recorded, b"0\n0\n-1\n\x00\x00\x00\x10abc").unwrap();

    let mut executor = Executor::new(config_for(StrategyKind::Discard, &temp_dir)).unwrap();
    let result = executor.load(&recorded);
    assert!(matches!(result, Err(ReplayError::InvalidFormat(_))));
    executor.shutdown().unwrap();
}

#[test]
fn test_delegated_log_segments() {
    let temp_dir = TempDir::new().unwrap();
    let secondary = temp_dir.path().join("secondary");
    let config = config_for(StrategyKind::DelegatedLog, &temp_dir)
        .with_batch_threshold(10)
        .with_secondary_log_dir(&secondary);
    let commands = workload(35);

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(commands.into());
    executor.run().unwrap();
    executor.shutdown().unwrap();

    assert!(config.log_dir.join("beelog.0.9.log").exists());
    assert!(secondary.join("beelog.10.19.log").exists());
    assert!(config.log_dir.join("beelog.20.29.log").exists());
    assert!(secondary.join("beelog.30.34.log").exists());

    let reports = verify_dir(&config.log_dir, true).unwrap();
    assert_eq!(reports[1].family, "beelog");
    assert_eq!(reports[1].logs, 2);
    assert_eq!(reports[1].commands, 20);
}

/// Strategy whose n-th persist fails with an I/O error
struct FailingStrategy {
    persisted: u64,
    fail_at: u64,
}

impl PersistStrategy for FailingStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ImmediateLog
    }

    fn persist(&mut self, _command: &Command) -> Result<()> {
        if self.persisted == self.fail_at {
            return Err(ReplayError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "device unavailable",
            )));
        }
        self.persisted += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn stats(&self) -> StrategyStats {
        StrategyStats {
            persisted: self.persisted,
            flushes: self.persisted,
        }
    }
}

#[test]
fn test_failed_persist_is_never_applied() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::ImmediateLog, &temp_dir);
    let strategy = FailingStrategy {
        persisted: 0,
        fail_at: 1,
    };
    let commands = vec![Command::set("a", "1"), Command::set("b", "2"), Command::set("c", "3")];

    let mut executor = Executor::with_strategy(config.clone(), Box::new(strategy)).unwrap();
    executor.load_trace(commands.into());

    let err = executor.run().unwrap_err();
    assert!(matches!(err, ReplayError::Io(_)));
    assert_eq!(executor.state().len(), 1);
    assert!(executor.state().get("b").is_none());

    let report = executor.shutdown().unwrap();
    assert_eq!(report.throughput.total, 1);
    assert_eq!(read_throughput(&config.throughput_path()).iter().sum::<u64>(), 1);
}

#[test]
fn test_interrupt_from_another_thread() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::Discard, &temp_dir);

    let mut executor = Executor::new(config).unwrap();
    executor.load_trace(workload(10).into());
    let handle = executor.interrupt_handle();

    std::thread::spawn(move || handle.trigger()).join().unwrap();

    let summary = executor.run().unwrap();
    assert!(summary.interrupted);
    assert_eq!(summary.applied, 0);
    executor.shutdown().unwrap();
}

#[test]
fn test_header_only_log_replays_as_empty_trace() {
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(StrategyKind::Discard, &temp_dir);

    let mut executor = Executor::new(config.clone()).unwrap();
    executor.load_trace(workload(1).into());
    executor.run().unwrap();
    executor.shutdown().unwrap();

    let recorded = temp_dir.path().join("header-only.log");
    std::fs::copy(config.log_path(), &recorded).unwrap();

    let replay_dir = TempDir::new().unwrap();
    let mut executor = Executor::new(config_for(StrategyKind::ImmediateLog, &replay_dir)).unwrap();
    executor.load(&recorded).unwrap();

    let summary = executor.run().unwrap();
    assert!(!summary.interrupted);
    assert_eq!(summary.applied, 0);
    assert!(executor.state().is_empty());
    assert_eq!(executor.shutdown().unwrap().strategy.persisted, 0);
}

#[test]
fn test_synced_runs_produce_identical_logs() {
    for kind in [
        StrategyKind::ImmediateLog,
        StrategyKind::BatchedLog,
        StrategyKind::DelegatedLog,
    ] {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(kind, &temp_dir)
            .with_batch_threshold(8)
            .with_sync(true);
        let commands = workload(20);

        let mut executor = Executor::new(config.clone()).unwrap();
        executor.load_trace(commands.clone().into());
        assert_eq!(executor.run().unwrap().applied, 20);
        let report = executor.shutdown().unwrap();
        assert_eq!(report.strategy.persisted, 20);

        let reports = verify_dir(&config.log_dir, true).unwrap();
        let produced: usize = reports.iter().map(|r| r.commands).sum();
        assert_eq!(produced, 20, "strategy {kind}");

        if kind != StrategyKind::DelegatedLog {
            let reloaded = CommandTrace::load(config.log_path()).unwrap();
            assert_eq!(reloaded.commands(), commands.as_slice());
        }
    }
}
