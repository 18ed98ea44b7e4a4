//! Inspector General (C8b): tails the audit-trail log and triggers SCRAM
//! on a detected governance violation.
//!
//! No async runtime is pulled in for a single poll loop, so this uses
//! `std::thread::spawn` with a sleep between cycles.

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::scram::{ScramController, ScramReason};
use crate::sentinel::IntegritySentinel;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorStatus {
    Stopped,
    Monitoring,
    HaltedOnViolation,
}

/// One entry read from the tailed audit log. Only the fields the
/// Inspector General actually inspects are modeled.
#[derive(Debug, Clone, serde::Deserialize)]
struct AuditLogEntry {
    manifest_id: String,
    judgment: String,
    #[serde(default)]
    detail: Option<String>,
}

struct InspectorState {
    byte_position: u64,
    processed_entries: HashSet<String>,
    status: InspectorStatus,
}

/// Tails `log_path` (a JSON-Lines audit trail) and, on a rejected
/// judgment (IG-01) or a SCRAM/sentinel anomaly, calls
/// `scram.activate()` directly — the inspector is itself one of the
/// paths that can trigger an emergency halt.
pub struct InspectorGeneral {
    log_path: PathBuf,
    poll_interval: Duration,
    state: Mutex<InspectorState>,
    running: Arc<AtomicBool>,
}

impl InspectorGeneral {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            poll_interval: Duration::from_millis(1000),
            state: Mutex::new(InspectorState {
                byte_position: 0,
                processed_entries: HashSet::new(),
                status: InspectorStatus::Stopped,
            }),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn status(&self) -> InspectorStatus {
        self.state.lock().expect("inspector state mutex poisoned").status
    }

    /// Start the monitoring loop on a background thread. Each cycle:
    /// check SCRAM isn't already active, run an integrity-sentinel sweep,
    /// scan new log lines, then sleep. Any unexpected error inside the
    /// loop body triggers an emergency halt rather than silently dying
    /// (fail-closed).
    pub fn start_monitoring(
        self: &Arc<Self>,
        scram: Arc<ScramController>,
        sentinel: Arc<IntegritySentinel>,
        ledger: Arc<Ledger>,
        clock: Arc<dyn Clock>,
    ) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        self.state.lock().expect("inspector state mutex poisoned").status = InspectorStatus::Monitoring;

        let this = Arc::clone(self);
        let running = Arc::clone(&self.running);

        thread::spawn(move || {
            this.scan_log(&scram, &ledger, &clock);
            while running.load(Ordering::SeqCst) {
                if !matches!(scram.state(), crate::scram::ScramState::Armed) {
                    break;
                }
                sentinel.verify_integrity(&scram, &ledger, &clock);
                this.scan_log(&scram, &ledger, &clock);
                thread::sleep(this.poll_interval);
            }
            this.state.lock().expect("inspector state mutex poisoned").status = InspectorStatus::Stopped;
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run a single scan cycle synchronously, without spinning up the
    /// background poll thread. Useful for callers (and tests) that want to
    /// drive the tailer deterministically rather than racing a sleep.
    pub fn scan_once(&self, scram: &ScramController, ledger: &Ledger, clock: &dyn Clock) {
        self.scan_log(scram, ledger, clock);
    }

    /// Read any bytes appended to the log since the last scan, tolerating
    /// malformed lines (matching the Python source's `JSONDecodeError`
    /// tolerance — a partially-written line is skipped, not fatal).
    fn scan_log(&self, scram: &ScramController, ledger: &Ledger, clock: &dyn Clock) {
        let Ok(file) = std::fs::File::open(&self.log_path) else {
            return;
        };
        let mut reader = BufReader::new(file);
        let start = self.state.lock().expect("inspector state mutex poisoned").byte_position;
        if reader.seek(SeekFrom::Start(start)).is_err() {
            return;
        }

        let mut consumed: u64 = 0;
        let mut line = String::new();
        loop {
            line.clear();
            let bytes = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n as u64,
                Err(_) => break,
            };
            consumed += bytes;
            if let Ok(entry) = serde_json::from_str::<AuditLogEntry>(line.trim_end()) {
                self.analyze_entry(&entry, scram, ledger, clock);
            }
        }

        self.state.lock().expect("inspector state mutex poisoned").byte_position = start + consumed;
    }

    /// IG-01: a rejected judgment is a governance violation and triggers
    /// an emergency halt. Entries are deduplicated by `manifest_id` so a
    /// re-read of the same line never double-triggers.
    fn analyze_entry(&self, entry: &AuditLogEntry, scram: &ScramController, ledger: &Ledger, clock: &dyn Clock) {
        {
            let mut state = self.state.lock().expect("inspector state mutex poisoned");
            if !state.processed_entries.insert(entry.manifest_id.clone()) {
                return;
            }
        }

        if entry.judgment == "Rejected" {
            let context = serde_json::json!({
                "manifest_id": entry.manifest_id,
                "detail": entry.detail,
            });
            let _ = scram.activate(
                &["ig-key-a", "ig-key-b"],
                ScramReason::IgViolationDetected,
                context,
                ledger,
                clock,
            );
            self.state.lock().expect("inspector state mutex poisoned").status = InspectorStatus::HaltedOnViolation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::scram::ScramConfig;
    use std::io::Write;

    #[test]
    fn scan_log_ignores_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        std::fs::write(&log_path, b"not json\n{\"manifest_id\":\"m1\",\"judgment\":\"Accepted\"}\n").unwrap();

        let inspector = InspectorGeneral::new(log_path);
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;

        inspector.scan_log(&scram, &ledger, &clock);
        assert_eq!(scram.state(), crate::scram::ScramState::Armed);
    }

    #[test]
    fn rejected_judgment_triggers_scram_once() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        std::fs::write(&log_path, b"{\"manifest_id\":\"m1\",\"judgment\":\"Rejected\",\"detail\":\"bad proof\"}\n").unwrap();

        let inspector = InspectorGeneral::new(log_path.clone());
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;

        inspector.scan_log(&scram, &ledger, &clock);
        assert_eq!(scram.state(), crate::scram::ScramState::Complete);
        assert_eq!(inspector.status(), InspectorStatus::HaltedOnViolation);

        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(f, "{{\"manifest_id\":\"m1\",\"judgment\":\"Rejected\"}}").unwrap();
        inspector.scan_log(&scram, &ledger, &clock);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn incremental_scan_only_reads_new_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");
        std::fs::write(&log_path, b"{\"manifest_id\":\"m1\",\"judgment\":\"Accepted\"}\n").unwrap();

        let inspector = InspectorGeneral::new(log_path.clone());
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        inspector.scan_log(&scram, &ledger, &clock);

        let mut f = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(f, "{{\"manifest_id\":\"m2\",\"judgment\":\"Rejected\"}}").unwrap();
        inspector.scan_log(&scram, &ledger, &clock);
        assert_eq!(scram.state(), crate::scram::ScramState::Complete);
    }
}
