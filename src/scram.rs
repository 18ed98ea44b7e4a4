//! Emergency-halt SCRAM controller (C2).
//!
//! A single `ScramController` is constructed once by `Kernel` and handed
//! out as an `Arc` — no lazy statics, no global singleton. Dual-key
//! authorization, a registry of named execution paths plus generic
//! termination hooks, and a monotonic `ARMED -> ACTIVATING -> EXECUTING ->
//! (COMPLETE | FAILED)` state machine back the 11-step `activate`
//! protocol below.

use crate::clock::Clock;
use crate::hashing::sha256_joined;
use crate::ledger::Ledger;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Closed set of reasons a SCRAM may be triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScramReason {
    SentinelTrigger,
    ManualOperator,
    ByzantineQuorumFailure,
    LedgerChainBroken,
    IgViolationDetected,
    SignalTerminate,
    Unspecified,
}

impl ScramReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScramReason::SentinelTrigger => "SENTINEL_TRIGGER",
            ScramReason::ManualOperator => "MANUAL_OPERATOR",
            ScramReason::ByzantineQuorumFailure => "BYZANTINE_QUORUM_FAILURE",
            ScramReason::LedgerChainBroken => "LEDGER_CHAIN_BROKEN",
            ScramReason::IgViolationDetected => "IG_VIOLATION_DETECTED",
            ScramReason::SignalTerminate => "SIGNAL_TERMINATE",
            ScramReason::Unspecified => "UNSPECIFIED",
        }
    }
}

/// SCRAM controller state. `#[repr(u64)]` so it round-trips through the
/// lock-free `AtomicU64`. Moves only forward: `ARMED -> ACTIVATING ->
/// EXECUTING -> (COMPLETE | FAILED)`, and back to `ARMED` only via the
/// explicit `reset()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum ScramState {
    Armed = 0,
    Activating = 1,
    Executing = 2,
    Complete = 3,
    Failed = 4,
}

impl From<u64> for ScramState {
    fn from(value: u64) -> Self {
        match value {
            0 => ScramState::Armed,
            1 => ScramState::Activating,
            2 => ScramState::Executing,
            3 => ScramState::Complete,
            _ => ScramState::Failed,
        }
    }
}

/// The two SCRAM key types dual-key authorization requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScramKeyType {
    Operator,
    Architect,
}

/// A SCRAM authorization key. `authorize_key` rejects structurally invalid
/// keys (empty id/hash) and expired keys outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScramKey {
    pub key_id: String,
    pub key_type: ScramKeyType,
    pub key_hash: String,
    pub issued_at: String,
    pub expires_at: Option<String>,
}

impl ScramKey {
    fn is_structurally_valid(&self) -> bool {
        !self.key_id.is_empty() && !self.key_hash.is_empty()
    }

    fn is_expired(&self, now: &str) -> bool {
        match &self.expires_at {
            Some(expiry) => expiry.as_str() < now,
            None => false,
        }
    }
}

/// One recorded SCRAM audit event, also the unit written to the audit
/// log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScramAuditEvent {
    pub event_id: String,
    pub reason: ScramReason,
    pub context: serde_json::Value,
    pub triggered_at: String,
    pub scram_state: String,
    pub termination_latency_ms: u64,
    pub execution_paths_terminated: usize,
    pub invariants_failed: Vec<String>,
    pub content_hash: String,
    pub ledger_anchored: bool,
}

/// Configuration for the controller. Distinct from `KernelConfig` in that
/// this is the subset actually consumed at activation time.
#[derive(Debug, Clone)]
pub struct ScramConfig {
    pub max_termination_ms: u64,
    pub require_dual_key: bool,
    pub hardware_sentinel_required: bool,
    pub audit_log_path: Option<String>,
    /// Advisory marker file pinged on activation when
    /// `hardware_sentinel_required` is set. A write failure (missing
    /// parent directory, read-only filesystem) fails INV-SCRAM-003 closed
    /// rather than silently treating the sentinel as acknowledged.
    pub hardware_sentinel_path: Option<String>,
}

impl Default for ScramConfig {
    fn default() -> Self {
        Self {
            max_termination_ms: crate::config::MAX_TERMINATION_MS,
            require_dual_key: true,
            hardware_sentinel_required: false,
            audit_log_path: None,
            hardware_sentinel_path: None,
        }
    }
}

/// A hook run as part of the termination path. Hooks take no arguments and
/// have no return value at the public API; internally a failure is
/// represented so it can be swallowed without aborting the remainder.
pub type TerminationHook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// A registered execution path: an identified termination callback.
/// Distinct from a generic hook so the activation event can report
/// exactly how many were invoked.
struct ExecutionPath {
    id: String,
    terminate: TerminationHook,
}

/// Emergency-halt controller. `Armed` is the only state from which
/// `activate()` may be called; `reset()` is only valid from `Complete` or
/// `Failed`.
pub struct ScramController {
    state: AtomicU64,
    config: ScramConfig,
    keys: Mutex<Vec<ScramKey>>,
    execution_paths: Mutex<Vec<ExecutionPath>>,
    hooks: Mutex<Vec<TerminationHook>>,
    events: Mutex<Vec<ScramAuditEvent>>,
    hardware_ack: Mutex<bool>,
    signal_flag: std::sync::Arc<AtomicBool>,
}

impl ScramController {
    pub fn new(config: ScramConfig) -> Self {
        Self {
            state: AtomicU64::new(ScramState::Armed as u64),
            config,
            keys: Mutex::new(Vec::new()),
            execution_paths: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            hardware_ack: Mutex::new(false),
            signal_flag: std::sync::Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ScramState {
        ScramState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state(), ScramState::Armed)
    }

    fn set_state(&self, state: ScramState) {
        self.state.store(state as u64, Ordering::SeqCst);
    }

    /// Reject registration unless the controller is currently `ARMED`.
    fn require_armed_for_registration(&self) -> bool {
        self.is_armed()
    }

    /// Register a named execution path. Rejected (returns `false`) when
    /// the controller is not `ARMED`.
    pub fn register_execution_path(&self, id: impl Into<String>, terminate: TerminationHook) -> bool {
        if !self.require_armed_for_registration() {
            return false;
        }
        self.execution_paths
            .lock()
            .expect("scram execution paths mutex poisoned")
            .push(ExecutionPath { id: id.into(), terminate });
        true
    }

    /// Register a termination hook to run during `activate()`, after every
    /// execution path. Hooks run in registration order.
    pub fn register_termination_hook(&self, hook: TerminationHook) -> bool {
        if !self.require_armed_for_registration() {
            return false;
        }
        self.hooks.lock().expect("scram hooks mutex poisoned").push(hook);
        true
    }

    /// Authorize a SCRAM key for the current activation cycle. Rejects
    /// structurally invalid and expired keys.
    pub fn authorize_key(&self, key: Option<ScramKey>, now: &str) -> bool {
        let Some(key) = key else { return false };
        if !key.is_structurally_valid() {
            return false;
        }
        if key.is_expired(now) {
            return false;
        }
        self.keys.lock().expect("scram keys mutex poisoned").push(key);
        true
    }

    /// Record a hardware sentinel acknowledgment. Consumed by INV-SCRAM-003
    /// when `hardware_sentinel_required` is set.
    pub fn acknowledge_hardware_sentinel(&self) {
        *self.hardware_ack.lock().expect("hardware ack mutex poisoned") = true;
    }

    fn dual_key_authorized(&self) -> (bool, String, String) {
        let keys = self.keys.lock().expect("scram keys mutex poisoned");
        let operator = keys.iter().find(|k| k.key_type == ScramKeyType::Operator);
        let architect = keys.iter().find(|k| k.key_type == ScramKeyType::Architect);
        match (operator, architect) {
            (Some(o), Some(a)) => (true, o.key_hash.clone(), a.key_hash.clone()),
            (Some(o), None) => (false, o.key_hash.clone(), "MISSING".to_string()),
            (None, Some(a)) => (false, "MISSING".to_string(), a.key_hash.clone()),
            (None, None) => (false, "MISSING".to_string(), "MISSING".to_string()),
        }
    }

    /// Runs the full activation protocol under one activation at a time —
    /// concurrent callers observe non-ARMED state and receive a fail-closed
    /// error:
    /// 1. Reject unless current state is `ARMED`.
    /// 2. Transition `ARMED -> ACTIVATING`, record `t0`.
    /// 3. Verify dual-key authorization (INV-SCRAM-002); a missing/invalid
    ///    key is recorded as a failed invariant, not an abort.
    /// 4. Transition `ACTIVATING -> EXECUTING`.
    /// 5. Attempt the best-effort hardware sentinel ping.
    /// 6. Invoke every registered execution path exactly once, counting
    ///    terminations and swallowing callback errors/panics.
    /// 7. Invoke every registered termination hook, same contract.
    /// 8. Measure `termination_latency_ms`; `> 500 ms` demotes
    ///    INV-SCRAM-001 to failed.
    /// 9. Anchor an audit event to the ledger (best-effort).
    /// 10. Transition to `COMPLETE` if no invariant failed, else `FAILED`.
    /// 11. Append one JSON line to the audit log (best-effort) and record
    ///     the event in the in-memory trail.
    ///
    /// Never raises: a call while not `ARMED` synthesizes and returns an
    /// error audit event (`INV-SCRAM-005` failed, no ledger anchor) instead
    /// of blocking the caller, so every activation attempt — successful or
    /// rejected — produces a record in `audit_trail()`.
    pub fn activate(
        &self,
        keys: &[&str],
        reason: ScramReason,
        context: serde_json::Value,
        ledger: &Ledger,
        clock: &dyn Clock,
    ) -> ScramAuditEvent {
        // Back-compat shim: tests and call sites pass bare key strings
        // rather than full `ScramKey` values. Treat the first two as
        // operator/architect key hashes when no key was explicitly
        // authorized via `authorize_key`.
        if self.keys.lock().expect("scram keys mutex poisoned").is_empty() {
            let now = clock.now_rfc3339();
            for (i, raw) in keys.iter().take(2).enumerate() {
                let key_type = if i == 0 { ScramKeyType::Operator } else { ScramKeyType::Architect };
                self.authorize_key(
                    Some(ScramKey {
                        key_id: format!("implicit-{i}"),
                        key_type,
                        key_hash: raw.to_string(),
                        issued_at: now.clone(),
                        expires_at: None,
                    }),
                    &now,
                );
            }
        }

        let current = self.state();
        if current != ScramState::Armed {
            let triggered_at = clock.now_rfc3339();
            let event_id = format!("SCRAM-{}", uuid::Uuid::new_v4().simple());
            let content_hash = sha256_joined(&[&event_id, reason.as_str(), &triggered_at, "ERROR", "ERROR"]);
            let event = ScramAuditEvent {
                event_id,
                reason,
                context,
                triggered_at,
                scram_state: format!("{current:?}").to_uppercase(),
                termination_latency_ms: 0,
                execution_paths_terminated: 0,
                invariants_failed: vec!["INV-SCRAM-005".to_string()],
                content_hash,
                ledger_anchored: false,
            };
            tracing::error!(reason = reason.as_str(), current_state = ?current, "SCRAM activation blocked: controller not armed");
            self.write_audit_log_line(&event);
            self.events.lock().expect("scram events mutex poisoned").push(event.clone());
            return event;
        }

        self.set_state(ScramState::Activating);
        let start = clock.monotonic_now();

        let mut invariants_failed: Vec<String> = Vec::new();

        let (dual_key_ok, operator_hash, architect_hash) = self.dual_key_authorized();
        if self.config.require_dual_key && !dual_key_ok {
            invariants_failed.push("INV-SCRAM-002".to_string());
        }

        self.set_state(ScramState::Executing);

        let _ = self.ping_hardware_sentinel();
        let paths_terminated = self.terminate_execution_paths();
        self.terminate_hooks();

        let hardware_ok = !self.config.hardware_sentinel_required
            || *self.hardware_ack.lock().expect("hardware ack mutex poisoned");
        if self.config.hardware_sentinel_required && !hardware_ok {
            invariants_failed.push("INV-SCRAM-003".to_string());
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        if elapsed_ms > self.config.max_termination_ms {
            invariants_failed.push("INV-SCRAM-001".to_string());
        }

        let triggered_at = clock.now_rfc3339();
        let event_id = format!("SCRAM-{}", uuid::Uuid::new_v4().simple());

        let final_state = if invariants_failed.is_empty() {
            ScramState::Complete
        } else {
            ScramState::Failed
        };

        let content_hash = sha256_joined(&[
            &event_id,
            reason.as_str(),
            &triggered_at,
            &operator_hash,
            &architect_hash,
        ]);

        let ledger_anchored = ledger
            .append("SCRAM_AUDIT", None, None, &content_hash, clock)
            .is_ok();

        let event = ScramAuditEvent {
            event_id,
            reason,
            context,
            triggered_at,
            scram_state: format!("{final_state:?}").to_uppercase(),
            termination_latency_ms: elapsed_ms,
            execution_paths_terminated: paths_terminated,
            invariants_failed,
            content_hash,
            ledger_anchored,
        };

        self.set_state(final_state);
        match final_state {
            ScramState::Complete => {
                tracing::warn!(reason = reason.as_str(), latency_ms = elapsed_ms, "SCRAM activated");
            }
            _ => {
                tracing::error!(reason = reason.as_str(), latency_ms = elapsed_ms, invariants_failed = ?event.invariants_failed, "SCRAM activation failed an invariant");
            }
        }

        self.write_audit_log_line(&event);
        self.events.lock().expect("scram events mutex poisoned").push(event.clone());
        event
    }

    /// Best-effort write to the advisory hardware sentinel marker file.
    /// When no sentinel is required this is a no-op that always
    /// "succeeds"; when required, a successful write acknowledges the
    /// sentinel for this activation and a failed one leaves it
    /// unacknowledged so INV-SCRAM-003 fails closed.
    fn ping_hardware_sentinel(&self) -> bool {
        if !self.config.hardware_sentinel_required {
            return true;
        }
        let Some(path) = &self.config.hardware_sentinel_path else {
            return false;
        };
        let written = std::fs::write(path, b"SCRAM_SENTINEL_PING\n").is_ok();
        if written {
            self.acknowledge_hardware_sentinel();
        }
        written
    }

    /// Execute every registered execution path, swallowing individual
    /// errors and panics so one misbehaving subsystem cannot block
    /// termination of the rest. Returns the count invoked.
    fn terminate_execution_paths(&self) -> usize {
        let paths = self.execution_paths.lock().expect("scram execution paths mutex poisoned");
        let mut terminated = 0usize;
        for path in paths.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (path.terminate)()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(path = %path.id, error = %e, "SCRAM execution path returned an error"),
                Err(_) => tracing::warn!(path = %path.id, "SCRAM execution path panicked"),
            }
            terminated += 1;
        }
        terminated
    }

    fn terminate_hooks(&self) {
        let hooks = self.hooks.lock().expect("scram hooks mutex poisoned");
        for hook in hooks.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| hook()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "SCRAM termination hook returned an error"),
                Err(_) => tracing::warn!("SCRAM termination hook panicked"),
            }
        }
    }

    fn write_audit_log_line(&self, event: &ScramAuditEvent) {
        let Some(path) = &self.config.audit_log_path else { return };
        let Ok(line) = serde_json::to_string(event) else { return };
        if let Some(parent) = std::path::Path::new(path).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{line}");
        }
    }

    /// The atomic flag a registered signal handler flips. The monitor
    /// thread started by `install_signal_handlers` polls this flag and
    /// drives `force_terminate` from ordinary thread context — signal
    /// handlers themselves never call into userland directly.
    pub fn signal_flag(&self) -> std::sync::Arc<AtomicBool> {
        std::sync::Arc::clone(&self.signal_flag)
    }

    /// Install handlers for the process-terminating signals (SIGTERM,
    /// SIGINT) that flip `signal_flag` rather than acting directly, then
    /// spawn the monitor thread that actually drives termination. Returns
    /// an error if the underlying `signal_hook` registration fails.
    pub fn install_signal_handlers(self: &std::sync::Arc<Self>) -> anyhow::Result<std::thread::JoinHandle<()>> {
        signal_hook::flag::register(signal_hook::consts::SIGTERM, std::sync::Arc::clone(&self.signal_flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGINT, std::sync::Arc::clone(&self.signal_flag))?;

        let this = std::sync::Arc::clone(self);
        Ok(std::thread::spawn(move || {
            loop {
                if this.signal_flag.load(Ordering::SeqCst) {
                    let _ = this.force_terminate();
                    std::process::exit(1);
                }
                std::thread::sleep(std::time::Duration::from_millis(20));
            }
        }))
    }

    /// Forcibly terminate: skip key checks, invoke every registered path
    /// and hook exactly once, set `FAILED`, and record an (unanchored —
    /// no ledger handle is available on the signal path) audit event.
    /// Does NOT exit the process itself; `install_signal_handlers`'s
    /// monitor thread does that after this returns, so the method stays
    /// safe to call directly from tests.
    pub fn force_terminate(&self) -> ScramAuditEvent {
        self.set_state(ScramState::Failed);
        let paths_terminated = self.terminate_execution_paths();
        self.terminate_hooks();
        tracing::error!("SCRAM force-terminate invoked by signal handler");

        let event = ScramAuditEvent {
            event_id: format!("SCRAM-{}", uuid::Uuid::new_v4().simple()),
            reason: ScramReason::SignalTerminate,
            context: serde_json::json!({}),
            triggered_at: chrono::Utc::now().to_rfc3339(),
            scram_state: "FAILED".to_string(),
            termination_latency_ms: 0,
            execution_paths_terminated: paths_terminated,
            invariants_failed: Vec::new(),
            content_hash: sha256_joined(&["force_terminate"]),
            ledger_anchored: false,
        };
        self.write_audit_log_line(&event);
        self.events.lock().expect("scram events mutex poisoned").push(event.clone());
        event
    }

    /// Reset the controller back to `Armed`. Only valid from `Complete` or
    /// `Failed` — resetting a live activation is not permitted. Clears
    /// keys, times, and the sentinel flag; does NOT truncate the audit
    /// trail.
    pub fn reset(&self) -> bool {
        match self.state() {
            ScramState::Complete | ScramState::Failed => {
                self.set_state(ScramState::Armed);
                *self.hardware_ack.lock().expect("hardware ack mutex poisoned") = false;
                self.keys.lock().expect("scram keys mutex poisoned").clear();
                true
            }
            _ => false,
        }
    }

    pub fn audit_trail(&self) -> Vec<ScramAuditEvent> {
        self.events.lock().expect("scram events mutex poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn dual_key(scram: &ScramController, now: &str) {
        scram.authorize_key(
            Some(ScramKey {
                key_id: "op-1".to_string(),
                key_type: ScramKeyType::Operator,
                key_hash: "hash-op".to_string(),
                issued_at: now.to_string(),
                expires_at: None,
            }),
            now,
        );
        scram.authorize_key(
            Some(ScramKey {
                key_id: "arch-1".to_string(),
                key_type: ScramKeyType::Architect,
                key_hash: "hash-arch".to_string(),
                issued_at: now.to_string(),
                expires_at: None,
            }),
            now,
        );
    }

    #[test]
    fn activation_without_dual_key_fails_invariant_but_still_completes_run() {
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        let event = scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert!(event.invariants_failed.contains(&"INV-SCRAM-002".to_string()));
        assert_eq!(scram.state(), ScramState::Failed);
    }

    #[test]
    fn authorize_key_rejects_expired_and_structurally_invalid() {
        let scram = ScramController::new(ScramConfig::default());
        assert!(!scram.authorize_key(None, "2026-01-01T00:00:00Z"));
        assert!(!scram.authorize_key(
            Some(ScramKey {
                key_id: String::new(),
                key_type: ScramKeyType::Operator,
                key_hash: "h".to_string(),
                issued_at: "2026-01-01T00:00:00Z".to_string(),
                expires_at: None,
            }),
            "2026-01-01T00:00:00Z"
        ));
        assert!(!scram.authorize_key(
            Some(ScramKey {
                key_id: "op-1".to_string(),
                key_type: ScramKeyType::Operator,
                key_hash: "h".to_string(),
                issued_at: "2020-01-01T00:00:00Z".to_string(),
                expires_at: Some("2021-01-01T00:00:00Z".to_string()),
            }),
            "2026-01-01T00:00:00Z"
        ));
    }

    #[test]
    fn activation_succeeds_with_dual_key_and_anchors_ledger() {
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        let event = scram
            .activate(&[], ScramReason::SentinelTrigger, serde_json::json!({"detail": "breach"}), &ledger, &clock);
        assert!(event.ledger_anchored);
        assert!(event.invariants_failed.is_empty());
        assert_eq!(scram.state(), ScramState::Complete);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn cannot_reactivate_once_activated() {
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        scram.activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        let event = scram.activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert_eq!(event.scram_state, "COMPLETE");
        assert_eq!(event.invariants_failed, vec!["INV-SCRAM-005".to_string()]);
        assert!(!event.ledger_anchored);
    }

    #[test]
    fn reset_returns_to_armed_after_complete_but_keeps_audit_trail() {
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert!(scram.reset());
        assert_eq!(scram.state(), ScramState::Armed);
        assert_eq!(scram.audit_trail().len(), 1);
    }

    #[test]
    fn reset_is_rejected_from_armed() {
        let scram = ScramController::new(ScramConfig::default());
        assert!(!scram.reset());
    }

    #[test]
    fn registration_rejected_once_not_armed() {
        let scram = ScramController::new(ScramConfig::default());
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert!(!scram.register_execution_path("late", Box::new(|| Ok(()))));
        assert!(!scram.register_termination_hook(Box::new(|| Ok(()))));
    }

    #[test]
    fn every_registered_execution_path_is_invoked_exactly_once() {
        let scram = ScramController::new(ScramConfig::default());
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for _ in 0..3 {
            let c = counter.clone();
            scram.register_execution_path("path", Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        let event = scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert_eq!(event.execution_paths_terminated, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failing_hooks_and_paths_do_not_block_activation() {
        let scram = ScramController::new(ScramConfig::default());
        scram.register_execution_path("bad", Box::new(|| anyhow::bail!("simulated failure")));
        scram.register_termination_hook(Box::new(|| panic!("simulated hook panic")));
        let ran_after = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_after_clone = ran_after.clone();
        scram.register_termination_hook(Box::new(move || {
            ran_after_clone.store(true, Ordering::SeqCst);
            Ok(())
        }));
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        let event = scram.activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert_eq!(event.scram_state, "COMPLETE");
        assert!(ran_after.load(Ordering::SeqCst));
    }

    #[test]
    fn hardware_sentinel_path_missing_fails_invariant_closed() {
        let scram = ScramController::new(ScramConfig {
            hardware_sentinel_required: true,
            hardware_sentinel_path: None,
            ..ScramConfig::default()
        });
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        let event = scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert!(event.invariants_failed.contains(&"INV-SCRAM-003".to_string()));
        assert!(!*scram.hardware_ack.lock().unwrap());
    }

    #[test]
    fn hardware_sentinel_ping_succeeds_when_path_writable() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("sentinel.marker");
        let scram = ScramController::new(ScramConfig {
            hardware_sentinel_required: true,
            hardware_sentinel_path: Some(marker.to_string_lossy().to_string()),
            ..ScramConfig::default()
        });
        let ledger = Ledger::new();
        let clock = SystemClock;
        dual_key(&scram, &clock.now_rfc3339());
        let event = scram
            .activate(&[], ScramReason::ManualOperator, serde_json::json!({}), &ledger, &clock);
        assert!(!event.invariants_failed.contains(&"INV-SCRAM-003".to_string()));
        assert!(marker.exists());
    }

    #[test]
    fn force_terminate_invokes_every_path_and_sets_failed() {
        let scram = ScramController::new(ScramConfig::default());
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = counter.clone();
        scram.register_execution_path("p", Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let event = scram.force_terminate();
        assert_eq!(scram.state(), ScramState::Failed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(event.execution_paths_terminated, 1);
        assert_eq!(event.reason, ScramReason::SignalTerminate);
    }
}
