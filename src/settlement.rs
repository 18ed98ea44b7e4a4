//! PDO-gated settlement state machine and engine (C7).
//!
//! `SettlementStateMachine::complete_milestone` needs to drive a
//! transition while already holding the instance lock — a re-entrancy
//! case handled by splitting every public lock-taking method into a thin
//! wrapper plus a private `*_locked` helper that assumes the lock is
//! already held, so the public method never calls another lock-taking
//! public method.
//!
//! State names follow `settlement_state_machine.py`'s two graphs exactly:
//! the settlement graph (`DRAFT/PENDING` initial, `INITIATED/IN_PROGRESS/
//! MILESTONE_PENDING/MILESTONE_COMPLETE` active, `COMPLETED/FAILED/ABORTED/
//! CANCELLED` terminal) and the milestone sub-graph (`PENDING/IN_PROGRESS/
//! AWAITING_VERIFICATION/VERIFIED/COMPLETED/FAILED/SKIPPED`, with a
//! `AWAITING_VERIFICATION -> IN_PROGRESS` re-work loop).

use crate::clock::Clock;
use crate::gate::{GateError, GateEvaluation, PdoExecutionGate};
use crate::ledger::{LedgerEntry, LedgerPort};
use crate::pdo::PdoRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Settlement lifecycle state graph (§4.6.1). Terminal states have no
/// outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementState {
    Draft,
    Pending,
    Initiated,
    InProgress,
    MilestonePending,
    MilestoneComplete,
    Completed,
    Failed,
    Aborted,
    Cancelled,
}

fn settlement_transitions(state: SettlementState) -> &'static [SettlementState] {
    use SettlementState::*;
    match state {
        Draft => &[Pending, Cancelled],
        Pending => &[Initiated, Cancelled],
        Initiated => &[InProgress, Aborted, Failed],
        InProgress => &[MilestonePending, Completed, Aborted, Failed],
        MilestonePending => &[MilestoneComplete, InProgress, Aborted, Failed],
        MilestoneComplete => &[InProgress, Completed, Aborted],
        Completed | Failed | Aborted | Cancelled => &[],
    }
}

/// Per-milestone sub-state graph (§4.6.2). `VERIFIED` is the only state
/// `COMPLETED` is reachable from; `AWAITING_VERIFICATION -> IN_PROGRESS` is
/// the explicit re-work loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneState {
    Pending,
    InProgress,
    AwaitingVerification,
    Verified,
    Completed,
    Failed,
    Skipped,
}

fn milestone_transitions(state: MilestoneState) -> &'static [MilestoneState] {
    use MilestoneState::*;
    match state {
        Pending => &[InProgress, Skipped],
        InProgress => &[AwaitingVerification, Failed],
        AwaitingVerification => &[Verified, InProgress, Failed],
        Verified => &[Completed],
        Completed | Failed | Skipped => &[],
    }
}

/// Reported status of a settlement, returned to callers via
/// `SettlementResult`. A narrower view of `SettlementState` matching
/// `settlement_engine.py`'s own `SettlementStatus` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Initiated,
    InProgress,
    MilestonePending,
    Completed,
    Failed,
    Aborted,
}

impl From<SettlementState> for SettlementStatus {
    fn from(state: SettlementState) -> Self {
        match state {
            SettlementState::Draft | SettlementState::Pending => SettlementStatus::Pending,
            SettlementState::Initiated => SettlementStatus::Initiated,
            SettlementState::InProgress | SettlementState::MilestoneComplete => SettlementStatus::InProgress,
            SettlementState::MilestonePending => SettlementStatus::MilestonePending,
            SettlementState::Completed => SettlementStatus::Completed,
            SettlementState::Failed => SettlementStatus::Failed,
            SettlementState::Aborted | SettlementState::Cancelled => SettlementStatus::Aborted,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateTransitionError {
    #[error("INVALID_TRANSITION: {from:?} -> {to:?} is not permitted")]
    InvalidTransition { from: SettlementState, to: SettlementState },

    #[error("INVALID_MILESTONE_TRANSITION: {from:?} -> {to:?} is not permitted")]
    InvalidMilestoneTransition { from: MilestoneState, to: MilestoneState },

    #[error("MILESTONE_PDO_REQUIRED: milestone '{milestone_id}' has no verified PDO")]
    MilestonePdoRequired { milestone_id: String },

    #[error("SETTLEMENT_PDO_REQUIRED: {0}")]
    PdoVerificationFailed(#[from] GateError),

    #[error("LEDGER_APPEND_REQUIRED: failed to anchor transition to the ledger")]
    LedgerAppendRequired,

    #[error("MILESTONE_NOT_FOUND: '{0}'")]
    MilestoneNotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("SETTLEMENT_PDO_REQUIRED: {0}")]
    PdoRequired(#[from] GateError),

    #[error("SETTLEMENT_LEDGER_FAILURE: {0}")]
    LedgerFailure(#[from] StateTransitionError),

    #[error("SETTLEMENT_NOT_FOUND: '{0}'")]
    NotFound(String),

    #[error("SETTLEMENT_ALREADY_FINALIZED: '{0}'")]
    AlreadyFinalized(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub settlement_id: String,
    pub milestone_id: String,
    pub sequence: u64,
    pub state: MilestoneState,
    pub pdo_id: Option<String>,
    pub completion_pdo_id: Option<String>,
    pub transitions: Vec<TransitionRecord>,
}

/// One audited transition, settlement- or milestone-level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub milestone_id: Option<String>,
    pub from: String,
    pub to: String,
    pub recorded_at: String,
}

struct MachineState {
    settlement_id: String,
    pac_id: String,
    pdo_id: String,
    state: SettlementState,
    milestones: HashMap<String, MilestoneRecord>,
    transitions: Vec<TransitionRecord>,
    next_milestone_sequence: u64,
}

/// Drives one settlement's lifecycle plus its milestones. Owns a single
/// internal `Mutex`; every public method locks once per call. Bound at
/// construction to the PDO that authorized the settlement — every
/// transition, settlement- or milestone-level, re-verifies that binding
/// against the registry before it is allowed to proceed.
pub struct SettlementStateMachine {
    inner: Mutex<MachineState>,
}

impl SettlementStateMachine {
    pub fn new(settlement_id: &str, pac_id: &str, pdo_id: &str) -> Self {
        Self {
            inner: Mutex::new(MachineState {
                settlement_id: settlement_id.to_string(),
                pac_id: pac_id.to_string(),
                pdo_id: pdo_id.to_string(),
                state: SettlementState::Pending,
                milestones: HashMap::new(),
                transitions: Vec::new(),
                next_milestone_sequence: 0,
            }),
        }
    }

    pub fn state(&self) -> SettlementState {
        self.inner.lock().expect("state machine mutex poisoned").state
    }

    pub fn transitions(&self) -> Vec<TransitionRecord> {
        self.inner.lock().expect("state machine mutex poisoned").transitions.clone()
    }

    /// Transition the top-level settlement state: (a) check the edge is
    /// legal, (b) re-verify the settlement's PDO binding still holds,
    /// (c) append a ledger entry tagged with the transition, (d) only then
    /// mutate state and record the transition.
    pub fn transition(
        &self,
        to: SettlementState,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, StateTransitionError> {
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");
        Self::transition_locked(&mut guard, to, gate, registry, ledger, clock)
    }

    fn transition_locked(
        guard: &mut MachineState,
        to: SettlementState,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, StateTransitionError> {
        if !settlement_transitions(guard.state).contains(&to) {
            return Err(StateTransitionError::InvalidTransition { from: guard.state, to });
        }
        gate.verify_pdo_exists(registry, &guard.pdo_id, &guard.pac_id, clock)?;

        let payload_hash = crate::hashing::sha256_joined(&[
            &guard.settlement_id,
            &format!("{:?}", guard.state),
            &format!("{:?}", to),
        ]);
        let entry = ledger
            .append(
                "SETTLEMENT_TRANSITION",
                Some(&guard.pdo_id),
                Some(&guard.pac_id),
                &payload_hash,
                clock,
            )
            .map_err(|_| StateTransitionError::LedgerAppendRequired)?;

        guard.transitions.push(TransitionRecord {
            milestone_id: None,
            from: format!("{:?}", guard.state),
            to: format!("{:?}", to),
            recorded_at: clock.now_rfc3339(),
        });
        guard.state = to;
        Ok(entry)
    }

    pub fn add_milestone(&self, milestone_id: &str) {
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");
        let sequence = guard.next_milestone_sequence;
        guard.next_milestone_sequence += 1;
        let settlement_id = guard.settlement_id.clone();
        guard.milestones.insert(
            milestone_id.to_string(),
            MilestoneRecord {
                settlement_id,
                milestone_id: milestone_id.to_string(),
                sequence,
                state: MilestoneState::Pending,
                pdo_id: None,
                completion_pdo_id: None,
                transitions: Vec::new(),
            },
        );
    }

    /// Transition a milestone's sub-state. Same four-step discipline as
    /// `transition`, plus: a non-PASS gate result here is reported as
    /// `MilestonePdoRequired` specifically (INV-SETTLEMENT-002), and
    /// completing a milestone additionally requires a `pdo_id`.
    pub fn transition_milestone(
        &self,
        milestone_id: &str,
        to: MilestoneState,
        pdo_id: Option<&str>,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, StateTransitionError> {
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");
        Self::transition_milestone_locked(&mut guard, milestone_id, to, pdo_id, gate, registry, ledger, clock)
    }

    #[allow(clippy::too_many_arguments)]
    fn transition_milestone_locked(
        guard: &mut MachineState,
        milestone_id: &str,
        to: MilestoneState,
        pdo_id: Option<&str>,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, StateTransitionError> {
        let current = guard
            .milestones
            .get(milestone_id)
            .map(|m| m.state)
            .ok_or_else(|| StateTransitionError::MilestoneNotFound(milestone_id.to_string()))?;

        if !milestone_transitions(current).contains(&to) {
            return Err(StateTransitionError::InvalidMilestoneTransition { from: current, to });
        }
        if to == MilestoneState::Completed && pdo_id.is_none() {
            return Err(StateTransitionError::MilestonePdoRequired {
                milestone_id: milestone_id.to_string(),
            });
        }

        if gate
            .verify_pdo_exists(registry, &guard.pdo_id, &guard.pac_id, clock)
            .is_err()
        {
            return Err(StateTransitionError::MilestonePdoRequired {
                milestone_id: milestone_id.to_string(),
            });
        }

        let payload_hash = crate::hashing::sha256_joined(&[
            &guard.settlement_id,
            milestone_id,
            &format!("{:?}", current),
            &format!("{:?}", to),
        ]);
        let entry = ledger
            .append(
                "MILESTONE_TRANSITION",
                pdo_id.or(Some(guard.pdo_id.as_str())),
                Some(&guard.pac_id),
                &payload_hash,
                clock,
            )
            .map_err(|_| StateTransitionError::LedgerAppendRequired)?;

        let transition_record = TransitionRecord {
            milestone_id: Some(milestone_id.to_string()),
            from: format!("{:?}", current),
            to: format!("{:?}", to),
            recorded_at: clock.now_rfc3339(),
        };
        guard.transitions.push(transition_record.clone());

        let record = guard.milestones.get_mut(milestone_id).expect("checked above");
        record.state = to;
        record.transitions.push(transition_record);
        if let Some(id) = pdo_id {
            record.pdo_id = Some(id.to_string());
        }
        if to == MilestoneState::Completed {
            record.completion_pdo_id = pdo_id.map(str::to_string);
        }
        Ok(entry)
    }

    /// Route a milestone through its completion path:
    /// `AWAITING_VERIFICATION -> VERIFIED -> COMPLETED`. This is the
    /// re-entrancy case: rather than calling the public
    /// `transition_milestone` twice (which would deadlock re-acquiring
    /// `inner`), it locks once and calls the `*_locked` helper directly.
    #[allow(clippy::too_many_arguments)]
    pub fn complete_milestone(
        &self,
        milestone_id: &str,
        pdo_id: &str,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<LedgerEntry, StateTransitionError> {
        let mut guard = self.inner.lock().expect("state machine mutex poisoned");
        Self::transition_milestone_locked(
            &mut guard,
            milestone_id,
            MilestoneState::Verified,
            Some(pdo_id),
            gate,
            registry,
            ledger,
            clock,
        )?;
        Self::transition_milestone_locked(
            &mut guard,
            milestone_id,
            MilestoneState::Completed,
            Some(pdo_id),
            gate,
            registry,
            ledger,
            clock,
        )
    }

    pub fn get_milestone(&self, milestone_id: &str) -> Option<MilestoneRecord> {
        self.inner
            .lock()
            .expect("state machine mutex poisoned")
            .milestones
            .get(milestone_id)
            .cloned()
    }

    pub fn all_milestones_completed(&self) -> bool {
        let guard = self.inner.lock().expect("state machine mutex poisoned");
        !guard.milestones.is_empty()
            && guard.milestones.values().all(|m| m.state == MilestoneState::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub pac_id: String,
    pub pdo_id: String,
    pub settlement_id: String,
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementResult {
    pub settlement_id: String,
    pub status: SettlementStatus,
    pub ledger_entry_id: Option<String>,
    pub ledger_entry_hash: Option<String>,
    pub initiated_at: String,
    pub completed_at: Option<String>,
    pub gate_evaluations: Vec<GateEvaluation>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SettlementRecord {
    pub settlement_id: String,
    pub pac_id: String,
    pub pdo_id: String,
    pub status: SettlementStatus,
    pub amount: f64,
    pub currency: String,
    pub ledger_entry_id: Option<String>,
    pub ledger_entry_hash: Option<String>,
    pub milestone_ids: Vec<String>,
    pub state_transitions: Vec<TransitionRecord>,
    pub created_at: String,
    pub initiated_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Orchestrates settlements behind the PDO execution gate. One engine per
/// kernel instance, constructed explicitly — no module-level singleton.
pub struct SettlementEngine {
    records: Mutex<HashMap<String, SettlementRecord>>,
    machines: Mutex<HashMap<String, std::sync::Arc<SettlementStateMachine>>>,
}

impl Default for SettlementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementEngine {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            machines: Mutex::new(HashMap::new()),
        }
    }

    /// 1. verify a PDO exists for the request (INV-SETTLEMENT-001),
    /// 2. append a `SETTLEMENT_INITIATED` anchor to the ledger, 3. create
    /// the settlement record carrying that anchor's `ledger_entry_id`/
    /// `ledger_entry_hash`, 4. transition `PENDING -> INITIATED`,
    /// 5. register the record and its state machine. A ledger-append
    /// failure (step 2) raises `SettlementLedgerFailure` and leaves no
    /// record registered (INV-SETTLEMENT-004).
    pub fn initiate_settlement(
        &self,
        request: SettlementRequest,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<SettlementResult, SettlementError> {
        let pdo = gate.verify_pdo_exists(registry, &request.pdo_id, &request.pac_id, clock)?;

        let initiated_at = clock.now_rfc3339();
        let payload_hash = crate::pdo::compute_hash(&serde_json::json!({
            "amount": request.amount,
            "currency": request.currency,
        }));
        let anchor = ledger
            .append(
                "SETTLEMENT_INITIATED",
                Some(&pdo.pdo_id),
                Some(&request.pac_id),
                &payload_hash,
                clock,
            )
            .map_err(|_| SettlementError::LedgerFailure(StateTransitionError::LedgerAppendRequired))?;

        let record = SettlementRecord {
            settlement_id: request.settlement_id.clone(),
            pac_id: request.pac_id.clone(),
            pdo_id: pdo.pdo_id.clone(),
            status: SettlementStatus::Pending,
            amount: request.amount,
            currency: request.currency.clone(),
            ledger_entry_id: Some(anchor.entry_id.clone()),
            ledger_entry_hash: Some(anchor.entry_hash.clone()),
            milestone_ids: Vec::new(),
            state_transitions: Vec::new(),
            created_at: initiated_at.clone(),
            initiated_at: Some(initiated_at.clone()),
            completed_at: None,
        };

        let machine = std::sync::Arc::new(SettlementStateMachine::new(
            &request.settlement_id,
            &request.pac_id,
            &pdo.pdo_id,
        ));
        machine.transition(SettlementState::Initiated, gate, registry, ledger, clock)?;

        self.records
            .lock()
            .expect("settlement records mutex poisoned")
            .insert(request.settlement_id.clone(), record);
        self.machines
            .lock()
            .expect("settlement machines mutex poisoned")
            .insert(request.settlement_id.clone(), machine);

        let gate_evaluations = gate
            .get_evaluations()
            .into_iter()
            .filter(|e| e.pac_id == request.pac_id)
            .collect();

        Ok(SettlementResult {
            settlement_id: request.settlement_id,
            status: SettlementStatus::Initiated,
            ledger_entry_id: Some(anchor.entry_id),
            ledger_entry_hash: Some(anchor.entry_hash),
            initiated_at,
            completed_at: None,
            gate_evaluations,
            error: None,
        })
    }

    /// Run the execution phase: `INITIATED -> IN_PROGRESS -> COMPLETED`.
    /// A gate failure on the completion PDO marks the settlement `FAILED`
    /// and returns a failed result rather than raising (the settlement is
    /// recoverable); a ledger failure raises, matching
    /// `settlement_engine.py`.
    pub fn complete_settlement(
        &self,
        settlement_id: &str,
        pac_id: &str,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<SettlementResult, SettlementError> {
        let machine = self.require_machine(settlement_id)?;

        if matches!(
            machine.state(),
            SettlementState::Completed | SettlementState::Aborted | SettlementState::Failed | SettlementState::Cancelled
        ) {
            return Err(SettlementError::AlreadyFinalized(settlement_id.to_string()));
        }

        let initiated_at = self
            .get_record(settlement_id)
            .and_then(|r| r.initiated_at)
            .unwrap_or_default();
        let completed_at = clock.now_rfc3339();
        let gate_evaluations: Vec<GateEvaluation> = gate
            .get_evaluations()
            .into_iter()
            .filter(|e| e.pac_id == pac_id)
            .collect();

        let completion = gate.verify_pdo_exists(registry, &machine.state_pdo_id(), pac_id, clock);
        if completion.is_err() {
            let entry = machine
                .transition(SettlementState::Failed, gate, registry, ledger, clock)
                .map_err(SettlementError::from)?;
            self.finalize_record(settlement_id, SettlementStatus::Failed, &entry, &completed_at, &machine);
            return Ok(SettlementResult {
                settlement_id: settlement_id.to_string(),
                status: SettlementStatus::Failed,
                ledger_entry_id: Some(entry.entry_id),
                ledger_entry_hash: Some(entry.entry_hash),
                initiated_at,
                completed_at: Some(completed_at),
                gate_evaluations,
                error: Some("GATE_PDO_FAILED".to_string()),
            });
        }

        machine
            .transition(SettlementState::InProgress, gate, registry, ledger, clock)
            .map_err(SettlementError::from)?;
        let entry = machine
            .transition(SettlementState::Completed, gate, registry, ledger, clock)
            .map_err(SettlementError::from)?;

        self.finalize_record(settlement_id, SettlementStatus::Completed, &entry, &completed_at, &machine);

        Ok(SettlementResult {
            settlement_id: settlement_id.to_string(),
            status: SettlementStatus::Completed,
            ledger_entry_id: Some(entry.entry_id),
            ledger_entry_hash: Some(entry.entry_hash),
            initiated_at,
            completed_at: Some(completed_at),
            gate_evaluations,
            error: None,
        })
    }

    pub fn abort_settlement(
        &self,
        settlement_id: &str,
        gate: &PdoExecutionGate,
        registry: &PdoRegistry,
        ledger: &dyn LedgerPort,
        clock: &dyn Clock,
    ) -> Result<SettlementResult, SettlementError> {
        let machine = self.require_machine(settlement_id)?;
        let entry = machine
            .transition(SettlementState::Aborted, gate, registry, ledger, clock)
            .map_err(SettlementError::from)?;

        let initiated_at = self
            .get_record(settlement_id)
            .and_then(|r| r.initiated_at)
            .unwrap_or_default();
        let completed_at = clock.now_rfc3339();
        self.finalize_record(settlement_id, SettlementStatus::Aborted, &entry, &completed_at, &machine);

        Ok(SettlementResult {
            settlement_id: settlement_id.to_string(),
            status: SettlementStatus::Aborted,
            ledger_entry_id: Some(entry.entry_id),
            ledger_entry_hash: Some(entry.entry_hash),
            initiated_at,
            completed_at: Some(completed_at),
            gate_evaluations: Vec::new(),
            error: None,
        })
    }

    /// Write a transition's ledger anchor and the machine's accumulated
    /// transition log back onto the stored `SettlementRecord`.
    fn finalize_record(
        &self,
        settlement_id: &str,
        status: SettlementStatus,
        entry: &LedgerEntry,
        completed_at: &str,
        machine: &SettlementStateMachine,
    ) {
        if let Some(record) = self
            .records
            .lock()
            .expect("settlement records mutex poisoned")
            .get_mut(settlement_id)
        {
            record.status = status;
            record.ledger_entry_id = Some(entry.entry_id.clone());
            record.ledger_entry_hash = Some(entry.entry_hash.clone());
            record.completed_at = Some(completed_at.to_string());
            record.state_transitions = machine.transitions();
        }
    }

    pub fn get_record(&self, settlement_id: &str) -> Option<SettlementRecord> {
        self.records
            .lock()
            .expect("settlement records mutex poisoned")
            .get(settlement_id)
            .cloned()
    }

    pub fn get_machine(&self, settlement_id: &str) -> Option<std::sync::Arc<SettlementStateMachine>> {
        self.machines
            .lock()
            .expect("settlement machines mutex poisoned")
            .get(settlement_id)
            .cloned()
    }

    fn require_machine(&self, settlement_id: &str) -> Result<std::sync::Arc<SettlementStateMachine>, SettlementError> {
        self.get_machine(settlement_id)
            .ok_or_else(|| SettlementError::NotFound(settlement_id.to_string()))
    }
}

impl SettlementStateMachine {
    fn state_pdo_id(&self) -> String {
        self.inner.lock().expect("state machine mutex poisoned").pdo_id.clone()
    }
}
