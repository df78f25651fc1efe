//! Test tooling: proptest case plumbing and a scripted runtime double.

use std::collections::HashMap;
use std::time::Duration;

use crate::record::OpStatus;
use crate::runtime::{DiagStack, OpRuntime, OpToken, RuntimeFault};

pub fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
}

pub fn proptest_cases(default: u32) -> u32 {
    env_u32("PROPTEST_CASES").unwrap_or(default)
}

/// Upper bound on how long one scripted poll may sleep, regardless of the
/// budget the engine grants it. Keeps budget-exhaustion tests fast while
/// still consuming real wall-clock time.
const SLEEP_CAP_NS: u64 = 1_000_000;

#[derive(Debug)]
struct ScriptedOp {
    /// Successive poll outcomes; the last entry repeats forever.
    script: Vec<OpStatus>,
    cursor: usize,
    stack: DiagStack,
    releases: u32,
}

/// Deterministic [`OpRuntime`] double driven by per-operation scripts.
///
/// Each minted token carries a list of statuses its successive polls will
/// report (the last repeats). A poll that reports `InProgress` with a
/// non-zero budget sleeps for `min(budget, cap)` to model a blocking
/// runtime, so wait-engine budget arithmetic is exercised against real
/// elapsed time.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    ops: HashMap<u64, ScriptedOp>,
    next_raw: u64,
    /// Every poll, in order, for poll-ordering assertions.
    pub poll_log: Vec<OpToken>,
    poll_fault: Option<RuntimeFault>,
    snapshot_fault: Option<RuntimeFault>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a token whose polls follow `script`.
    ///
    /// # Panics
    ///
    /// Panics if `script` is empty.
    pub fn mint(&mut self, script: &[OpStatus]) -> OpToken {
        self.mint_with_stack(script, DiagStack::default())
    }

    /// Like [`mint`](Self::mint), with a diagnostic stack to hand out on
    /// [`snapshot_diagnostics`](OpRuntime::snapshot_diagnostics).
    pub fn mint_with_stack(&mut self, script: &[OpStatus], stack: DiagStack) -> OpToken {
        assert!(!script.is_empty(), "scripted op needs at least one status");

        let raw = self.next_raw;
        self.next_raw += 1;
        self.ops.insert(
            raw,
            ScriptedOp {
                script: script.to_vec(),
                cursor: 0,
                stack,
                releases: 0,
            },
        );
        OpToken::new(raw)
    }

    /// Rewrites an operation's remaining script to a single status, e.g. to
    /// finish an "in progress forever" op so its set can be closed.
    pub fn finish(&mut self, token: OpToken, status: OpStatus) {
        let op = self.ops.get_mut(&token.raw()).expect("unknown token");
        assert!(op.releases == 0, "finish after release");
        op.script = vec![status];
        op.cursor = 0;
    }

    /// The next poll of any token reports this fault instead of a status.
    pub fn arm_poll_fault(&mut self, fault: RuntimeFault) {
        self.poll_fault = Some(fault);
    }

    /// The next diagnostics snapshot reports this fault.
    pub fn arm_snapshot_fault(&mut self, fault: RuntimeFault) {
        self.snapshot_fault = Some(fault);
    }

    /// Tokens minted but never released.
    pub fn outstanding(&self) -> usize {
        self.ops.values().filter(|op| op.releases == 0).count()
    }

    pub fn is_released(&self, token: OpToken) -> bool {
        self.ops
            .get(&token.raw())
            .is_some_and(|op| op.releases > 0)
    }

    /// Asserts every token was released exactly once. The release contract
    /// is idempotent, but the set is expected to call it a single time per
    /// record.
    pub fn assert_all_released_once(&self) {
        for (raw, op) in &self.ops {
            assert!(op.releases == 1, "token {raw} released {} times", op.releases);
        }
    }
}

impl OpRuntime for ScriptedRuntime {
    fn poll(&mut self, token: OpToken, budget_ns: u64) -> Result<OpStatus, RuntimeFault> {
        if let Some(fault) = self.poll_fault.take() {
            return Err(fault);
        }

        let op = self
            .ops
            .get_mut(&token.raw())
            .ok_or_else(|| RuntimeFault::new("poll of unknown token"))?;
        if op.releases > 0 {
            return Err(RuntimeFault::new("poll after release"));
        }

        self.poll_log.push(token);

        let status = op.script[op.cursor];
        if op.cursor + 1 < op.script.len() {
            op.cursor += 1;
        }

        if status == OpStatus::InProgress && budget_ns > 0 {
            std::thread::sleep(Duration::from_nanos(budget_ns.min(SLEEP_CAP_NS)));
        }
        Ok(status)
    }

    fn snapshot_diagnostics(&mut self, token: OpToken) -> Result<DiagStack, RuntimeFault> {
        if let Some(fault) = self.snapshot_fault.take() {
            return Err(fault);
        }

        self.ops
            .get(&token.raw())
            .map(|op| op.stack.clone())
            .ok_or_else(|| RuntimeFault::new("snapshot of unknown token"))
    }

    fn release(&mut self, token: OpToken) {
        // Idempotent by contract; the count still records over-releases so
        // tests can assert the set calls exactly once.
        if let Some(op) = self.ops.get_mut(&token.raw()) {
            op.releases += 1;
        }
    }
}
