//! Single-use rendezvous for the out-of-band one-time code.
//!
//! The certificate request suspends while a human retrieves the code from
//! their inbox. The gate lets that suspension be resolved from outside:
//! the orchestrator parks on [`ChallengeGate::wait`], and the presentation
//! layer later calls [`ChallengeGate::supply`] (or teardown calls
//! [`ChallengeGate::abort`]). A gate is used for exactly one wait.

use std::sync::Mutex;
use tokio::sync::oneshot;

/// What the waiter receives when the gate resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeOutcome {
    /// A non-empty one-time code was supplied.
    Supplied(String),
    /// The wait was released without a code; the session must unwind.
    Aborted,
}

enum Slot {
    Idle,
    Waiting(oneshot::Sender<CodeOutcome>),
    Resolved,
}

/// A single-slot, single-use rendezvous.
///
/// `supply`/`abort` with no wait pending are silent no-ops; this guards the
/// race between a late UI event and teardown. A second `wait` on the same
/// gate is a programming error and panics.
pub struct ChallengeGate {
    slot: Mutex<Slot>,
}

impl ChallengeGate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Idle),
        }
    }

    /// Suspend until `supply` or `abort` resolves the gate.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same gate.
    pub async fn wait(&self) -> CodeOutcome {
        let rx = {
            let mut slot = self.slot.lock().expect("gate lock poisoned");
            if !matches!(*slot, Slot::Idle) {
                panic!("ChallengeGate::wait called twice; a gate is single-use");
            }
            let (tx, rx) = oneshot::channel();
            *slot = Slot::Waiting(tx);
            rx
        };
        // The sender is never dropped unresolved while stored in the slot,
        // but a dropped gate must not hang the waiter.
        rx.await.unwrap_or(CodeOutcome::Aborted)
    }

    /// Resolve a pending wait with `code`.
    ///
    /// An empty (or whitespace-only) code never satisfies a wait; it is
    /// treated as [`ChallengeGate::abort`].
    pub fn supply(&self, code: &str) {
        let code = code.trim();
        if code.is_empty() {
            self.resolve(CodeOutcome::Aborted);
        } else {
            self.resolve(CodeOutcome::Supplied(code.to_string()));
        }
    }

    /// Release a pending wait without a code.
    pub fn abort(&self) {
        self.resolve(CodeOutcome::Aborted);
    }

    fn resolve(&self, outcome: CodeOutcome) {
        let sender = {
            let mut slot = self.slot.lock().expect("gate lock poisoned");
            match std::mem::replace(&mut *slot, Slot::Resolved) {
                Slot::Waiting(tx) => Some(tx),
                // No wait pending (or already resolved): keep whatever state
                // we had and do nothing.
                other => {
                    *slot = other;
                    None
                }
            }
        };
        if let Some(tx) = sender {
            // Receiver gone means the waiter was dropped mid-teardown.
            let _ = tx.send(outcome);
        }
    }
}

impl Default for ChallengeGate {
    fn default() -> Self {
        Self::new()
    }
}
