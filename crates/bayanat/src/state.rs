//! Workflow states.
//!
//! The producer path moves a resource from [`LockState::Unlocked`] to
//! [`LockState::Locked`]. The consumer path is independent per actor and
//! ends in [`UnlockState::ContentFetched`], [`UnlockState::PermissionDenied`]
//! or [`UnlockState::Failed`].

use crate::error::ErrorKind;

/// Producer-side state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Nothing published yet.
    Unlocked,
    /// The payload is in the content store.
    Published,
    /// The sealed reference is registered on the ledger.
    Locked,
    /// The workflow stopped with an error.
    Failed(ErrorKind),
}

impl LockState {
    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: &LockState) -> bool {
        use LockState::*;
        matches!(
            (self, next),
            (Unlocked, Published) | (Published, Locked) | (Unlocked | Published, Failed(_))
        )
    }

    /// Whether the workflow is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LockState::Locked | LockState::Failed(_))
    }
}

/// Consumer-side state of one actor's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    /// The ledger has not been asked yet.
    PermissionUnknown,
    /// The ledger granted access at check time.
    PermissionGranted,
    /// The ledger refused access.
    PermissionDenied,
    /// The decryption request is with the network.
    Decrypting,
    /// The reference is recovered and verified.
    Decrypted,
    /// The payload is fetched and validated.
    ContentFetched,
    /// The workflow stopped with an error.
    Failed(ErrorKind),
}

impl UnlockState {
    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: &UnlockState) -> bool {
        use UnlockState::*;
        match (self, next) {
            (PermissionUnknown, PermissionGranted | PermissionDenied)
            | (PermissionGranted, Decrypting)
            | (Decrypting, Decrypted | PermissionDenied)
            | (Decrypted, ContentFetched) => true,
            (from, Failed(_)) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Whether the workflow is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnlockState::PermissionDenied | UnlockState::ContentFetched | UnlockState::Failed(_)
        )
    }
}

/// States a workflow passed through, starting from its initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace<S> {
    states: Vec<S>,
}

impl<S: Copy> Trace<S> {
    pub(crate) fn start(initial: S) -> Self {
        Self {
            states: vec![initial],
        }
    }

    /// The current state.
    pub fn current(&self) -> S {
        // `start` guarantees at least one state
        self.states[self.states.len() - 1]
    }

    /// Every state in order.
    pub fn states(&self) -> &[S] {
        &self.states
    }
}

impl Trace<LockState> {
    pub(crate) fn advance(&mut self, next: LockState) {
        debug_assert!(
            self.current().can_transition_to(&next),
            "illegal lock transition {:?} -> {:?}",
            self.current(),
            next
        );
        tracing::debug!(from = ?self.current(), to = ?next, "lock state");
        self.states.push(next);
    }
}

impl Trace<UnlockState> {
    pub(crate) fn advance(&mut self, next: UnlockState) {
        debug_assert!(
            self.current().can_transition_to(&next),
            "illegal unlock transition {:?} -> {:?}",
            self.current(),
            next
        );
        tracing::debug!(from = ?self.current(), to = ?next, "unlock state");
        self.states.push(next);
    }
}
