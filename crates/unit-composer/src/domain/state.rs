//! # Composition State Machine
//!
//! ```text
//! INIT → LOCKING → SNAPSHOT_OPEN → PARENTS_RESOLVED → AUTHORS_ASSEMBLED
//!      → SNAPSHOT_CLOSED → SIGNING → FINALIZED → RELEASED
//!
//! any non-terminal ──→ ERROR ──→ RELEASED
//! ```

use std::fmt;
use uuid::Uuid;

use super::errors::ComposeError;

/// Stage of one composition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositionStage {
    /// Request accepted, nothing held.
    Init,
    /// Waiting for address locks.
    Locking,
    /// Ledger transaction open.
    SnapshotOpen,
    /// Parents and last ball known.
    ParentsResolved,
    /// Author records built.
    AuthorsAssembled,
    /// Transaction committed, connection returned.
    SnapshotClosed,
    /// Signatures being collected.
    Signing,
    /// Content hash assigned.
    Finalized,
    /// Locks released.
    Released,
    /// A stage failed.
    Error,
}

impl CompositionStage {
    /// Whether `next` may follow `self`.
    pub fn can_transition_to(&self, next: CompositionStage) -> bool {
        use CompositionStage::*;
        match (self, next) {
            (Released, _) => false,
            (Error, Released) => true,
            (Error, _) => false,
            (_, Error) => true,
            (Init, Locking)
            | (Locking, SnapshotOpen)
            | (SnapshotOpen, ParentsResolved)
            | (ParentsResolved, AuthorsAssembled)
            | (AuthorsAssembled, SnapshotClosed)
            | (SnapshotClosed, Signing)
            | (Signing, Finalized)
            | (Finalized, Released) => true,
            _ => false,
        }
    }

    /// Whether nothing can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CompositionStage::Released)
    }
}

impl fmt::Display for CompositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompositionStage::Init => "INIT",
            CompositionStage::Locking => "LOCKING",
            CompositionStage::SnapshotOpen => "SNAPSHOT_OPEN",
            CompositionStage::ParentsResolved => "PARENTS_RESOLVED",
            CompositionStage::AuthorsAssembled => "AUTHORS_ASSEMBLED",
            CompositionStage::SnapshotClosed => "SNAPSHOT_CLOSED",
            CompositionStage::Signing => "SIGNING",
            CompositionStage::Finalized => "FINALIZED",
            CompositionStage::Released => "RELEASED",
            CompositionStage::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of one composition and logs each transition.
#[derive(Debug)]
pub struct CompositionTracker {
    id: Uuid,
    stage: CompositionStage,
    history: Vec<CompositionStage>,
}

impl CompositionTracker {
    /// New attempt in `INIT`.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: CompositionStage::Init,
            history: vec![CompositionStage::Init],
        }
    }

    /// Correlation id of this attempt.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current stage.
    pub fn stage(&self) -> CompositionStage {
        self.stage
    }

    /// Every stage visited, in order.
    pub fn history(&self) -> &[CompositionStage] {
        &self.history
    }

    /// Move to `next`.
    pub fn advance(&mut self, next: CompositionStage) -> Result<(), ComposeError> {
        if !self.stage.can_transition_to(next) {
            return Err(ComposeError::Internal(format!(
                "illegal composition transition {} -> {}",
                self.stage, next
            )));
        }
        tracing::debug!(
            composition_id = %self.id,
            from = %self.stage,
            to = %next,
            "[composer] Stage transition"
        );
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Record a failure: `ERROR`, unless already terminal or in error.
    pub fn fail(&mut self) {
        if self.stage.can_transition_to(CompositionStage::Error) {
            self.stage = CompositionStage::Error;
            self.history.push(CompositionStage::Error);
        }
    }
}

impl Default for CompositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
