//! Single-flight admission for external jobs.
//!
//! Each [`JobKind`] owns one busy flag. Acquisition never waits: a request
//! that finds the flag set is rejected and the caller decides whether to
//! stay quiet (automatic triggers) or tell the user (manual commands).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::models::JobKind;

#[derive(Clone, Default)]
pub struct RunGuard {
    sync: Arc<AtomicBool>,
    import: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, kind: JobKind) -> &AtomicBool {
        match kind {
            JobKind::Sync => &self.sync,
            JobKind::Import => &self.import,
        }
    }

    /// Mark `kind` busy. Returns false if it already was.
    pub fn try_acquire(&self, kind: JobKind) -> bool {
        self.flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self, kind: JobKind) {
        self.flag(kind).store(false, Ordering::Release);
    }

    pub fn is_busy(&self, kind: JobKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }

    /// Scoped acquisition: the returned permit releases `kind` when dropped,
    /// including during unwinding.
    pub fn permit(&self, kind: JobKind) -> Option<RunPermit> {
        self.try_acquire(kind).then(|| RunPermit {
            guard: self.clone(),
            kind,
        })
    }
}

/// Proof that a job of `kind` was admitted.
pub struct RunPermit {
    guard: RunGuard,
    kind: JobKind,
}

impl RunPermit {
    pub fn kind(&self) -> JobKind {
        self.kind
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.guard.release(self.kind);
    }
}
