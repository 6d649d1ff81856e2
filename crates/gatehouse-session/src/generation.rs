use std::sync::atomic::{AtomicU64, Ordering};

/// Identity generation counters shared by the listener sink and the state machine.
///
/// `seq` advances on every enqueued identity change, `fence` on every completed logout.
#[derive(Debug, Default)]
pub(crate) struct Generation {
    seq: AtomicU64,
    fence: AtomicU64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Stamp {
    pub(crate) seq: u64,
    pub(crate) fence: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Freshness {
    Current,
    /// A newer identity change is queued behind this one.
    Superseded,
    /// A logout completed after this change was enqueued.
    Fenced,
}

impl Generation {
    pub(crate) fn advance(&self) -> Stamp {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Stamp {
            seq,
            fence: self.fence.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn raise_fence(&self) {
        self.fence.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn latest_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self, stamp: Stamp) -> Freshness {
        if self.seq.load(Ordering::SeqCst) != stamp.seq {
            Freshness::Superseded
        } else if self.fence.load(Ordering::SeqCst) != stamp.fence {
            Freshness::Fenced
        } else {
            Freshness::Current
        }
    }
}
