//! View state machine
//!
//! Holds the current view and decides when it may move on. A new view is
//! only ever committed after the primary of the current view has
//! acknowledged it; otherwise two servers could each believe they hold an
//! authoritative view.

use crate::failure::FailureDetector;
use crate::idle::{IdlePool, IdleServer, SelectionPolicy};
use pbview_core::{ServerId, View, ViewNumber};

/// All mutable state of the view service
#[derive(Debug)]
pub struct ViewState {
    /// `None` until the first server reports
    current: Option<View>,

    /// Proposed successor of `current`
    pending: Option<View>,

    /// The primary of `current` has confirmed it runs `current.viewnum`
    acknowledged: bool,

    detector: FailureDetector,

    idle: IdlePool,
}

impl ViewState {
    pub fn new(dead_pings: u32) -> Self {
        Self {
            current: None,
            pending: None,
            acknowledged: false,
            detector: FailureDetector::new(dead_pings),
            idle: IdlePool::new(dead_pings),
        }
    }

    /// Use a custom policy for choosing which idle server becomes backup
    pub fn with_policy(dead_pings: u32, policy: Box<dyn SelectionPolicy>) -> Self {
        Self {
            idle: IdlePool::with_policy(dead_pings, policy),
            ..Self::new(dead_pings)
        }
    }

    /// Handle a liveness report from `caller`, which runs `viewnum`
    /// (0 after a fresh start). Returns the current view.
    pub fn ping(&mut self, caller: &ServerId, viewnum: ViewNumber) -> View {
        if viewnum == 0 {
            self.on_fresh_start(caller);
        } else {
            self.on_acknowledge(caller, viewnum);
        }
        self.refresh(caller);
        self.get()
    }

    /// The current view, or the uninitialized view when nobody reported yet
    pub fn get(&self) -> View {
        self.current.clone().unwrap_or_else(View::uninitialized)
    }

    /// Advance the failure detector by one tick
    pub fn tick(&mut self) {
        for server in self.idle.age() {
            tracing::debug!(%server, "idle server presumed dead");
        }
        self.detector.advance(self.current.as_ref());
        if self.acknowledged {
            self.try_transition();
        }
    }

    pub fn acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn pending(&self) -> Option<&View> {
        self.pending.as_ref()
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub fn idle(&self) -> &IdlePool {
        &self.idle
    }

    fn on_fresh_start(&mut self, caller: &ServerId) {
        if caller.is_empty() {
            return;
        }
        let Some(view) = self.current.as_ref() else {
            let view = View::initial(caller.clone());
            tracing::info!(viewnum = view.viewnum, primary = %caller, "first view installed");
            self.current = Some(view);
            return;
        };

        if view.is_primary(caller) {
            tracing::info!(primary = %caller, viewnum = view.viewnum, "primary restarted");
            self.detector.expire_primary();
            if self.acknowledged {
                self.try_transition();
            }
        } else if !view.is_backup(caller) {
            self.idle.refresh(caller.clone());
        }
    }

    fn on_acknowledge(&mut self, caller: &ServerId, viewnum: ViewNumber) {
        let Some(view) = self.current.as_ref() else {
            return;
        };
        if !view.is_primary(caller) || view.viewnum != viewnum {
            return;
        }
        if !self.acknowledged {
            tracing::debug!(primary = %caller, viewnum, "view acknowledged");
        }
        self.acknowledged = true;
        self.try_transition();
    }

    fn refresh(&mut self, caller: &ServerId) {
        if caller.is_empty() {
            return;
        }
        match self.current.as_ref() {
            Some(view) if view.is_primary(caller) => self.detector.refresh_primary(),
            Some(view) if view.is_backup(caller) => self.detector.refresh_backup(),
            _ => self.idle.refresh(caller.clone()),
        }
    }

    /// Move past an acknowledged view if the roles need to change. Returns
    /// whether a new view was committed; a commit clears `acknowledged`.
    fn try_transition(&mut self) -> bool {
        if !self.acknowledged {
            return false;
        }
        let Some((next, candidate)) = self.propose() else {
            return false;
        };
        self.pending = Some(next);
        self.commit(candidate)
    }

    /// Work out the successor view from the liveness of both role holders.
    /// Also returns the idle server drawn for the backup slot, if any.
    fn propose(&mut self) -> Option<(View, Option<IdleServer>)> {
        let view = self.current.as_ref()?;
        if view.backup.is_none() && self.idle.is_empty() {
            return None;
        }

        let (primary, candidate) = match (
            self.detector.primary_alive(),
            self.detector.backup_alive(),
        ) {
            (true, false) => (view.primary.clone(), self.idle.take()),
            (false, true) => (view.backup.clone(), self.idle.take()),
            // Only a former backup holds current state, so an idle server
            // is never made primary.
            (false, false) => (None, None),
            (true, true) => return None,
        };
        let backup = candidate.as_ref().map(|c| c.id.clone());
        Some((view.successor(primary, backup), candidate))
    }

    fn commit(&mut self, candidate: Option<IdleServer>) -> bool {
        let (Some(current), Some(next)) = (self.current.as_ref(), self.pending.take()) else {
            return false;
        };
        if next.same_roles(current) {
            debug_assert!(candidate.is_none(), "a drawn candidate always changes the roles");
            return false;
        }

        self.detector
            .reassign(current, &next, candidate.map(|c| c.ttl));
        for server in next.primary.iter().chain(next.backup.iter()) {
            self.idle.remove(server);
        }

        tracing::info!(from = current.viewnum, view = %next, "view changed");
        self.current = Some(next);
        self.acknowledged = false;
        true
    }
}
