//! Failure detection
//!
//! Liveness is counted in ticks: every ping resets a countdown to the
//! dead-ping threshold and every tick decrements it. A countdown at zero
//! means the server is presumed dead.

use pbview_core::{ServerId, View};

/// Remaining ticks before a server is presumed dead
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Ttl(u32);

impl Ttl {
    pub const EXPIRED: Self = Self(0);

    pub fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    pub fn remaining(&self) -> u32 {
        self.0
    }

    pub fn is_alive(&self) -> bool {
        self.0 > 0
    }

    /// Count down one tick, saturating at zero
    pub fn decay(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }
}

/// Per-role failure detector for the primary and the backup
#[derive(Clone, Debug)]
pub struct FailureDetector {
    /// Ticks granted by a fresh ping
    dead_pings: u32,

    primary: Ttl,
    backup: Ttl,
}

impl FailureDetector {
    pub fn new(dead_pings: u32) -> Self {
        Self {
            dead_pings,
            primary: Ttl::EXPIRED,
            backup: Ttl::EXPIRED,
        }
    }

    /// A freshly reset countdown
    pub fn fresh(&self) -> Ttl {
        Ttl::new(self.dead_pings)
    }

    pub fn primary_ttl(&self) -> Ttl {
        self.primary
    }

    pub fn backup_ttl(&self) -> Ttl {
        self.backup
    }

    pub fn primary_alive(&self) -> bool {
        self.primary.is_alive()
    }

    pub fn backup_alive(&self) -> bool {
        self.backup.is_alive()
    }

    pub fn refresh_primary(&mut self) {
        self.primary = self.fresh();
    }

    pub fn refresh_backup(&mut self) {
        self.backup = self.fresh();
    }

    /// Mark the primary dead right away (it restarted and lost its state)
    pub fn expire_primary(&mut self) {
        self.primary = Ttl::EXPIRED;
    }

    /// Advance one tick. Vacant roles have nothing to age and stay expired.
    pub fn advance(&mut self, view: Option<&View>) {
        match view.and_then(|v| v.primary.as_ref()) {
            Some(_) => self.primary.decay(),
            None => self.primary = Ttl::EXPIRED,
        }
        match view.and_then(|v| v.backup.as_ref()) {
            Some(_) => self.backup.decay(),
            None => self.backup = Ttl::EXPIRED,
        }
    }

    /// Carry liveness over to the roles of a newly committed view.
    ///
    /// A server keeps the countdown it already had: a promoted backup
    /// brings its backup ttl, a server drawn from the idle pool brings
    /// `candidate`.
    pub fn reassign(&mut self, old: &View, new: &View, candidate: Option<Ttl>) {
        let carried = |server: Option<&ServerId>| match server {
            None => Ttl::EXPIRED,
            Some(s) if old.is_primary(s) => self.primary,
            Some(s) if old.is_backup(s) => self.backup,
            Some(_) => candidate.unwrap_or(Ttl::EXPIRED),
        };
        let primary = carried(new.primary.as_ref());
        let backup = carried(new.backup.as_ref());
        self.primary = primary;
        self.backup = backup;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(viewnum: u64, primary: Option<&str>, backup: Option<&str>) -> View {
        View {
            viewnum,
            primary: primary.map(ServerId::new),
            backup: backup.map(ServerId::new),
        }
    }

    #[test]
    fn test_ttl_saturates_at_zero() {
        let mut ttl = Ttl::new(1);
        ttl.decay();
        ttl.decay();
        assert_eq!(ttl, Ttl::EXPIRED);
        assert!(!ttl.is_alive());
    }

    #[test]
    fn test_refresh_then_expire_after_threshold() {
        let mut fd = FailureDetector::new(3);
        let v = view(1, Some("a"), None);
        fd.refresh_primary();

        fd.advance(Some(&v));
        fd.advance(Some(&v));
        assert!(fd.primary_alive());

        fd.advance(Some(&v));
        assert!(!fd.primary_alive());
    }

    #[test]
    fn test_vacant_roles_are_forced_expired() {
        let mut fd = FailureDetector::new(5);
        fd.refresh_primary();
        fd.refresh_backup();

        fd.advance(Some(&view(2, Some("a"), None)));
        assert_eq!(fd.primary_ttl().remaining(), 4);
        assert_eq!(fd.backup_ttl(), Ttl::EXPIRED);

        fd.advance(None);
        assert_eq!(fd.primary_ttl(), Ttl::EXPIRED);
    }

    #[test]
    fn test_reassign_follows_the_server() {
        let mut fd = FailureDetector::new(5);
        fd.refresh_backup();
        fd.expire_primary();

        let old = view(2, Some("a"), Some("b"));
        let new = view(3, Some("b"), Some("c"));
        fd.reassign(&old, &new, Some(Ttl::new(2)));

        assert_eq!(fd.primary_ttl().remaining(), 5);
        assert_eq!(fd.backup_ttl().remaining(), 2);
    }
}
