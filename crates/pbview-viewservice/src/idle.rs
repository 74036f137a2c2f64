//! Idle server pool

use crate::failure::Ttl;
use pbview_core::ServerId;

/// Chooses which idle server gets promoted to backup
pub trait SelectionPolicy: Send {
    /// Return the index of the chosen candidate. `candidates` is never
    /// empty and is listed in registration order.
    fn select(&mut self, candidates: &[ServerId]) -> usize;
}

/// Promote the longest-registered idle server first
#[derive(Clone, Copy, Debug, Default)]
pub struct InsertionOrder;

impl SelectionPolicy for InsertionOrder {
    fn select(&mut self, _candidates: &[ServerId]) -> usize {
        0
    }
}

impl<F> SelectionPolicy for F
where
    F: FnMut(&[ServerId]) -> usize + Send,
{
    fn select(&mut self, candidates: &[ServerId]) -> usize {
        self(candidates)
    }
}

/// An idle server and its liveness countdown
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdleServer {
    pub id: ServerId,
    pub ttl: Ttl,
}

/// Servers known to the view service that hold no role
pub struct IdlePool {
    /// Registration order is preserved; refreshing keeps a server's position
    servers: Vec<IdleServer>,

    dead_pings: u32,

    policy: Box<dyn SelectionPolicy>,
}

impl IdlePool {
    pub fn new(dead_pings: u32) -> Self {
        Self::with_policy(dead_pings, Box::new(InsertionOrder))
    }

    pub fn with_policy(dead_pings: u32, policy: Box<dyn SelectionPolicy>) -> Self {
        Self {
            servers: Vec::new(),
            dead_pings,
            policy,
        }
    }

    /// Register a server, or reset its countdown if already known
    pub fn refresh(&mut self, id: ServerId) {
        let ttl = Ttl::new(self.dead_pings);
        match self.servers.iter_mut().find(|s| s.id == id) {
            Some(server) => server.ttl = ttl,
            None => self.servers.push(IdleServer { id, ttl }),
        }
    }

    /// Age every member by one tick and evict the ones that expired
    pub fn age(&mut self) -> Vec<ServerId> {
        let mut evicted = Vec::new();
        self.servers.retain_mut(|server| {
            server.ttl.decay();
            if server.ttl.is_alive() {
                true
            } else {
                evicted.push(server.id.clone());
                false
            }
        });
        evicted
    }

    /// Remove and return one candidate chosen by the selection policy
    pub fn take(&mut self) -> Option<IdleServer> {
        if self.servers.is_empty() {
            return None;
        }
        let ids: Vec<ServerId> = self.servers.iter().map(|s| s.id.clone()).collect();
        let index = self.policy.select(&ids).min(self.servers.len() - 1);
        Some(self.servers.remove(index))
    }

    pub fn remove(&mut self, id: &ServerId) -> Option<IdleServer> {
        let index = self.servers.iter().position(|s| &s.id == id)?;
        Some(self.servers.remove(index))
    }

    pub fn contains(&self, id: &ServerId) -> bool {
        self.servers.iter().any(|s| &s.id == id)
    }

    pub fn ttl(&self, id: &ServerId) -> Option<Ttl> {
        self.servers.iter().find(|s| &s.id == id).map(|s| s.ttl)
    }

    pub fn ids(&self) -> Vec<ServerId> {
        self.servers.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl std::fmt::Debug for IdlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdlePool")
            .field("servers", &self.servers)
            .field("dead_pings", &self.dead_pings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ServerId {
        ServerId::new(s)
    }

    #[test]
    fn test_refresh_keeps_registration_order() {
        let mut pool = IdlePool::new(3);
        pool.refresh(id("a"));
        pool.refresh(id("b"));
        pool.refresh(id("a"));

        assert_eq!(pool.ids(), vec![id("a"), id("b")]);
        assert_eq!(pool.take().map(|s| s.id), Some(id("a")));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_age_evicts_expired_members() {
        let mut pool = IdlePool::new(2);
        pool.refresh(id("a"));
        pool.age();
        pool.refresh(id("b"));

        let evicted = pool.age();
        assert_eq!(evicted, vec![id("a")]);
        assert!(pool.contains(&id("b")));
        assert_eq!(pool.ttl(&id("b")), Some(Ttl::new(1)));
    }

    #[test]
    fn test_injected_policy_picks_candidate() {
        let mut pool = IdlePool::with_policy(5, Box::new(|c: &[ServerId]| c.len() - 1));
        pool.refresh(id("a"));
        pool.refresh(id("b"));
        pool.refresh(id("c"));

        assert_eq!(pool.take().map(|s| s.id), Some(id("c")));
        assert_eq!(pool.take().map(|s| s.id), Some(id("b")));
    }

    #[test]
    fn test_take_from_empty_pool() {
        let mut pool = IdlePool::new(5);
        assert!(pool.take().is_none());
    }
}
