//! Thread-safe view service
//!
//! Wraps [`ViewState`] behind a single lock so that concurrent pings and
//! the periodic tick never interleave.

use crate::idle::SelectionPolicy;
use crate::state::ViewState;
use pbview_core::{ServerId, View, ViewNumber, ViewServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// The view service
pub struct ViewService {
    state: Mutex<ViewState>,

    tick_interval: Duration,
}

impl ViewService {
    pub fn new(config: &ViewServiceConfig) -> Self {
        Self::from_state(config, ViewState::new(config.dead_pings))
    }

    /// Create with a custom idle-server selection policy
    pub fn with_policy(config: &ViewServiceConfig, policy: Box<dyn SelectionPolicy>) -> Self {
        Self::from_state(config, ViewState::with_policy(config.dead_pings, policy))
    }

    fn from_state(config: &ViewServiceConfig, state: ViewState) -> Self {
        Self {
            state: Mutex::new(state),
            tick_interval: config.tick_interval,
        }
    }

    /// Liveness report from `caller`; returns the current view
    pub async fn ping(&self, caller: &ServerId, viewnum: ViewNumber) -> View {
        let mut state = self.state.lock().await;
        state.ping(caller, viewnum)
    }

    /// The current view
    pub async fn get(&self) -> View {
        self.state.lock().await.get()
    }

    /// Advance the failure detector by one tick
    pub async fn tick(&self) {
        self.state.lock().await.tick();
    }

    /// Run `f` against the state while holding the lock
    pub async fn inspect<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Spawn the periodic tick driver. It stops once `shutdown` turns true
    /// or its sender is dropped.
    pub fn spawn_ticker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("ticker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ViewServiceConfig {
        ViewServiceConfig {
            tick_interval: Duration::from_millis(10),
            dead_pings: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_ping_and_get() {
        let service = ViewService::new(&config());
        tokio_test::block_on(async {
            assert_eq!(service.get().await.viewnum, 0);

            let a = ServerId::new("a");
            let view = service.ping(&a, 0).await;
            assert_eq!(view.viewnum, 1);
            assert_eq!(service.get().await, view);
            assert_eq!(service.get().await, view);
        });
    }

    #[test]
    fn test_inspect_sees_idle_pool() {
        let service = ViewService::new(&config());
        tokio_test::block_on(async {
            service.ping(&ServerId::new("a"), 0).await;
            service.ping(&ServerId::new("b"), 0).await;
            let idle = service.inspect(|s| s.idle().ids()).await;
            assert_eq!(idle, vec![ServerId::new("b")]);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_expires_silent_primary() {
        let service = Arc::new(ViewService::new(&config()));
        let a = ServerId::new("a");
        let b = ServerId::new("b");
        service.ping(&a, 0).await;
        service.ping(&b, 0).await;
        service.ping(&a, 1).await;
        service.ping(&b, 2).await;
        service.ping(&a, 2).await;

        let (tx, rx) = watch::channel(false);
        let ticker = service.clone().spawn_ticker(rx);

        // Only the backup keeps reporting
        for _ in 0..10 {
            service.ping(&b, 2).await;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let view = service.get().await;
        assert_eq!(view.viewnum, 3);
        assert_eq!(view.primary, Some(b));
        assert_eq!(view.backup, None);

        tx.send(true).unwrap();
        ticker.await.unwrap();
    }
}
