//! Controller connection limiting.
//!
//! The control socket serves a bounded number of concurrent controllers.
//! Each accepted connection holds an RAII guard that keeps the pool alive
//! for the lifetime of its connection task and frees the slot when the
//! task ends; connections beyond the limit are dropped at accept time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub max_connections: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { max_connections: 8 }
    }
}

/// Counts active controller connections against the configured limit.
pub struct ConnectionPool {
    active: AtomicUsize,
    config: ConnectionConfig,
}

impl ConnectionPool {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            active: AtomicUsize::new(0),
            config,
        }
    }

    /// Try to claim a slot for a newly accepted controller. Returns `None`
    /// when the pool is full.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.active.load(Ordering::Relaxed);
            if current >= self.config.max_connections {
                return None;
            }
            if self
                .active
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    pool: Arc::clone(self),
                });
            }
            // CAS lost a race, retry.
        }
    }

    /// Current number of active connections.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Maximum allowed connections.
    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }

    fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// RAII slot held for the lifetime of one controller connection.
pub struct ConnectionGuard {
    pool: Arc<ConnectionPool>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(max_connections: usize) -> Arc<ConnectionPool> {
        Arc::new(ConnectionPool::new(ConnectionConfig { max_connections }))
    }

    #[test]
    fn test_pool_enforces_limit() {
        let pool = pool(2);
        let a = pool.try_acquire().unwrap();
        let _b = pool.try_acquire().unwrap();
        assert!(pool.try_acquire().is_none());
        drop(a);
        assert!(pool.try_acquire().is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let pool = pool(1);
        {
            let _guard = pool.try_acquire().unwrap();
            assert_eq!(pool.active_count(), 1);
        }
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_guard_outlives_its_pool_binding() {
        // The guard holds the pool itself, as it does when moved into a
        // spawned connection task.
        let guard = {
            let pool = pool(1);
            pool.try_acquire().unwrap()
        };
        assert_eq!(guard.pool.active_count(), 1);
        drop(guard);
    }
}
