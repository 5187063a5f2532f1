//! Single-Flight Module
//!
//! Tracks in-progress supplier computations so that concurrent misses on the
//! same (key, params) pair share one computation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Notify;

use crate::cache::Params;

/// Identity of a flight: the full composite key of the entry being computed.
pub type FlightKey = (String, Params);

// == Flight ==
/// One in-progress computation. Created running, finished exactly once.
#[derive(Debug, Default)]
pub struct Flight {
    done: Mutex<bool>,
    blocking_waiters: Condvar,
    async_waiters: Notify,
}

impl Flight {
    fn finish(&self) {
        let mut done = self.done.lock();
        *done = true;
        drop(done);

        self.blocking_waiters.notify_all();
        self.async_waiters.notify_waiters();
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock()
    }

    /// Blocks the current thread until the flight finishes.
    pub fn wait_blocking(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.blocking_waiters.wait(&mut done);
        }
    }

    /// Blocks until the flight finishes from whatever context the caller is in.
    ///
    /// On a multi-thread tokio worker the wait happens inside `block_in_place`,
    /// so tasks queued on this worker, possibly the leader, move elsewhere.
    /// On a current-thread runtime the leader may be a task that can only run
    /// on this very thread, so nothing waits and false is returned.
    pub fn wait_blocking_in_context(&self) -> bool {
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Err(_) => {
                self.wait_blocking();
                true
            }
            Ok(RuntimeFlavor::CurrentThread) => false,
            Ok(_) => {
                tokio::task::block_in_place(|| self.wait_blocking());
                true
            }
        }
    }

    /// Suspends until the flight finishes.
    pub async fn wait(&self) {
        loop {
            let notified = self.async_waiters.notified();
            tokio::pin!(notified);
            // Register before checking so a finish in between is not missed
            notified.as_mut().enable();

            if self.is_done() {
                return;
            }
            notified.await;
        }
    }
}

// == Join ==
/// Outcome of joining a flight.
pub enum Join<'a> {
    /// The caller started the flight and must run the supplier
    Leader(FlightGuard<'a>),
    /// Another caller is already computing; wait on this flight
    Follower(Arc<Flight>),
}

// == Flight Table ==
/// All in-progress flights of one store.
#[derive(Debug, Default)]
pub struct FlightTable {
    flights: DashMap<FlightKey, Arc<Flight>>,
}

impl FlightTable {
    /// Joins the flight for `(key, params)`, starting it if none is running.
    pub fn join(&self, key: &str, params: &Params) -> Join<'_> {
        let flight_key = (key.to_string(), params.clone());
        match self.flights.entry(flight_key) {
            Entry::Occupied(occupied) => Join::Follower(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let flight_key = vacant.key().clone();
                let flight = Arc::new(Flight::default());
                vacant.insert(Arc::clone(&flight));
                Join::Leader(FlightGuard {
                    table: self,
                    key: flight_key,
                    flight,
                })
            }
        }
    }

    /// Number of computations currently in progress.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

// == Flight Guard ==
/// Held by the leader while its supplier runs.
///
/// Dropping the guard, including on panic or when an async leader is
/// cancelled, ends the flight and wakes every waiter.
pub struct FlightGuard<'a> {
    table: &'a FlightTable,
    key: FlightKey,
    flight: Arc<Flight>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.table.flights.remove(&self.key);
        self.flight.finish();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_join_leads() {
        let table = FlightTable::default();

        let leader = table.join("k", &params![1]);
        assert!(matches!(leader, Join::Leader(_)));
        assert!(matches!(table.join("k", &params![1]), Join::Follower(_)));
        assert!(matches!(table.join("k", &params![2]), Join::Leader(_)));
        assert_eq!(table.in_flight(), 1);
    }

    #[test]
    fn test_guard_drop_ends_flight() {
        let table = FlightTable::default();

        let guard = match table.join("k", &Params::none()) {
            Join::Leader(guard) => guard,
            Join::Follower(_) => panic!("expected leader"),
        };
        let flight = match table.join("k", &Params::none()) {
            Join::Follower(flight) => flight,
            Join::Leader(_) => panic!("expected follower"),
        };

        assert!(!flight.is_done());
        drop(guard);
        assert!(flight.is_done());
        assert_eq!(table.in_flight(), 0);
        assert!(matches!(table.join("k", &Params::none()), Join::Leader(_)));
    }

    #[test]
    fn test_wait_blocking_wakes_on_finish() {
        let table = Arc::new(FlightTable::default());
        let flight = {
            let guard = match table.join("k", &Params::none()) {
                Join::Leader(guard) => guard,
                Join::Follower(_) => panic!("expected leader"),
            };
            let flight = Arc::clone(&guard.flight);

            let waiter = {
                let flight = Arc::clone(&flight);
                thread::spawn(move || flight.wait_blocking())
            };
            thread::sleep(Duration::from_millis(20));
            drop(guard);
            waiter.join().unwrap();
            flight
        };
        assert!(flight.is_done());
    }

    #[tokio::test]
    async fn test_wait_async_wakes_on_finish() {
        let flight = Arc::new(Flight::default());

        let waiter = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move { flight.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        flight.finish();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_wait_in_context_outside_runtime_blocks() {
        let flight = Arc::new(Flight::default());

        let finisher = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                flight.finish();
            })
        };

        assert!(flight.wait_blocking_in_context());
        assert!(flight.is_done());
        finisher.join().unwrap();
    }

    #[tokio::test]
    async fn test_wait_in_context_refuses_current_thread_runtime() {
        let flight = Flight::default();
        assert!(!flight.wait_blocking_in_context());
        assert!(!flight.is_done());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_in_context_on_worker_lets_tasks_run() {
        let flight = Arc::new(Flight::default());

        let waiter = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move { flight.wait_blocking_in_context() })
        };
        let finisher = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                flight.finish();
            })
        };

        assert!(waiter.await.unwrap());
        finisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_done() {
        let flight = Flight::default();
        flight.finish();
        flight.wait().await;
        flight.wait_blocking();
    }
}
