#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Request coalescing: concurrent callers asking for the same key share a
//! single in-flight computation instead of each hitting the upstream.
//!
//! The first caller for a key becomes the leader and drives the work;
//! everyone arriving while the flight is open awaits the same shared future
//! and receives a clone of its result. Once the flight settles the key is
//! cleared, so the next caller starts a fresh flight.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, Arc<E>>>>;

/// Coalesces concurrent computations by string key.
///
/// Errors come back as `Arc<E>` because a single failure is delivered to
/// every waiter of the flight.
pub struct Coalescer<T, E> {
    flights: DashMap<String, Flight<T, E>>,
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` under `key`, joining an already-open flight if one
    /// exists. Returns the result and whether this caller joined an
    /// existing flight rather than starting one.
    ///
    /// If a joined caller provided its own `work`, that future is dropped
    /// unexecuted.
    pub async fn run<F>(&self, key: &str, work: F) -> (Result<T, Arc<E>>, bool)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut joined = true;
        let flight = match self.flights.entry(key.to_string()) {
            Entry::Occupied(open) => open.get().clone(),
            Entry::Vacant(slot) => {
                joined = false;
                let flight = async move { work.await.map_err(Arc::new) }.boxed().shared();
                slot.insert(flight.clone());
                flight
            }
        };

        let result = flight.clone().await;

        // Every waiter attempts cleanup, so the key is cleared even when
        // the leader's task was cancelled mid-flight. The pointer check
        // keeps a newer flight under the same key from being removed.
        self.flights
            .remove_if(key, |_, current| flight.ptr_eq(current));

        (result, joined)
    }

    /// Number of currently open flights.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}
