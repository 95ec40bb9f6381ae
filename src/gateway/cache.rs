//! Response cache and in-flight read table.
//!
//! # Responsibilities
//! - Serve live cached reads
//! - Coalesce identical concurrent reads onto one execution (single flight)
//! - Drop every entry of a table when that table is written
//!
//! # Design Decisions
//! - One mutex guards entries and in-flight reads together, so the
//!   check-then-insert of a read is atomic across threads
//! - Expiry is checked at read time; eviction is never needed for correctness
//! - A read runs in its own task and is shared by every caller that joined
//!   it; callers that stop waiting abandon it without cancelling it
//! - Each read carries the table generation and cache epoch it started
//!   under; a read that started before a write or clear never repopulates
//!   the cache
//! - A read is stored only if some caller of it asked for caching; a
//!   caching caller that joins a bypass read marks it cacheable
//!
//! # Data Flow
//! ```text
//! lookup(key)
//!     → live entry?          → Hit(value)
//!     → read in flight?      → Joined(shared read)
//!     → otherwise            → start task, register flight → Started(shared read)
//! task settles
//!     → complete(ticket)     → unregister flight, store if still current
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::gateway::GatewayError;
use crate::store::QueryOptions;

/// Outcome of one physical read, shared by all coalesced callers.
pub type ReadOutcome = Result<Value, GatewayError>;

/// A read that any number of callers can await.
pub type SharedRead = Shared<BoxFuture<'static, ReadOutcome>>;

/// Deterministic key for `(table, options)`.
pub fn cache_key(table: &str, options: &QueryOptions) -> Result<String, GatewayError> {
    let descriptor = serde_json::to_string(options)
        .map_err(|e| GatewayError::Internal(format!("unserializable query options: {}", e)))?;
    Ok(format!("{}:{}", table, descriptor))
}

fn table_prefix(table: &str) -> String {
    format!("{}:", table)
}

struct CacheEntry {
    data: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

struct InFlight {
    id: u64,
    read: SharedRead,
    cacheable: bool,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, InFlight>,
    generations: HashMap<String, u64>,
    epoch: u64,
    next_flight_id: u64,
}

impl CacheState {
    fn generation(&self, table: &str) -> u64 {
        self.generations.get(table).copied().unwrap_or(0)
    }
}

/// Identifies one registered read so that its completion can be matched.
#[derive(Debug, Clone)]
pub struct FlightTicket {
    key: String,
    table: String,
    id: u64,
    generation: u64,
    epoch: u64,
}

/// What a lookup found.
pub enum Lookup {
    /// Live cached value.
    Hit(Value),
    /// An identical read is already running.
    Joined(SharedRead),
    /// A new read was started by this lookup.
    Started(SharedRead),
}

/// Counts reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub live_entries: usize,
    pub expired_entries: usize,
    pub in_flight: usize,
}

/// Response cache plus in-flight table. Cheap to clone.
#[derive(Clone, Default)]
pub struct ResponseCache {
    state: Arc<Mutex<CacheState>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up `key`, joining or starting a read on a miss.
    ///
    /// `start` builds the read for a new flight; it is only called when no
    /// identical read is running. The built future runs in its own task and
    /// must call [`ResponseCache::complete`] with the ticket when it settles.
    /// With `use_cache` false the entry map is not consulted.
    pub fn lookup<F>(&self, key: &str, table: &str, use_cache: bool, start: F) -> Lookup
    where
        F: FnOnce(FlightTicket) -> BoxFuture<'static, ReadOutcome>,
    {
        let mut state = self.lock();

        if use_cache {
            let now = Instant::now();
            match state.entries.get(key) {
                Some(entry) if entry.is_live(now) => return Lookup::Hit(entry.data.clone()),
                Some(_) => {
                    state.entries.remove(key);
                }
                None => {}
            }
        }

        if let Some(flight) = state.in_flight.get_mut(key) {
            flight.cacheable |= use_cache;
            return Lookup::Joined(flight.read.clone());
        }

        state.next_flight_id += 1;
        let ticket = FlightTicket {
            key: key.to_string(),
            table: table.to_string(),
            id: state.next_flight_id,
            generation: state.generation(table),
            epoch: state.epoch,
        };
        let id = ticket.id;

        let task = tokio::spawn(start(ticket));
        let read = async move {
            task.await
                .unwrap_or_else(|e| Err(GatewayError::Internal(format!("read task failed: {}", e))))
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.to_string(),
            InFlight {
                id,
                read: read.clone(),
                cacheable: use_cache,
            },
        );
        Lookup::Started(read)
    }

    /// Settle a flight: unregister it and, when `ttl` is given, a caller
    /// asked for caching and nothing invalidated the table meanwhile, cache a
    /// successful outcome.
    pub fn complete(&self, ticket: &FlightTicket, outcome: &ReadOutcome, ttl: Option<Duration>) {
        let mut state = self.lock();

        let cacheable = match state.in_flight.get(&ticket.key) {
            Some(flight) if flight.id == ticket.id => {
                let cacheable = flight.cacheable;
                state.in_flight.remove(&ticket.key);
                cacheable
            }
            // Detached by a write or clear.
            _ => false,
        };

        let current = state.epoch == ticket.epoch && state.generation(&ticket.table) == ticket.generation;
        if let (Some(ttl), Ok(data), true) = (ttl, outcome, cacheable && current) {
            state.entries.insert(
                ticket.key.clone(),
                CacheEntry {
                    data: data.clone(),
                    stored_at: Instant::now(),
                    ttl,
                },
            );
        }
    }

    /// Drop every entry and detach every in-flight read of `table`.
    ///
    /// Returns the number of cache entries removed.
    pub fn invalidate_table(&self, table: &str) -> usize {
        let prefix = table_prefix(table);
        let mut state = self.lock();

        *state.generations.entry(table.to_string()).or_insert(0) += 1;

        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(&prefix));
        state.in_flight.retain(|key, _| !key.starts_with(&prefix));
        before - state.entries.len()
    }

    /// Drop everything. Returns the number of cache entries removed.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        state.epoch += 1;
        let removed = state.entries.len();
        state.entries.clear();
        state.in_flight.clear();
        removed
    }

    /// Remove expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.is_live(now));
        before - state.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let state = self.lock();
        let live_entries = state.entries.values().filter(|e| e.is_live(now)).count();
        CacheStats {
            live_entries,
            expired_entries: state.entries.len() - live_entries,
            in_flight: state.in_flight.len(),
        }
    }
}
