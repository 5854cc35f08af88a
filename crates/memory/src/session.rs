//! Per-session conversation windows, kept in process memory.
//!
//! Each session holds at most `max_turns` turns; older turns fall off the
//! front. The number of sessions is bounded too: inserting a new session at
//! capacity evicts the least recently used one, and an optional idle TTL
//! prunes sessions nobody has touched for a while.
//!
//! The map lock is only held for short synchronous sections. Callers that
//! need read-modify-write across an await take the per-session lock from
//! [`SessionStore::lock`] first.

use chatrelay_core::message::Turn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::debug;

/// Default number of turns kept per session.
pub const DEFAULT_MAX_TURNS: usize = 20;

/// Default number of sessions kept before eviction.
pub const DEFAULT_MAX_SESSIONS: usize = 1_000;

/// Exclusive hold on one session. Released on drop.
pub type SessionGuard = OwnedMutexGuard<()>;

struct SessionSlot {
    turns: Vec<Turn>,
    last_active: Instant,
    /// Logical clock value of the last access, for LRU ordering.
    last_used: u64,
}

#[derive(Default)]
struct Sessions {
    slots: HashMap<String, SessionSlot>,
    clock: u64,
}

impl Sessions {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

pub struct SessionStore {
    sessions: RwLock<Sessions>,
    /// Locks for sessions with a request in flight. Entries nobody holds are
    /// dropped on the next `lock` call.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    max_turns: usize,
    max_sessions: usize,
    idle_ttl: Option<Duration>,
}

impl SessionStore {
    /// Both limits are clamped to at least 1.
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            locks: StdMutex::new(HashMap::new()),
            max_turns: max_turns.max(1),
            max_sessions: max_sessions.max(1),
            idle_ttl: None,
        }
    }

    /// Prune sessions idle for longer than `ttl`. A zero duration disables
    /// pruning.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// History for a session, oldest first. Empty if the session is unknown
    /// or has been idle past the TTL, in which case it is dropped.
    pub async fn get(&self, session_id: &str) -> Vec<Turn> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let expired = sessions
            .slots
            .get(session_id)
            .is_some_and(|slot| self.is_expired(slot, now));
        if expired {
            sessions.slots.remove(session_id);
            debug!(session_id, "Session expired");
            return Vec::new();
        }

        let tick = sessions.tick();
        match sessions.slots.get_mut(session_id) {
            Some(slot) => {
                slot.last_used = tick;
                slot.last_active = now;
                slot.turns.clone()
            }
            None => Vec::new(),
        }
    }

    /// Add one turn, dropping the oldest turns beyond the limit.
    pub async fn append(&self, session_id: &str, turn: Turn) {
        self.update(session_id, |turns| turns.push(turn)).await;
    }

    /// Add a user turn and its reply as one step.
    pub async fn append_exchange(&self, session_id: &str, user: Turn, assistant: Turn) {
        self.update(session_id, |turns| {
            turns.push(user);
            turns.push(assistant);
        })
        .await;
    }

    /// Replace a session's history, keeping only the most recent turns.
    pub async fn set(&self, session_id: &str, history: Vec<Turn>) {
        self.update(session_id, |turns| *turns = history).await;
    }

    /// Remove a session. Returns whether it existed.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.slots.remove(session_id).is_some()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.slots.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Acquire the exclusive lock for one session.
    ///
    /// Requests on the same session queue here; requests on different
    /// sessions never contend.
    pub async fn lock(&self, session_id: &str) -> SessionGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        mutex.lock_owned().await
    }

    fn is_expired(&self, slot: &SessionSlot, now: Instant) -> bool {
        self.idle_ttl
            .is_some_and(|ttl| now.duration_since(slot.last_active) > ttl)
    }

    async fn update(&self, session_id: &str, apply: impl FnOnce(&mut Vec<Turn>)) {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if self.idle_ttl.is_some() {
            let before = sessions.slots.len();
            sessions.slots.retain(|_, slot| !self.is_expired(slot, now));
            let pruned = before - sessions.slots.len();
            if pruned > 0 {
                debug!(pruned, "Pruned idle sessions");
            }
        }

        if !sessions.slots.contains_key(session_id) && sessions.slots.len() >= self.max_sessions {
            if let Some(oldest) = sessions
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                sessions.slots.remove(&oldest);
                debug!(evicted = %oldest, "Session capacity reached, evicted least recently used");
            }
        }

        let tick = sessions.tick();
        let slot = sessions
            .slots
            .entry(session_id.to_string())
            .or_insert_with(|| SessionSlot {
                turns: Vec::new(),
                last_active: now,
                last_used: tick,
            });

        apply(&mut slot.turns);
        if slot.turns.len() > self.max_turns {
            let excess = slot.turns.len() - self.max_turns;
            slot.turns.drain(..excess);
        }
        slot.last_active = now;
        slot.last_used = tick;
        debug!(session_id, turns = slot.turns.len(), "Session updated");
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS, DEFAULT_MAX_SESSIONS)
    }
}
