//! Per-session chat state and the in-memory session store.
//!
//! A [`ChatSession`] is created when a visitor starts chatting, mutated only
//! by the controller (transcript) and the gate (unlock), and dropped when the
//! session ends. The server keeps sessions in a [`SessionStore`]; the
//! terminal surfaces own a single session directly.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::gate::AccessGate;
use crate::models::Transcript;

#[derive(Debug)]
pub struct ChatSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub transcript: Transcript,
    pub gate: AccessGate,
}

impl ChatSession {
    pub fn new(gate: AccessGate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active: now,
            transcript: Transcript::new(),
            gate,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Sessions keyed by id.
///
/// The map lock is held only for lookup, insert, and remove. Each session has
/// its own mutex, held for the length of one turn.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: ChatSession) -> Uuid {
        let id = session.id;
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop sessions idle for longer than `max_idle`. Sessions with a turn in
    /// flight are skipped. Returns how many were removed.
    ///
    /// A `max_idle` reaching before the earliest representable time removes nothing.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(s) => s.last_active >= cutoff,
            Err(_) => true,
        });
        before - sessions.len()
    }
}
