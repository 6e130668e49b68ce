use std::collections::HashMap;

use chrono::Utc;
use corsair_domain::entities::{EditSession, IntakeSession};
use corsair_domain::value_objects::SessionKey;

/// One in-flight conversational workflow.
#[derive(Debug, Clone)]
pub enum Session {
    Intake(IntakeSession),
    Edit(EditSession),
}

impl Session {
    fn is_expired(&self, now: chrono::DateTime<Utc>) -> bool {
        match self {
            Session::Intake(session) => session.is_expired(now),
            Session::Edit(session) => session.is_expired(now),
        }
    }
}

/// Result of looking up a session key. Expiry is observable: the caller is
/// expected to tell the user their session lapsed.
#[derive(Debug)]
pub enum SessionAccess {
    Active(Session),
    Expired,
    Vacant,
}

/// Keyed registry of in-flight sessions. Expired entries are collected
/// lazily on access; there is no background sweep. Commands take a session
/// out, work on it (including across awaits) and put it back only when they
/// accept the message, which serializes same-key processing.
#[derive(Debug, Default)]
pub struct SessionStore {
    entries: HashMap<SessionKey, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the session under `key`. A session past its
    /// expiry is dropped and reported as `Expired`.
    pub fn take(&mut self, key: &SessionKey) -> SessionAccess {
        match self.entries.remove(key) {
            None => SessionAccess::Vacant,
            Some(session) if session.is_expired(Utc::now()) => SessionAccess::Expired,
            Some(session) => SessionAccess::Active(session),
        }
    }

    pub fn put(&mut self, session: Session) {
        match session {
            Session::Intake(session) => self.put_intake(session),
            Session::Edit(session) => self.put_edit(session),
        }
    }

    pub fn put_intake(&mut self, session: IntakeSession) {
        self.entries
            .insert(session.key.clone(), Session::Intake(session));
    }

    pub fn put_edit(&mut self, session: EditSession) {
        self.entries.insert(session.key.clone(), Session::Edit(session));
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
