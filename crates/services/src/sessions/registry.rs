use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use quiz_core::model::{QuizId, ResultId, UserId};
use serde::{Deserialize, Serialize};
use storage::repository::StorageError;
use tracing::{debug, info};

use super::quiz_session::QuizSession;
use super::state::{SessionState, StepOutcome};
use crate::error::SessionError;

/// Conversation key a running quiz is filed under (a chat, a terminal, ...).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", self.0)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session states of in-progress runs, keyed by conversation.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    states: Arc<Mutex<HashMap<SessionKey, SessionState>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<SessionKey, SessionState>>, SessionError> {
        self.states
            .lock()
            .map_err(|e| SessionError::Storage(StorageError::Connection(e.to_string())))
    }

    /// Snapshot of the state stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn get(&self, key: &SessionKey) -> Result<Option<SessionState>, SessionError> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn insert(&self, key: SessionKey, state: SessionState) -> Result<(), SessionError> {
        self.lock()?.insert(key, state);
        Ok(())
    }

    /// Overwrite the entry under `key` only while it still holds the same run.
    /// Returns false when the run was cancelled or replaced in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn replace(&self, key: &SessionKey, state: SessionState) -> Result<bool, SessionError> {
        let mut map = self.lock()?;
        match map.get_mut(key) {
            Some(current) if current.result_id() == state.result_id() => {
                *current = state;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Remove the entry under `key` if it still belongs to `result_id`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn discard(&self, key: &SessionKey, result_id: ResultId) -> Result<bool, SessionError> {
        let mut map = self.lock()?;
        if map.get(key).is_some_and(|s| s.result_id() == result_id) {
            map.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn remove(&self, key: &SessionKey) -> Result<Option<SessionState>, SessionError> {
        Ok(self.lock()?.remove(key))
    }

    #[must_use]
    pub fn contains(&self, key: &SessionKey) -> bool {
        self.lock().is_ok_and(|map| map.contains_key(key))
    }
}

/// Conversation-facing entry point: one running quiz per `SessionKey`.
///
/// Steps for one key are expected to arrive one at a time, as a chat transport
/// delivers a user's messages in order. `step` works on a snapshot of the
/// state and writes it back afterwards, and the write-back is skipped when the
/// run was cancelled meanwhile. Two overlapping steps on the same key are not
/// serialised here.
#[derive(Clone)]
pub struct QuizRunner {
    session: QuizSession,
    registry: SessionRegistry,
}

impl QuizRunner {
    #[must_use]
    pub fn new(session: QuizSession, registry: SessionRegistry) -> Self {
        Self { session, registry }
    }

    /// Open a run of `quiz_id` under `key`. The first `step` delivers question one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyRunning` if `key` has a run in progress,
    /// plus anything `QuizSession::start` reports.
    pub async fn start(
        &self,
        key: SessionKey,
        quiz_id: QuizId,
        user: UserId,
    ) -> Result<ResultId, SessionError> {
        if self.registry.contains(&key) {
            return Err(SessionError::AlreadyRunning);
        }
        let state = self.session.start(quiz_id, user).await?;
        let result_id = state.result_id();
        self.registry.insert(key, state)?;
        Ok(result_id)
    }

    /// Feed one inbound message to the run under `key`.
    ///
    /// A failed step keeps the stored position unchanged. A finished run is
    /// removed, so later steps report `NotRunning`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotRunning` without a run under `key`, plus
    /// anything `QuizSession::step` reports.
    pub async fn step(&self, key: &SessionKey, answer: &str) -> Result<StepOutcome, SessionError> {
        let mut state = self.registry.get(key)?.ok_or(SessionError::NotRunning)?;
        let result_id = state.result_id();
        let outcome = self.session.step(&mut state, answer).await?;
        let kept = if state.is_finished() {
            self.registry.discard(key, result_id)?
        } else {
            self.registry.replace(key, state)?
        };
        if !kept {
            debug!(%key, %result_id, "run left the registry during a step");
        }
        Ok(outcome)
    }

    /// Drop the transient state under `key`. Answers already recorded stay, and
    /// the result is left without a completion time.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the registry lock is poisoned.
    pub fn cancel(&self, key: &SessionKey) -> Result<bool, SessionError> {
        let removed = self.registry.remove(key)?;
        if let Some(state) = &removed {
            info!(%key, result_id = %state.result_id(), position = state.position(), "quiz run cancelled");
        }
        Ok(removed.is_some())
    }

    #[must_use]
    pub fn is_running(&self, key: &SessionKey) -> bool {
        self.registry.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{ExternalId, QuestionId, QuizQuestion};

    fn state(result: u64) -> SessionState {
        let questions = vec![QuizQuestion {
            id: QuestionId::new(1),
            external_id: ExternalId::new("t/1").unwrap(),
        }];
        SessionState::new(QuizId::new(1), ResultId::new(result), questions)
    }

    #[test]
    fn write_back_skips_a_cancelled_run() {
        let registry = SessionRegistry::new();
        let key = SessionKey::new("k");
        registry.insert(key.clone(), state(1)).unwrap();
        let mut snapshot = registry.get(&key).unwrap().unwrap();

        registry.remove(&key).unwrap();
        snapshot.advance();
        assert!(!registry.replace(&key, snapshot).unwrap());
        assert!(!registry.contains(&key));
    }

    #[test]
    fn write_back_leaves_a_newer_run_alone() {
        let registry = SessionRegistry::new();
        let key = SessionKey::new("k");
        registry.insert(key.clone(), state(2)).unwrap();

        assert!(!registry.replace(&key, state(1)).unwrap());
        assert!(!registry.discard(&key, ResultId::new(1)).unwrap());
        assert_eq!(registry.get(&key).unwrap().unwrap().result_id(), ResultId::new(2));

        let mut current = state(2);
        current.advance();
        assert!(registry.replace(&key, current).unwrap());
        assert_eq!(registry.get(&key).unwrap().unwrap().position(), 1);
        assert!(registry.discard(&key, ResultId::new(2)).unwrap());
        assert!(!registry.contains(&key));
    }
}
