use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{SessionRecord, USER_ID_KEY};

pub(crate) fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Per-request handle on the browser's session.
///
/// Cloning is cheap and every clone sees the same state, so handlers can
/// mutate the session and the session layer sees the change when it commits.
#[derive(Clone, Debug)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

#[derive(Debug)]
struct SessionState {
    token: String,
    data: Map<String, Value>,
    /// Payload as loaded; a session is modified iff `data` differs from it.
    original: Map<String, Value>,
    /// `Some` when the token exists in the store.
    persisted: Option<Persisted>,
    /// Persisted token dropped by `regenerate`, to be removed on commit.
    discarded: Option<String>,
    destroyed: bool,
}

#[derive(Debug, Clone, Copy)]
struct Persisted {
    touched_at: DateTime<Utc>,
}

/// What the session layer must do with the store once the handler is done.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Nothing to write, nothing to send.
    None,
    /// Write the record. `set_cookie` is true for tokens the browser doesn't have yet.
    Save {
        record: SessionRecord,
        set_cookie: bool,
    },
    /// Push the expiry of an unchanged session forward.
    Touch {
        token: String,
        expires_at: DateTime<Utc>,
    },
    /// Remove the record (if it was ever stored) and clear the cookie.
    Destroy { token: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitPlan {
    /// A token replaced by `regenerate` that must be deleted from the store.
    pub discard: Option<String>,
    pub action: SessionAction,
}

impl Session {
    /// A fresh session that is not in the store yet.
    pub fn new() -> Self {
        Self::from_state(SessionState {
            token: new_token(),
            data: Map::new(),
            original: Map::new(),
            persisted: None,
            discarded: None,
            destroyed: false,
        })
    }

    /// Wraps a record loaded from the store.
    pub fn from_record(record: SessionRecord) -> Self {
        Self::from_state(SessionState {
            token: record.token,
            original: record.data.clone(),
            data: record.data,
            persisted: Some(Persisted {
                touched_at: record.touched_at,
            }),
            discarded: None,
            destroyed: false,
        })
    }

    fn from_state(state: SessionState) -> Self {
        Session {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        // The state is plain data; a panic elsewhere cannot leave it half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn token(&self) -> String {
        self.state().token.clone()
    }

    pub fn is_new(&self) -> bool {
        self.state().persisted.is_none()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.state().data.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.state().data.remove(key)
    }

    /// Reads and removes a value in one step.
    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.remove(key)?;
        serde_json::from_value(value).ok()
    }

    /// Id of the logged-in user, if any.
    pub fn user_id(&self) -> Option<String> {
        self.get::<String>(USER_ID_KEY)
    }

    /// Switches to a new, empty session under a new token. The old record is
    /// deleted on commit. Used on login so a pre-login token never becomes
    /// an authenticated one.
    pub fn regenerate(&self) {
        let mut state = self.state();
        if state.persisted.is_some() {
            state.discarded = Some(state.token.clone());
        }
        state.token = new_token();
        state.data = Map::new();
        state.original = Map::new();
        state.persisted = None;
        state.destroyed = false;
    }

    /// Marks the session for deletion.
    pub fn destroy(&self) {
        self.state().destroyed = true;
    }

    pub fn is_modified(&self) -> bool {
        let state = self.state();
        state.data != state.original
    }

    /// Decides what to write at the end of the request.
    ///
    /// New sessions are only saved once they hold data. Loaded sessions are
    /// saved only when their payload changed, otherwise touched at most once
    /// per `touch_after` (a zero duration disables touching).
    pub fn plan(&self, now: DateTime<Utc>, ttl: Duration, touch_after: Duration) -> CommitPlan {
        let state = self.state();
        let discard = state.discarded.clone();

        let action = if state.destroyed {
            SessionAction::Destroy {
                token: state.persisted.map(|_| state.token.clone()),
            }
        } else if state.data != state.original {
            let mut record = SessionRecord::new(state.token.clone(), state.data.clone(), now + ttl);
            record.touched_at = now;
            SessionAction::Save {
                record,
                set_cookie: state.persisted.is_none(),
            }
        } else {
            match state.persisted {
                Some(p) if touch_after > Duration::zero() && now - p.touched_at >= touch_after => {
                    SessionAction::Touch {
                        token: state.token.clone(),
                        expires_at: now + ttl,
                    }
                }
                _ => SessionAction::None,
            }
        };

        CommitPlan { discard, action }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl() -> Duration {
        Duration::days(14)
    }

    fn loaded(data: Map<String, Value>, touched_at: DateTime<Utc>) -> Session {
        let mut record = SessionRecord::new("tok".to_string(), data, touched_at + ttl());
        record.touched_at = touched_at;
        Session::from_record(record)
    }

    #[test]
    fn test_untouched_new_session_is_not_saved() {
        let session = Session::new();
        let plan = session.plan(Utc::now(), ttl(), Duration::hours(1));
        assert_eq!(plan.action, SessionAction::None);
        assert_eq!(plan.discard, None);
    }

    #[test]
    fn test_new_session_with_data_is_saved_with_cookie() {
        let session = Session::new();
        session.insert("flash", "hello").unwrap();
        let now = Utc::now();

        match session.plan(now, ttl(), Duration::hours(1)).action {
            SessionAction::Save { record, set_cookie } => {
                assert!(set_cookie);
                assert_eq!(record.token, session.token());
                assert_eq!(record.expires_at, now + ttl());
                assert_eq!(record.data.get("flash"), Some(&Value::from("hello")));
            }
            other => panic!("expected save, got {:?}", other),
        }
    }

    /// Inserting then removing the same key leaves nothing to save.
    #[test]
    fn test_reverted_change_is_not_a_modification() {
        let session = Session::new();
        session.insert("k", 1).unwrap();
        session.remove("k");
        assert!(!session.is_modified());
        assert_eq!(
            session.plan(Utc::now(), ttl(), Duration::zero()).action,
            SessionAction::None
        );
    }

    #[test]
    fn test_unchanged_loaded_session_is_not_resaved() {
        let mut data = Map::new();
        data.insert(USER_ID_KEY.to_string(), Value::from("u1"));
        let now = Utc::now();
        let session = loaded(data, now - Duration::minutes(5));

        // Writing the same value again is not a change.
        session.insert(USER_ID_KEY, "u1").unwrap();

        let plan = session.plan(now, ttl(), Duration::hours(1));
        assert_eq!(plan.action, SessionAction::None);
    }

    #[test]
    fn test_changed_loaded_session_saved_without_cookie() {
        let session = loaded(Map::new(), Utc::now());
        session.insert("k", "v").unwrap();
        match session.plan(Utc::now(), ttl(), Duration::hours(1)).action {
            SessionAction::Save { set_cookie, record } => {
                assert!(!set_cookie);
                assert_eq!(record.token, "tok");
            }
            other => panic!("expected save, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_unchanged_session_is_touched() {
        let now = Utc::now();
        let session = loaded(Map::new(), now - Duration::hours(2));
        assert_eq!(
            session.plan(now, ttl(), Duration::hours(1)).action,
            SessionAction::Touch {
                token: "tok".to_string(),
                expires_at: now + ttl(),
            }
        );
        // Touching disabled.
        assert_eq!(
            session.plan(now, ttl(), Duration::zero()).action,
            SessionAction::None
        );
    }

    #[test]
    fn test_regenerate_discards_old_token() {
        let session = loaded(Map::new(), Utc::now());
        session.regenerate();
        session.insert(USER_ID_KEY, "u1").unwrap();

        let plan = session.plan(Utc::now(), ttl(), Duration::hours(1));
        assert_eq!(plan.discard.as_deref(), Some("tok"));
        match plan.action {
            SessionAction::Save { record, set_cookie } => {
                assert!(set_cookie);
                assert_ne!(record.token, "tok");
                assert_eq!(record.user_id(), Some("u1"));
            }
            other => panic!("expected save, got {:?}", other),
        }
    }

    #[test]
    fn test_destroy_persisted_and_new() {
        let persisted = loaded(Map::new(), Utc::now());
        persisted.destroy();
        assert_eq!(
            persisted.plan(Utc::now(), ttl(), Duration::zero()).action,
            SessionAction::Destroy {
                token: Some("tok".to_string())
            }
        );

        let fresh = Session::new();
        fresh.insert("k", "v").unwrap();
        fresh.destroy();
        assert_eq!(
            fresh.plan(Utc::now(), ttl(), Duration::zero()).action,
            SessionAction::Destroy { token: None }
        );
    }

    #[test]
    fn test_take_removes_value() {
        let session = Session::new();
        session.insert("state", "abc").unwrap();
        assert_eq!(session.take::<String>("state").as_deref(), Some("abc"));
        assert_eq!(session.get::<String>("state"), None);
    }
}
