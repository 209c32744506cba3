//! Anonymous session tracking and per-session upload cooldowns.
//!
//! Sessions are identified by an opaque cookie value. All state lives in one
//! in-memory map behind a mutex and is lost on restart; clients holding a
//! cookie from a previous life of the process are healed back in on their
//! next request.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "lab_session";

#[derive(Debug, Clone)]
struct SessionRecord {
    created_at: Instant,
    last_upload_at: Option<Instant>,
}

impl SessionRecord {
    fn new() -> Self {
        SessionRecord {
            created_at: Instant::now(),
            last_upload_at: None,
        }
    }
}

/// Outcome of resolving a presented session credential.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub id: String,
    /// True when a fresh id was minted and the transport must set a cookie.
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Whole seconds until the next submission is accepted, rounded up.
    /// Zero when allowed.
    pub retry_after_secs: u64,
}

pub struct SessionStore {
    ttl: Duration,
    cooldown: Duration,
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn new(ttl: Duration, cooldown: Duration) -> Self {
        SessionStore {
            ttl,
            cooldown,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Maps a presented session id (or none) to the session this request runs
    /// under.
    ///
    /// A known, unexpired id is returned as-is. An unknown id is adopted with
    /// a fresh record, so cookies survive a restart of the service. An
    /// expired id is discarded and replaced by a newly minted one, which is
    /// the only case where the caller has to issue a new cookie.
    pub fn resolve(&self, presented: Option<&str>) -> ResolvedSession {
        let mut sessions = self.sessions.lock().unwrap();

        let resolved = match presented {
            Some(id) => match sessions.get(id) {
                Some(record) if record.created_at.elapsed() < self.ttl => Some(ResolvedSession {
                    id: id.to_string(),
                    is_new: false,
                }),
                Some(_) => {
                    debug!("Session {} expired, minting a new one", id);
                    sessions.remove(id);
                    None
                }
                None => {
                    sessions.insert(id.to_string(), SessionRecord::new());
                    Some(ResolvedSession {
                        id: id.to_string(),
                        is_new: false,
                    })
                }
            },
            None => None,
        };

        let resolved = resolved.unwrap_or_else(|| {
            let id = Uuid::new_v4().to_string();
            sessions.insert(id.clone(), SessionRecord::new());
            ResolvedSession { id, is_new: true }
        });

        // Amortized cleanup: roughly every tenth resolution sweeps the whole
        // map. Runs after the lookup so an expired-but-present id above is
        // judged on its age, not on sweep timing.
        if rand::random::<u8>() % 10 == 0 {
            Self::sweep(&mut sessions, self.ttl);
        }

        resolved
    }

    /// Whether this session may submit right now. Read-only: the cooldown is
    /// only started by `record_upload`, after a scan actually completed.
    pub fn check_rate_limit(&self, id: &str) -> RateLimitDecision {
        let sessions = self.sessions.lock().unwrap();

        let last_upload = sessions.get(id).and_then(|r| r.last_upload_at);
        let elapsed = match last_upload {
            Some(at) => at.elapsed(),
            None => {
                return RateLimitDecision {
                    allowed: true,
                    retry_after_secs: 0,
                }
            }
        };

        if elapsed < self.cooldown {
            RateLimitDecision {
                allowed: false,
                retry_after_secs: ceil_secs(self.cooldown - elapsed),
            }
        } else {
            RateLimitDecision {
                allowed: true,
                retry_after_secs: 0,
            }
        }
    }

    /// Starts this session's cooldown window. Called once per accepted
    /// submission, after the scan succeeded.
    pub fn record_upload(&self, id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let record = sessions
            .entry(id.to_string())
            .or_insert_with(SessionRecord::new);
        record.last_upload_at = Some(Instant::now());
    }

    /// Drops every session past its expiry; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().unwrap();
        Self::sweep(&mut sessions, self.ttl)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    fn sweep(sessions: &mut HashMap<String, SessionRecord>, ttl: Duration) -> usize {
        let before = sessions.len();
        sessions.retain(|_, record| record.created_at.elapsed() < ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Swept {} expired session(s)", removed);
        }
        removed
    }

    /// Ages a record in place, as if it had been created (and last uploaded)
    /// that much earlier.
    #[cfg(test)]
    fn backdate(&self, id: &str, by: Duration) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(record) = sessions.get_mut(id) {
            record.created_at -= by;
            if let Some(at) = record.last_upload_at.as_mut() {
                *at -= by;
            }
        }
    }
}

/// Rounds a remaining window up to whole seconds, never reporting zero for a
/// deny.
fn ceil_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_secs: u64, cooldown_secs: u64) -> SessionStore {
        SessionStore::new(
            Duration::from_secs(ttl_secs),
            Duration::from_secs(cooldown_secs),
        )
    }

    #[test]
    fn mints_a_session_when_none_is_presented() {
        let store = store(3600, 60);
        let session = store.resolve(None);
        assert!(session.is_new);
        assert!(!session.id.is_empty());
    }

    #[test]
    fn distinct_clients_get_distinct_sessions() {
        let store = store(3600, 60);
        let a = store.resolve(None);
        let b = store.resolve(None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn keeps_an_unexpired_session() {
        let store = store(3600, 60);
        let first = store.resolve(None);
        let second = store.resolve(Some(&first.id));
        assert_eq!(first.id, second.id);
        assert!(!second.is_new);
    }

    #[test]
    fn adopts_an_unknown_presented_id() {
        // e.g. a cookie minted before the last restart
        let store = store(3600, 60);
        let session = store.resolve(Some("carried-over-cookie"));
        assert_eq!(session.id, "carried-over-cookie");
        assert!(!session.is_new);

        let again = store.resolve(Some("carried-over-cookie"));
        assert!(!again.is_new);
    }

    #[test]
    fn expired_session_gets_a_fresh_id() {
        let store = store(2, 60);
        let first = store.resolve(None);
        store.backdate(&first.id, Duration::from_secs(3));

        let second = store.resolve(Some(&first.id));
        assert!(second.is_new);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn fresh_sessions_are_not_throttled() {
        let store = store(3600, 60);
        let session = store.resolve(None);
        let decision = store.check_rate_limit(&session.id);
        assert!(decision.allowed);
        assert_eq!(decision.retry_after_secs, 0);
    }

    #[test]
    fn unknown_sessions_are_not_throttled() {
        let store = store(3600, 60);
        assert!(store.check_rate_limit("ghost").allowed);
    }

    #[test]
    fn checking_does_not_start_the_cooldown() {
        let store = store(3600, 60);
        let session = store.resolve(None);
        assert!(store.check_rate_limit(&session.id).allowed);
        assert!(store.check_rate_limit(&session.id).allowed);

        store.record_upload(&session.id);
        let third = store.check_rate_limit(&session.id);
        let fourth = store.check_rate_limit(&session.id);
        assert!(!third.allowed);
        assert!(!fourth.allowed);
    }

    #[test]
    fn retry_after_reports_the_full_window_right_after_an_upload() {
        let store = store(3600, 60);
        let session = store.resolve(None);
        store.record_upload(&session.id);

        let decision = store.check_rate_limit(&session.id);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, 60);
    }

    #[test]
    fn cooldown_opens_up_after_the_window() {
        let store = store(3600, 2);
        let session = store.resolve(None);
        store.record_upload(&session.id);
        assert!(!store.check_rate_limit(&session.id).allowed);

        store.backdate(&session.id, Duration::from_secs(3));
        assert!(store.check_rate_limit(&session.id).allowed);
    }

    #[test]
    fn retry_after_rounds_up_and_never_reports_zero() {
        let store = store(3600, 2);
        let session = store.resolve(None);
        store.record_upload(&session.id);
        // 500ms of the window left
        store.backdate(&session.id, Duration::from_millis(1500));

        let decision = store.check_rate_limit(&session.id);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, 1);
    }

    #[test]
    fn record_upload_heals_a_missing_record() {
        let store = store(3600, 60);
        store.record_upload("ghost");
        assert!(!store.check_rate_limit("ghost").allowed);
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let store = store(2, 60);
        let old = store.resolve(None);
        let fresh = store.resolve(None);
        store.backdate(&old.id, Duration::from_secs(3));

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);

        let kept = store.resolve(Some(&fresh.id));
        assert_eq!(kept.id, fresh.id);
        assert!(!kept.is_new);
    }

    #[test]
    fn sweep_with_nothing_expired_is_a_no_op() {
        let store = store(3600, 60);
        store.resolve(None);
        store.resolve(None);
        assert_eq!(store.sweep_expired(), 0);
        assert_eq!(store.len(), 2);
    }
}
