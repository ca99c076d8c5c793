//! Short-lived exclusive ownership of a conversational scope.
//!
//! A handler running a multi-turn exchange claims the scope; until the claim
//! is released or its TTL expires, every event in that scope routes straight
//! to the owner, bypassing the normal walk. Expiry is lazy (checked on
//! access) plus a single sweep loop for all claims — never one timer per
//! claim, so resource usage stays flat under many concurrent conversations.
//!
//! Timeout messages are delivered through the claim's stored reply
//! capability. The claim is always removed under the lock first and the
//! message sent after, so the suspension point never observes half-removed
//! state.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    tokio::{sync::Notify, task::JoinHandle},
    tracing::{debug, info, warn},
};

use {
    switchyard_common::now_ms,
    switchyard_events::{ReplyContent, ReplySink, Scope},
};

#[cfg(feature = "metrics")]
use switchyard_metrics::{claims as claim_metrics, counter, gauge};

/// One live claim.
pub struct Claim {
    pub owner: String,
    pub expires_at_ms: u64,
    /// Sent through `reply` if the claim expires unreleased.
    pub timeout_message: Option<String>,
    pub reply: Option<Arc<dyn ReplySink>>,
}

impl Claim {
    fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at_ms
    }
}

/// Scope-keyed claim table with a single background sweep.
pub struct ContextClaims {
    inner: Mutex<HashMap<Scope, Claim>>,
    wake: Notify,
    sweeping: AtomicBool,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ContextClaims {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            sweeping: AtomicBool::new(false),
            sweep_handle: Mutex::new(None),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Scope, Claim>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take exclusive ownership of a scope.
    ///
    /// Returns false if another live claim holds the scope — claiming never
    /// overwrites, so two handlers cannot race for the same conversation.
    pub fn claim(
        &self,
        scope: Scope,
        owner: impl Into<String>,
        ttl: Duration,
        timeout_message: Option<String>,
        reply: Option<Arc<dyn ReplySink>>,
    ) -> bool {
        let owner = owner.into();
        let now = now_ms();
        let lapsed = {
            let mut claims = self.lock();
            let lapsed = match claims.get(&scope) {
                Some(existing) if existing.is_expired(now) => claims.remove(&scope),
                Some(existing) => {
                    debug!(scope = %scope, owner = %existing.owner, "claim conflict");
                    #[cfg(feature = "metrics")]
                    counter!(claim_metrics::CONFLICTS).increment(1);
                    return false;
                },
                None => None,
            };
            claims.insert(scope.clone(), Claim {
                owner: owner.clone(),
                expires_at_ms: now + ttl.as_millis() as u64,
                timeout_message,
                reply,
            });
            self.update_gauge(claims.len());
            lapsed
        };
        if let Some(claim) = lapsed {
            self.spawn_timeout_delivery(scope.clone(), claim);
        }
        info!(scope = %scope, owner = %owner, ttl_ms = ttl.as_millis() as u64, "scope claimed");
        true
    }

    /// Release the claim on a scope. Idempotent; returns true if a claim
    /// was actually removed.
    pub fn release(&self, scope: &Scope) -> bool {
        let mut claims = self.lock();
        let removed = claims.remove(scope).is_some();
        if removed {
            self.update_gauge(claims.len());
            debug!(scope = %scope, "claim released");
        }
        removed
    }

    /// Release only if `owner` holds the claim.
    pub fn release_owned(&self, scope: &Scope, owner: &str) -> bool {
        let mut claims = self.lock();
        match claims.get(scope) {
            Some(claim) if claim.owner == owner => {
                claims.remove(scope);
                self.update_gauge(claims.len());
                debug!(scope = %scope, owner = %owner, "claim released");
                true
            },
            _ => false,
        }
    }

    /// Current owner of a scope, if a live claim exists. Expired claims are
    /// lazily removed here (their timeout delivery runs in the background).
    #[must_use]
    pub fn owner_of(&self, scope: &Scope) -> Option<String> {
        let now = now_ms();
        let lapsed = {
            let mut claims = self.lock();
            match claims.get(scope) {
                Some(claim) if claim.is_expired(now) => {
                    let lapsed = claims.remove(scope);
                    self.update_gauge(claims.len());
                    lapsed
                },
                Some(claim) => return Some(claim.owner.clone()),
                None => return None,
            }
        };
        if let Some(claim) = lapsed {
            self.spawn_timeout_delivery(scope.clone(), claim);
        }
        None
    }

    /// Number of live claims (expired-but-unswept entries included).
    #[must_use]
    pub fn active(&self) -> usize {
        self.lock().len()
    }

    /// Start the background sweep. One loop serves every claim; repeated
    /// calls are no-ops.
    pub fn start_sweep(self: &Arc<Self>, interval: Duration) {
        if self.sweeping.swap(true, Ordering::SeqCst) {
            return;
        }
        let claims = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {},
                    () = claims.wake.notified() => {},
                }
                if !claims.sweeping.load(Ordering::SeqCst) {
                    break;
                }
                let expired = claims.take_expired(now_ms());
                for (scope, claim) in expired {
                    deliver_timeout(&scope, claim).await;
                }
            }
        });
        *self.sweep_handle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
    }

    /// Stop the background sweep. Live claims stay in the table and still
    /// expire lazily on access.
    pub fn stop_sweep(&self) {
        self.sweeping.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        if let Some(handle) = self
            .sweep_handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }

    /// Remove every expired claim under the lock and hand them back for
    /// delivery outside it.
    fn take_expired(&self, now: u64) -> Vec<(Scope, Claim)> {
        let mut claims = self.lock();
        let expired_scopes: Vec<Scope> = claims
            .iter()
            .filter(|(_, claim)| claim.is_expired(now))
            .map(|(scope, _)| scope.clone())
            .collect();
        let expired = expired_scopes
            .into_iter()
            .filter_map(|scope| claims.remove(&scope).map(|claim| (scope, claim)))
            .collect::<Vec<_>>();
        if !expired.is_empty() {
            self.update_gauge(claims.len());
        }
        expired
    }

    /// Deliver a lazily expired claim's timeout message without blocking
    /// the (synchronous) accessor that noticed the expiry.
    fn spawn_timeout_delivery(&self, scope: Scope, claim: Claim) {
        if claim.timeout_message.is_none() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    deliver_timeout(&scope, claim).await;
                });
            },
            Err(_) => {
                warn!(scope = %scope, "claim expired outside a runtime; timeout message dropped");
            },
        }
    }

    #[cfg(feature = "metrics")]
    fn update_gauge(&self, len: usize) {
        gauge!(claim_metrics::ACTIVE).set(len as f64);
    }

    #[cfg(not(feature = "metrics"))]
    fn update_gauge(&self, _len: usize) {}
}

async fn deliver_timeout(scope: &Scope, claim: Claim) {
    info!(scope = %scope, owner = %claim.owner, "claim expired");
    #[cfg(feature = "metrics")]
    counter!(claim_metrics::TIMEOUTS).increment(1);

    let (Some(message), Some(reply)) = (claim.timeout_message, claim.reply) else {
        return;
    };
    if let Err(error) = reply.send(ReplyContent::Text(message)).await {
        warn!(scope = %scope, error = %error, "failed to deliver claim timeout message");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;

    struct RecordingReply {
        sent: StdMutex<Vec<String>>,
    }

    impl RecordingReply {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySink for RecordingReply {
        async fn send(&self, content: ReplyContent) -> switchyard_events::Result<bool> {
            self.sent.lock().unwrap().push(content.flat_text());
            Ok(true)
        }
    }

    #[tokio::test]
    async fn claiming_is_exclusive() {
        let claims = ContextClaims::new();
        let scope = Scope::user("7");
        assert!(claims.claim(scope.clone(), "a", Duration::from_secs(60), None, None));
        assert!(!claims.claim(scope.clone(), "b", Duration::from_secs(60), None, None));
        assert_eq!(claims.owner_of(&scope), Some("a".to_string()));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let claims = ContextClaims::new();
        let scope = Scope::user("7");
        claims.claim(scope.clone(), "a", Duration::from_secs(60), None, None);
        assert!(claims.release(&scope));
        assert!(!claims.release(&scope));
        assert_eq!(claims.owner_of(&scope), None);
    }

    #[tokio::test]
    async fn release_owned_checks_the_owner() {
        let claims = ContextClaims::new();
        let scope = Scope::group("g1");
        claims.claim(scope.clone(), "a", Duration::from_secs(60), None, None);
        assert!(!claims.release_owned(&scope, "b"));
        assert!(claims.release_owned(&scope, "a"));
    }

    #[tokio::test]
    async fn expiry_is_lazy_on_access() {
        let claims = ContextClaims::new();
        let scope = Scope::user("7");
        claims.claim(scope.clone(), "a", Duration::from_millis(20), None, None);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(claims.owner_of(&scope), None);
        // The lapsed claim no longer blocks a fresh one.
        assert!(claims.claim(scope, "b", Duration::from_secs(60), None, None));
    }

    #[tokio::test]
    async fn sweep_delivers_timeout_message() {
        let claims = ContextClaims::new();
        let reply = RecordingReply::new();
        let scope = Scope::user("7");
        claims.claim(
            scope,
            "a",
            Duration::from_millis(20),
            Some("timed out".to_string()),
            Some(reply.clone() as Arc<dyn ReplySink>),
        );

        claims.start_sweep(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(120)).await;
        claims.stop_sweep();

        assert_eq!(reply.messages(), vec!["timed out".to_string()]);
        assert_eq!(claims.active(), 0);
    }

    #[tokio::test]
    async fn replacing_an_expired_claim_still_sends_its_timeout() {
        let claims = ContextClaims::new();
        let reply = RecordingReply::new();
        let scope = Scope::user("7");
        claims.claim(
            scope.clone(),
            "a",
            Duration::from_millis(10),
            Some("too slow".to_string()),
            Some(reply.clone() as Arc<dyn ReplySink>),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        // No sweep running; the new claim displaces the lapsed one.
        assert!(claims.claim(scope, "b", Duration::from_secs(60), None, None));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(reply.messages(), vec!["too slow".to_string()]);
    }
}
