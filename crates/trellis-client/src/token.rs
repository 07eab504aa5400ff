//! Cached bearer token with expiry and forced invalidation.

use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Minimum cached lifetime regardless of the skew subtraction.
const MIN_TOKEN_TTL: Duration = Duration::from_secs(60);

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Process-wide cache for the Core bearer token.
///
/// Reads take no exclusive lock: `current()` goes through a read guard and
/// returns the token while it is unexpired. Refreshes are serialized by a
/// separate mutex so that concurrent cache misses collapse into a single
/// upstream connect call (callers re-check `current()` under the guard
/// before connecting).
pub struct TokenCache {
    cached: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
    skew: Duration,
}

impl TokenCache {
    /// Create an empty cache with the given expiry safety margin.
    pub fn new(skew: Duration) -> Self {
        Self {
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            skew,
        }
    }

    /// Return the cached token if present and unexpired.
    pub fn current(&self) -> Option<String> {
        let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.token.clone())
    }

    /// Cache a freshly acquired token.
    ///
    /// The cached lifetime is `expires_in` minus the configured skew,
    /// floored at 60 seconds, so the token is refreshed before Core would
    /// actually reject it.
    pub fn store(&self, token: String, expires_in_secs: u64) -> String {
        let lifetime = Duration::from_secs(expires_in_secs)
            .saturating_sub(self.skew)
            .max(MIN_TOKEN_TTL);
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        token
    }

    /// Drop the cached token so the next caller refreshes.
    pub fn invalidate(&self) {
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    /// Acquire the refresh lock. Held only while connecting to Core.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_token_valid_until_skewed_expiry() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.store("tok".to_string(), 120);

        // Lifetime is 120 - 60 = 60 seconds
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.current().as_deref(), Some("tok"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifetime_floored_at_minimum() {
        let cache = TokenCache::new(Duration::from_secs(60));
        // 30 - 60 would go negative; the floor keeps the token for 60s
        cache.store("tok".to_string(), 30);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.current().as_deref(), Some("tok"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.current(), None);
    }

    #[tokio::test]
    async fn test_invalidate_clears_entry() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.store("tok".to_string(), 3600);
        assert!(cache.current().is_some());

        cache.invalidate();
        assert_eq!(cache.current(), None);
    }

    #[tokio::test]
    async fn test_store_replaces_previous_token() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.store("old".to_string(), 3600);
        cache.store("new".to_string(), 3600);
        assert_eq!(cache.current().as_deref(), Some("new"));
    }
}
