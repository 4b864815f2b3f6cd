//! Single-slot expiring cache for provider auth tokens.

use std::future::Future;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

#[derive(Debug)]
struct TokenCacheState<T> {
    value: T,
    expires_at: Instant,
}

/// Holds at most one value together with its expiry.
///
/// Readers share the lock. Refreshes go through [`TokenCache::get_or_refresh`],
/// which lets a single caller authenticate while concurrent callers wait for
/// its result.
#[derive(Debug)]
pub struct TokenCache<T> {
    state: RwLock<Option<TokenCacheState<T>>>,
    refresh: Mutex<()>,
}

impl<T: Clone> TokenCache<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Returns the cached value unless it is unset or expired.
    pub async fn get(&self) -> Option<T> {
        let guard = self.state.read().await;
        let cache = guard.as_ref()?;
        if Instant::now() < cache.expires_at {
            Some(cache.value.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, value: T, expires_at: Instant) {
        let mut guard = self.state.write().await;
        *guard = Some(TokenCacheState { value, expires_at });
    }

    pub async fn clear(&self) {
        let mut guard = self.state.write().await;
        *guard = None;
    }

    /// Returns the cached value, or runs `refresh` to obtain and store a new one.
    ///
    /// Only one refresh runs at a time. Callers that queued behind it re-check the
    /// slot first and reuse the fresh value. A failed refresh leaves the slot as it was.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, Instant), E>>,
    {
        if let Some(value) = self.get().await {
            return Ok(value);
        }
        let _refreshing = self.refresh.lock().await;
        if let Some(value) = self.get().await {
            return Ok(value);
        }
        let (value, expires_at) = refresh().await?;
        self.set(value.clone(), expires_at).await;
        Ok(value)
    }
}

impl<T: Clone> Default for TokenCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn expires_and_clears() {
        let cache = TokenCache::new();
        assert_eq!(cache.get().await, None::<String>);

        cache
            .set("tok".to_string(), Instant::now() + Duration::from_secs(60))
            .await;
        assert_eq!(cache.get().await.as_deref(), Some("tok"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get().await, None);

        cache
            .set("tok2".to_string(), Instant::now() + Duration::from_secs(60))
            .await;
        cache.clear().await;
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_misses_refresh_once() {
        let cache = Arc::new(TokenCache::<String>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, ()>((
                            "fresh".to_string(),
                            Instant::now() + Duration::from_secs(3600),
                        ))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_is_not_cached() {
        let cache = TokenCache::<String>::new();
        let err = cache
            .get_or_refresh(|| async { Err::<(String, Instant), _>("denied") })
            .await
            .unwrap_err();
        assert_eq!(err, "denied");
        assert_eq!(cache.get().await, None);
    }
}
