use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::errors::Result;
use super::types::{RateLimitInfo, RepositoryClient};

/// Consumption percentage at which callers should stop spending quota.
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 90;

/// How long a fetched quota snapshot is reused.
pub const DEFAULT_QUOTA_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default pacing of outgoing API requests (requests per second).
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

/// Quota settings shared by the limiter, its snapshot cache and the pacer.
#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub threshold_percent: u8,
    pub cache_ttl: Duration,
    pub requests_per_second: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            cache_ttl: DEFAULT_QUOTA_CACHE_TTL,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

/// Advisory view over a quota snapshot.
///
/// Nothing is reserved: two callers may both be told "yes" for the last few
/// requests. The threshold keeps enough headroom for that to be harmless.
#[derive(Debug, Clone, Copy)]
pub struct QuotaLimiter {
    info: RateLimitInfo,
    threshold_percent: u8,
}

impl QuotaLimiter {
    pub fn new(info: RateLimitInfo, threshold_percent: u8) -> Self {
        Self {
            info,
            threshold_percent,
        }
    }

    pub fn info(&self) -> &RateLimitInfo {
        &self.info
    }

    /// Whether `n` more requests keep consumption below the threshold.
    ///
    /// Always `false` for an unknown (zero) limit.
    pub fn can_make_request(&self, n: u32) -> bool {
        if self.info.limit == 0 {
            return false;
        }
        let after = (u64::from(self.info.used()) + u64::from(n)) * 100 / u64::from(self.info.limit);
        after < u64::from(self.threshold_percent)
    }

    /// Time until the quota resets; zero once the reset time has passed.
    pub fn wait_time(&self) -> Duration {
        (self.info.reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Share of the quota already spent, 0 to 100.
    pub fn consumption_percent(&self) -> u8 {
        if self.info.limit == 0 {
            return 100;
        }
        let pct = u64::from(self.info.used()) * 100 / u64::from(self.info.limit);
        pct.min(100) as u8
    }
}

/// Fetches quota snapshots, caching them per credential for a short TTL.
///
/// Credentials are keyed by a hash so tokens are not held in the cache.
pub struct QuotaSource {
    config: QuotaConfig,
    cache: Mutex<HashMap<u64, (Instant, RateLimitInfo)>>,
}

impl QuotaSource {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn fingerprint(credential: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        credential.hash(&mut hasher);
        hasher.finish()
    }

    /// Current quota of `credential`, from cache or from the client.
    pub async fn snapshot(
        &self,
        client: &dyn RepositoryClient,
        credential: &str,
    ) -> Result<RateLimitInfo> {
        let key = Self::fingerprint(credential);

        if let Some((fetched_at, info)) = self.cache.lock().await.get(&key).copied()
            && fetched_at.elapsed() < self.config.cache_ttl
        {
            return Ok(info);
        }

        let info = client.get_rate_limit().await?;
        tracing::debug!(
            limit = info.limit,
            remaining = info.remaining,
            reset_at = %info.reset_at,
            "Fetched rate limit"
        );
        self.cache.lock().await.insert(key, (Instant::now(), info));
        Ok(info)
    }

    /// A limiter over the current snapshot of `credential`.
    pub async fn limiter(
        &self,
        client: &dyn RepositoryClient,
        credential: &str,
    ) -> Result<QuotaLimiter> {
        let info = self.snapshot(client, credential).await?;
        Ok(QuotaLimiter::new(info, self.config.threshold_percent))
    }

    /// Drop the cached snapshot of `credential`.
    pub async fn invalidate(&self, credential: &str) {
        self.cache
            .lock()
            .await
            .remove(&Self::fingerprint(credential));
    }
}

#[cfg(feature = "github")]
pub use pacing::ApiRateLimiter;

#[cfg(feature = "github")]
mod pacing {
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use governor::clock::DefaultClock;
    use governor::state::{InMemoryState, NotKeyed};
    use governor::{Quota, RateLimiter};

    type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

    /// Paces outgoing API requests to a fixed rate.
    ///
    /// ```ignore
    /// let limiter = ApiRateLimiter::new(10); // 10 requests per second
    ///
    /// // Before each API call:
    /// limiter.wait().await;
    /// ```
    #[derive(Clone)]
    pub struct ApiRateLimiter {
        inner: Arc<GovernorRateLimiter>,
    }

    impl ApiRateLimiter {
        /// Create a limiter allowing `requests_per_second` (treated as 1 if 0).
        pub fn new(requests_per_second: u32) -> Self {
            let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
            Self {
                inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            }
        }

        /// Wait until a request is allowed.
        pub async fn wait(&self) {
            self.inner.until_ready().await;
        }
    }
}
