use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Key-value cache with per-key expiry, as used by the session store.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn set_cache(
        &self,
        key: &str,
        value: &str,
        expiry_seconds: u64,
    ) -> Result<(), anyhow::Error>;
    async fn get_cache(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    /// Reset the expiry of an existing key. Returns false if the key is absent.
    async fn expire(&self, key: &str, expiry_seconds: u64) -> Result<bool, anyhow::Error>;
    async fn delete(&self, key: &str) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl SessionCache for RedisService {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }

    async fn set_cache(
        &self,
        key: &str,
        value: &str,
        expiry_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set cache: {}", e))
    }

    async fn get_cache(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get cache: {}", e))
    }

    async fn expire(&self, key: &str, expiry_seconds: u64) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(expiry_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to extend cache expiry: {}", e))
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete cache key: {}", e))?;
        Ok(())
    }
}

/// In-memory cache honouring expiry against tokio's clock, so tests can
/// pause and advance time.
pub struct MockSessionCache {
    pub entries: Mutex<HashMap<String, (String, Instant)>>,
    unavailable: AtomicBool,
    expire_failing: AtomicBool,
}

impl Default for MockSessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            expire_failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail, as an unreachable server would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only `expire` fail, leaving reads and writes working.
    pub fn set_expire_failing(&self, failing: bool) {
        self.expire_failing.store(failing, Ordering::SeqCst);
    }

    /// Remaining time to live of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .ok()?
            .get(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(_, deadline)| *deadline - now)
    }

    fn check_available(&self) -> Result<(), anyhow::Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock cache unavailable"));
        }
        Ok(())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>, anyhow::Error> {
        self.check_available()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock cache mutex poisoned: {}", e))?;
        let now = Instant::now();
        entries.retain(|_, (_, deadline)| *deadline > now);
        Ok(entries)
    }
}

#[async_trait]
impl SessionCache for MockSessionCache {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.check_available()
    }

    async fn set_cache(
        &self,
        key: &str,
        value: &str,
        expiry_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let deadline = Instant::now() + Duration::from_secs(expiry_seconds);
        self.lock()?
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get_cache(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        Ok(self.lock()?.get(key).map(|(value, _)| value.clone()))
    }

    async fn expire(&self, key: &str, expiry_seconds: u64) -> Result<bool, anyhow::Error> {
        if self.expire_failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Mock cache expire failed"));
        }
        let deadline = Instant::now() + Duration::from_secs(expiry_seconds);
        match self.lock()?.get_mut(key) {
            Some(entry) => {
                entry.1 = deadline;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), anyhow::Error> {
        self.lock()?.remove(key);
        Ok(())
    }
}
