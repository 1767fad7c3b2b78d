//! Emergency override layer
//!
//! Operator kill switch sitting in front of every other gate layer. The live
//! configuration comes from an [`EmergencyConfigSource`] and is cached for a
//! fixed TTL.
//!
//! Refresh rules:
//! - fresh cache: returned as-is
//! - stale cache, no refresh running: this caller refreshes
//! - stale cache, refresh running: the stale value is returned immediately
//! - no cache: wait for the single in-flight refresh
//!
//! Any fetch error or timeout resolves to [`EmergencyConfig::default`]. The
//! layer can only narrow what the other layers allow, so it fails open. The
//! cache is left untouched on failure and the next call retries.

use async_trait::async_trait;
use parking_lot::RwLock;
use questgate_core::{
    EmergencyConfig, EmergencyConfigWire, EmergencySettings, FeatureId, GateError, GateResult,
    PhysicalTime, PhysicalTimeEffects,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("questgate/", env!("CARGO_PKG_VERSION"));

/// Backing store for the emergency configuration
#[async_trait]
pub trait EmergencyConfigSource: Send + Sync {
    /// Fetch the current configuration
    async fn fetch(&self) -> GateResult<EmergencyConfig>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Configuration captured from `DISABLED_FEATURES`, `MAINTENANCE_MODE` and
/// `EMERGENCY_MESSAGE` at startup
#[derive(Debug, Clone)]
pub struct EnvEmergencySource {
    config: EmergencyConfig,
}

impl EnvEmergencySource {
    /// Wrap the environment-sourced settings
    pub fn new(settings: &EmergencySettings) -> Self {
        Self {
            config: settings.env_config(),
        }
    }
}

#[async_trait]
impl EmergencyConfigSource for EnvEmergencySource {
    async fn fetch(&self) -> GateResult<EmergencyConfig> {
        Ok(self.config.clone())
    }

    fn describe(&self) -> String {
        "environment".to_string()
    }
}

/// Fixed configuration, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct StaticEmergencySource {
    config: EmergencyConfig,
}

impl StaticEmergencySource {
    /// Always serve `config`
    pub fn new(config: EmergencyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmergencyConfigSource for StaticEmergencySource {
    async fn fetch(&self) -> GateResult<EmergencyConfig> {
        Ok(self.config.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Remote parameter endpoint serving the emergency document as JSON
///
/// Expected body: `{"disabledFeatures": [...], "maintenanceMode": bool,
/// "emergencyMessage": "..."}`. Missing fields take their defaults and
/// unknown feature names are skipped.
#[derive(Debug, Clone)]
pub struct HttpEmergencySource {
    client: reqwest::Client,
    url: String,
}

impl HttpEmergencySource {
    /// Create a source for `url`; requests carry `timeout` as a transport bound
    pub fn new(url: impl Into<String>, timeout: Duration) -> GateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GateError::config(format!("emergency config HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmergencyConfigSource for HttpEmergencySource {
    async fn fetch(&self) -> GateResult<EmergencyConfig> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| GateError::network(format!("emergency config request failed: {e}")))?;

        let response = response
            .error_for_status()
            .map_err(|e| GateError::network(format!("emergency config endpoint: {e}")))?;

        let wire: EmergencyConfigWire = response
            .json()
            .await
            .map_err(|e| GateError::serialization(format!("emergency config body: {e}")))?;

        Ok(EmergencyConfig::from_wire(wire))
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }
}

#[derive(Debug, Clone)]
struct CachedConfig {
    config: EmergencyConfig,
    fetched_at: PhysicalTime,
}

/// Cached view over an emergency configuration source
pub struct EmergencyLayer {
    source: Arc<dyn EmergencyConfigSource>,
    time: Arc<dyn PhysicalTimeEffects>,
    ttl: Duration,
    fetch_timeout: Duration,
    cache: RwLock<Option<CachedConfig>>,
    refresh: tokio::sync::Mutex<()>,
    completed_refreshes: AtomicU64,
}

impl fmt::Debug for EmergencyLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmergencyLayer")
            .field("source", &self.source.describe())
            .field("ttl", &self.ttl)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl EmergencyLayer {
    /// Create a layer over `source`
    pub fn new(
        source: Arc<dyn EmergencyConfigSource>,
        time: Arc<dyn PhysicalTimeEffects>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            time,
            ttl,
            fetch_timeout,
            cache: RwLock::new(None),
            refresh: tokio::sync::Mutex::new(()),
            completed_refreshes: AtomicU64::new(0),
        }
    }

    /// Build from settings: the HTTP endpoint when one is configured,
    /// otherwise the environment values
    pub fn from_settings(
        settings: &EmergencySettings,
        time: Arc<dyn PhysicalTimeEffects>,
    ) -> GateResult<Self> {
        let source: Arc<dyn EmergencyConfigSource> = match &settings.endpoint {
            Some(url) => Arc::new(HttpEmergencySource::new(url.clone(), settings.fetch_timeout())?),
            None => Arc::new(EnvEmergencySource::new(settings)),
        };
        Ok(Self::new(source, time, settings.cache_ttl(), settings.fetch_timeout()))
    }

    /// Same settings, different source
    pub fn with_source(self, source: Arc<dyn EmergencyConfigSource>) -> Self {
        Self::new(source, self.time, self.ttl, self.fetch_timeout)
    }

    /// Current emergency configuration, refreshed when the cache is stale
    pub async fn current_config(&self) -> EmergencyConfig {
        let now = self.time.physical_time();
        let cached = self.cache.read().clone();

        if let Some(entry) = &cached {
            if self.is_fresh(entry, now) {
                return entry.config.clone();
            }
            match self.refresh.try_lock() {
                Ok(_guard) => {
                    // Another caller may have finished between the read and the lock.
                    if let Some(entry) = self.fresh_entry() {
                        return entry.config;
                    }
                    return self.refresh_locked().await;
                }
                Err(_) => {
                    debug!("Emergency config refresh in flight, serving stale value");
                    return entry.config.clone();
                }
            }
        }

        let seen = self.completed_refreshes.load(Ordering::Acquire);
        let _guard = self.refresh.lock().await;
        if let Some(entry) = self.fresh_entry() {
            return entry.config;
        }
        if self.completed_refreshes.load(Ordering::Acquire) != seen {
            // The refresh we waited on failed; share its fail-open outcome.
            return self
                .cache
                .read()
                .as_ref()
                .map(|entry| entry.config.clone())
                .unwrap_or_default();
        }
        self.refresh_locked().await
    }

    /// Whether maintenance mode or the disable list blocks `feature`
    pub async fn is_feature_emergency_blocked(&self, feature: FeatureId) -> bool {
        self.current_config().await.blocks(feature)
    }

    /// Drop the cached value so the next call refetches
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    /// Number of refresh attempts that have finished, successful or not
    pub fn completed_refreshes(&self) -> u64 {
        self.completed_refreshes.load(Ordering::Acquire)
    }

    fn is_fresh(&self, entry: &CachedConfig, now: PhysicalTime) -> bool {
        now.saturating_since(entry.fetched_at) < self.ttl
    }

    fn fresh_entry(&self) -> Option<CachedConfig> {
        let now = self.time.physical_time();
        self.cache
            .read()
            .as_ref()
            .filter(|entry| self.is_fresh(entry, now))
            .cloned()
    }

    /// Caller must hold the refresh guard
    async fn refresh_locked(&self) -> EmergencyConfig {
        let outcome = tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await;
        let resolved = match outcome {
            Ok(Ok(config)) => {
                debug!(
                    source = %self.source.describe(),
                    disabled = config.disabled_features.len(),
                    maintenance = config.maintenance_mode_active,
                    "Emergency config refreshed"
                );
                *self.cache.write() = Some(CachedConfig {
                    config: config.clone(),
                    fetched_at: self.time.physical_time(),
                });
                config
            }
            Ok(Err(error)) => {
                warn!(
                    source = %self.source.describe(),
                    error = %error,
                    "Failed to fetch emergency config, failing open"
                );
                EmergencyConfig::default()
            }
            Err(_) => {
                warn!(
                    source = %self.source.describe(),
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Emergency config fetch timed out, failing open"
                );
                EmergencyConfig::default()
            }
        };
        self.completed_refreshes.fetch_add(1, Ordering::AcqRel);
        resolved
    }
}
