use crate::Error;
use crate::db::entities::economy_configs::{GateConfig, GatePolicy};
use crate::services::cache::TtlCache;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Answer of the external profile-requirement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateCheck {
    /// Whether the user may currently earn or receive points.
    pub allowed: bool,
    /// Whether the requirement was actually evaluated (false when the gate
    /// is disabled in config).
    pub active: bool,
}

/// External capability answering "does this user's profile satisfy the
/// configured requirement". Network-backed in production; tests substitute
/// a deterministic fake.
#[async_trait::async_trait]
pub trait ProfileGate: Send + Sync {
    async fn check(&self, user_id: i64) -> Result<GateCheck, Error>;
}

/// Gate that allows everyone. For deployments without a profile
/// requirement.
pub struct AllowAllGate;

#[async_trait::async_trait]
impl ProfileGate for AllowAllGate {
    async fn check(&self, _user_id: i64) -> Result<GateCheck, Error> {
        Ok(GateCheck {
            allowed: true,
            active: false,
        })
    }
}

/// Caching adapter around the injected [`ProfileGate`]. Oracle failures are
/// counted and logged, then resolved through the configured policy; they
/// never reach the accrual paths as errors.
pub struct EligibilityService {
    gate: Arc<dyn ProfileGate>,
    cache: TtlCache<i64, GateCheck>,
    failures: AtomicU64,
}

impl EligibilityService {
    pub fn new(gate: Arc<dyn ProfileGate>) -> Self {
        Self {
            gate,
            cache: TtlCache::new(Duration::from_secs(300)),
            failures: AtomicU64::new(0),
        }
    }

    pub async fn check(&self, user_id: i64, config: &GateConfig) -> GateCheck {
        if !config.enabled {
            return GateCheck {
                allowed: true,
                active: false,
            };
        }

        if let Some(hit) = self.cache.get(&user_id) {
            return hit;
        }

        match self.gate.check(user_id).await {
            Ok(result) => {
                self.cache.insert_with_ttl(
                    user_id,
                    result,
                    Duration::from_secs(config.cache_ttl_secs),
                );
                result
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Profile gate check failed for user {}: {:?}", user_id, e);
                // Failures are not cached; the next check retries.
                GateCheck {
                    allowed: matches!(config.policy, GatePolicy::Lenient),
                    active: true,
                }
            }
        }
    }

    pub fn invalidate(&self, user_id: i64) {
        self.cache.invalidate(&user_id);
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Fake oracle with a fixed answer (or failure) and a call counter.
    pub struct StaticGate {
        pub allowed: bool,
        pub fail: bool,
        pub calls: AtomicU32,
    }

    impl StaticGate {
        pub fn allowing() -> Self {
            Self {
                allowed: true,
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        pub fn denying() -> Self {
            Self {
                allowed: false,
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        pub fn failing() -> Self {
            Self {
                allowed: false,
                fail: true,
                calls: AtomicU32::new(0),
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait::async_trait]
    impl ProfileGate for StaticGate {
        async fn check(&self, _user_id: i64) -> Result<GateCheck, Error> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                anyhow::bail!("oracle unreachable");
            }
            Ok(GateCheck {
                allowed: self.allowed,
                active: true,
            })
        }
    }
}
