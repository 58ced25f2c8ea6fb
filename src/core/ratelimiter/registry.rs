use super::{AtomicRateLimiter, RateLimiterConfig};
use crate::{logging, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Maps limiter names to shared instances; get-or-create is linearizable.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    default_config: RateLimiterConfig,
    limiters: RwLock<HashMap<String, Arc<AtomicRateLimiter>>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        RateLimiterRegistry {
            default_config: RateLimiterConfig::default(),
            limiters: RwLock::new(HashMap::new()),
        }
    }
}

impl RateLimiterRegistry {
    pub fn new(default_config: RateLimiterConfig) -> Result<Self> {
        default_config.is_valid()?;
        Ok(RateLimiterRegistry {
            default_config,
            limiters: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the limiter registered under `name`, creating it with the
    /// registry's default configuration if absent.
    pub fn get(&self, name: &str) -> Result<Arc<AtomicRateLimiter>> {
        self.get_or_create(name, None)
    }

    /// Like [`get`](Self::get), but a fresh instance is created with the
    /// supplied configuration. An existing instance wins; the supplied
    /// configuration is then ignored.
    pub fn get_with_config(
        &self,
        name: &str,
        config: RateLimiterConfig,
    ) -> Result<Arc<AtomicRateLimiter>> {
        self.get_or_create(name, Some(config))
    }

    pub fn names(&self) -> Vec<String> {
        self.limiters.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.limiters.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.read().unwrap().is_empty()
    }

    fn get_or_create(
        &self,
        name: &str,
        config: Option<RateLimiterConfig>,
    ) -> Result<Arc<AtomicRateLimiter>> {
        if let Some(limiter) = self.limiters.read().unwrap().get(name) {
            return Ok(Arc::clone(limiter));
        }
        let mut limiters = self.limiters.write().unwrap();
        if let Some(limiter) = limiters.get(name) {
            return Ok(Arc::clone(limiter));
        }
        let config = config.unwrap_or_else(|| self.default_config.clone());
        let limiter = Arc::new(AtomicRateLimiter::new(name, config)?);
        logging::debug!("[RateLimiterRegistry] created rate limiter '{}'", name);
        limiters.insert(name.to_owned(), Arc::clone(&limiter));
        Ok(limiter)
    }
}

lazy_static! {
    static ref DEFAULT_REGISTRY: RateLimiterRegistry = RateLimiterRegistry::default();
}

/// The process-wide registry backed by the default configuration.
pub fn default_registry() -> &'static RateLimiterRegistry {
    &DEFAULT_REGISTRY
}

#[cfg(test)]
mod test {
    use super::*;
    use std::thread::spawn;
    use std::time::Duration;

    #[test]
    fn get_returns_one_instance_per_name() {
        let registry = RateLimiterRegistry::default();
        let a = registry.get("a").unwrap();
        let same = registry.get("a").unwrap();
        assert!(Arc::ptr_eq(&a, &same));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), vec!["a".to_owned()]);
    }

    #[test]
    fn supplied_config_ignored_for_existing_instance() {
        let registry = RateLimiterRegistry::default();
        let custom = RateLimiterConfig {
            limit_for_period: 7,
            limit_refresh_period: Duration::from_millis(100),
            timeout_duration: Duration::ZERO,
        };
        let first = registry.get_with_config("a", custom).unwrap();
        let second = registry
            .get_with_config(
                "a",
                RateLimiterConfig {
                    limit_for_period: 99,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().limit_for_period, 7);
    }

    #[test]
    fn concurrent_first_access_creates_once() {
        let registry = Arc::new(RateLimiterRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(spawn(move || registry.get("shared").unwrap()));
        }
        let limiters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for limiter in &limiters[1..] {
            assert!(Arc::ptr_eq(&limiters[0], limiter));
        }
        assert_eq!(registry.len(), 1);
    }
}
