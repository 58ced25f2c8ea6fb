use super::{BreakerConfig, CircuitBreaker};
use crate::{logging, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Maps breaker names to shared instances.
///
/// Lookup and creation are linearizable: the first caller for a name
/// creates the instance, every later caller receives the same one.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    default_config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        CircuitBreakerRegistry {
            default_config: BreakerConfig::default(),
            breakers: RwLock::new(HashMap::new()),
        }
    }
}

impl CircuitBreakerRegistry {
    /// A registry creating breakers from `default_config` unless a caller
    /// supplies one.
    pub fn new(default_config: BreakerConfig) -> Result<Self> {
        default_config.is_valid()?;
        Ok(CircuitBreakerRegistry {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the breaker registered under `name`, creating it with the
    /// registry's default configuration if absent.
    pub fn get(&self, name: &str) -> Result<Arc<CircuitBreaker>> {
        self.get_or_create(name, None)
    }

    /// Like [`get`](Self::get), but a fresh instance is created with the
    /// supplied configuration. An existing instance wins; the supplied
    /// configuration is then ignored.
    pub fn get_with_config(
        &self,
        name: &str,
        config: BreakerConfig,
    ) -> Result<Arc<CircuitBreaker>> {
        self.get_or_create(name, Some(config))
    }

    pub fn names(&self) -> Vec<String> {
        self.breakers.read().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.read().unwrap().is_empty()
    }

    fn get_or_create(
        &self,
        name: &str,
        config: Option<BreakerConfig>,
    ) -> Result<Arc<CircuitBreaker>> {
        if let Some(breaker) = self.breakers.read().unwrap().get(name) {
            return Ok(Arc::clone(breaker));
        }
        let mut breakers = self.breakers.write().unwrap();
        // racing creators serialize here; losers take the winner's instance
        if let Some(breaker) = breakers.get(name) {
            return Ok(Arc::clone(breaker));
        }
        let config = config.unwrap_or_else(|| self.default_config.clone());
        let breaker = Arc::new(CircuitBreaker::new(name, config)?);
        logging::debug!("[CircuitBreakerRegistry] created circuit breaker '{}'", name);
        breakers.insert(name.to_owned(), Arc::clone(&breaker));
        Ok(breaker)
    }
}

lazy_static! {
    static ref DEFAULT_REGISTRY: CircuitBreakerRegistry = CircuitBreakerRegistry::default();
}

/// The process-wide registry backed by the default configuration.
pub fn default_registry() -> &'static CircuitBreakerRegistry {
    &DEFAULT_REGISTRY
}
