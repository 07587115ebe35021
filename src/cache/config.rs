//! Configuration for the decode context cache.

use crate::{Error, Result};

/// Sizing of a [`crate::cache::DecodeContextCache`].
///
/// Both values are fixed once the cache is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Number of decode-state records in the pool (default: 8).
    pub capacity: usize,

    /// Number of hash buckets, must be a power of two (default: 256).
    ///
    /// The bucket of an address is the low bits of its offset, so consecutive instruction
    /// addresses land in distinct buckets.
    pub hash_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            hash_size: 256,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of records in the pool.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of records, at least one.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of hash buckets.
    ///
    /// # Arguments
    ///
    /// * `hash_size` - Number of buckets, a power of two.
    ///
    /// # Returns
    ///
    /// The modified configuration (builder pattern).
    #[must_use]
    pub fn with_hash_size(mut self, hash_size: usize) -> Self {
        self.hash_size = hash_size;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCacheConfig`] if the capacity is zero or the hash size is not a
    /// power of two.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCacheConfig(
                "capacity must be at least 1".to_string(),
            ));
        }
        if !self.hash_size.is_power_of_two() {
            return Err(Error::InvalidCacheConfig(format!(
                "hash size {} is not a power of two",
                self.hash_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CacheConfig::new();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.hash_size, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_sizes() {
        for hash_size in [0, 3, 12, 255] {
            assert!(matches!(
                CacheConfig::new().with_hash_size(hash_size).validate(),
                Err(Error::InvalidCacheConfig(_))
            ));
        }
        assert!(CacheConfig::new().with_capacity(0).validate().is_err());
        assert!(CacheConfig::new()
            .with_capacity(1)
            .with_hash_size(1)
            .validate()
            .is_ok());
    }
}
