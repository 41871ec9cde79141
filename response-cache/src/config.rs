use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one.
    pub ttl_secs: u64,
    /// How often the background sweep drops expired entries.
    pub check_period_secs: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn check_period(&self) -> Duration {
        Duration::from_secs(self.check_period_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 300,
            check_period_secs: 600,
        }
    }
}
