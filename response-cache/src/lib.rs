//! In-process response cache shared by every request handler.
//!
//! Values are stored as JSON so any serialisable payload can be cached and
//! read back as its original type. Each entry carries its own time-to-live.

mod cache;
mod clock;
pub mod config;
pub mod keys;
pub mod metrics_defs;

pub use cache::{AI_TTL, CacheStats, DROPDOWN_TTL, ResponseCache, SATELLITE_TTL, WEATHER_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
