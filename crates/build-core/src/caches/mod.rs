//! The session-scoped caches: live build configurations and per-configuration
//! build results.

mod config_cache;
mod results_cache;

pub use config_cache::ConfigCache;
pub use results_cache::ResultsCache;
