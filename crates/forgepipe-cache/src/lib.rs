//! The Response Cache: content-addressed caching of Model Router responses,
//! per §4.C of the design. A cache hit bypasses rate-limiting, retry, and
//! cost accounting entirely.

pub mod key;
pub mod store;

pub use key::{cache_key, temperature_bucket, CacheKey, CacheableMessage};
pub use store::{CachedResponse, ResponseCache};
