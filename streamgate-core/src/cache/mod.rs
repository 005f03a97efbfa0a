//! Read-through TTL cache for expensive or rate-limited upstream lookups

pub mod memory;
pub mod singleflight;
pub mod store;
pub mod ttl;

pub use memory::MemoryCacheStore;
pub use singleflight::{SingleFlight, SingleFlightError};
pub use store::CacheStore;
pub use ttl::TtlCache;
