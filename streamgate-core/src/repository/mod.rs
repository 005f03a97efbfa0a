pub mod cache_entry;

pub use cache_entry::PgCacheStore;
