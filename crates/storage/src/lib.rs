//! Persistence collaborators of the delivery scheduler.
//!
//! - [`MessageStore`]: durable message table (PostgreSQL in production)
//! - [`CacheSink`]: best-effort key/value sink (Redis in production)
//! - in-memory implementations of both for tests and local runs

pub mod cache;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{CacheSink, RedisCache};
pub use error::{CacheError, StoreError};
pub use memory::{MemoryCache, MemoryMessageStore};
pub use postgres::PgMessageStore;
pub use store::MessageStore;
