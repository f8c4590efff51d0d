//! Session/credential cache.
//!
//! A session is the sealed credential bundle for one `(provider, tenant,
//! credentials)` triple. Stateless request handlers resolve it by a
//! deterministic id and read it through a key-value store with a TTL.

mod cache;
mod id;
mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;
mod store;
mod types;

pub use cache::SessionCache;
pub use id::{canonical_json, derive_session_id};
pub use memory::MemorySessionStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;
pub use store::SessionStore;
pub use types::{
    DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS, ResolvedSession, SessionCacheEntry,
    SessionOptions, SessionRequest,
};
