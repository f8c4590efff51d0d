//! Application layer for the cobranca provider adapters: environment
//! configuration, logging setup and the session/credential cache.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::{AppConfig, LogFormat};
pub use error::{Error, Result};
pub use session::{
    ResolvedSession, SessionCache, SessionCacheEntry, SessionOptions, SessionRequest,
    derive_session_id,
};
