//! Session lifecycle services: token codec, cache-backed session store and
//! the manager composing them.

pub mod error;
mod jwt;
pub mod metrics;
pub mod redis;
mod session;
mod session_store;

pub use error::ServiceError;
pub use jwt::{JwtService, SessionClaims, SignedToken, TokenKind};
pub use redis::{MockSessionCache, RedisService, SessionCache};
pub use session::{SessionManager, TokenPair};
pub use session_store::{session_key, SessionRecord, SessionStore};
