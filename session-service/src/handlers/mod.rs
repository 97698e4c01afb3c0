pub mod metrics;
pub mod ping;
pub mod session;

pub use ping::ping;
pub use session::{authenticate, login, logout, refresh};
