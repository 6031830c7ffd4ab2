//! Connection management
//!
//! Live WebSocket connections, the participant registry and room fan-out.

mod connection;
mod registry;

pub use connection::{new_session_id, Connection};
pub use registry::{RegistryStats, SessionRegistry};
