//! Gateway protocol definitions
//!
//! Frame format and close codes.

mod close_codes;
mod messages;

pub use close_codes::CloseCode;
pub use messages::GatewayMessage;
