//! # support-gateway
//!
//! WebSocket gateway for real-time customer-support chat: the authentication handshake,
//! the session registry with room fan-out, and the client event handlers on top of
//! `support-service`.

pub mod connection;
pub mod events;
pub mod handlers;
pub mod protocol;
pub mod server;

pub use server::{
    create_app, create_gateway_state, create_gateway_state_with_repositories, run, run_server,
    GatewayState,
};
