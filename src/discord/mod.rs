//! Discord as the chat platform: gateway events in, REST calls out.
//!
//! Uses raw `tokio-tungstenite` and `reqwest`, no Discord SDK crate.

pub mod events;
pub mod gateway;
pub mod rest;

pub use gateway::Gateway;
pub use rest::DiscordRest;
