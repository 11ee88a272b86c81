pub mod config;
pub mod discord;
pub mod endpoint;
pub mod error;
pub mod language;
pub mod platform;
pub mod registry;
pub mod relay;
pub mod translation;
