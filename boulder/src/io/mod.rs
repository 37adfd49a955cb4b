//! I/O helpers: state, config, documents, rendering and transport.

pub mod boulder_state;
pub mod config;
pub mod delivery;
pub mod init;
pub mod prompt;
pub mod session_agents;
pub mod story;
pub mod transcript;
