//! AnySound Deck
//!
//! Deck buttons for a local audio and system-automation HTTP service:
//! switch input/output devices, toggle mute, keep the machine awake, watch
//! CPU temperature and start or stop a local LLM server.

pub mod actions;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod host;
pub mod registry;
pub mod service;
pub mod transport;

#[cfg(test)]
mod testing;
