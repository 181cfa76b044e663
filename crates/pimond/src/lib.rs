//! pimond library - exposes modules for testing.

pub mod cache;
pub mod config;
pub mod error;
pub mod fields;
pub mod invoker;
pub mod modem;
pub mod poller;
pub mod power;
pub mod sink;
