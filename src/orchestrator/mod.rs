//! Session orchestration modules.
//!
//! Covers process-tree termination, user command execution with live
//! output streaming, and the worker session round trip.

pub mod command_runner;
pub mod log_buffer;
pub mod output_codec;
pub mod reaper;
pub mod session_transport;
