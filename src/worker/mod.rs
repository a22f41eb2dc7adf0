//! Worker-side building blocks shared by worker binaries.
//!
//! A worker receives a [`SessionRequest`](crate::models::session::SessionRequest)
//! as command-line arguments, lets the user compose feedback (optionally
//! running the project command), and writes the result slot atomically on
//! submit.

pub mod args;
pub mod draft;
pub mod result_writer;
pub mod settings;
