//! Domain model module declarations.

pub mod content;
pub mod feedback;
pub mod session;
