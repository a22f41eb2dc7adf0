//! Conversion of user feedback into protocol content blocks.

pub mod image_info;
pub mod mime;
pub mod packager;

pub use image_info::image_info;
pub use mime::mime_type_for;
pub use packager::{package, NO_FEEDBACK_TEXT};
