//! Upload handling
//!
//! Extension allow-list, filename sanitising and the per-request temp file.

mod temp;
mod validation;

pub use temp::TempUpload;
pub use validation::{allowed_file, secure_filename, ALLOWED_EXTENSIONS};
