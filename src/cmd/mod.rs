//! Command-line entry points.

pub mod ocr;
pub mod schema;
pub mod serve;
