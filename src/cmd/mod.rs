//! Command-line entry points.

pub mod detect;
pub mod schema;
pub mod serve;
