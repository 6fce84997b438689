//! CLI command implementations

pub mod detect;
pub mod forecast;
pub mod status;
