//! Parsing and loading: `hcl-rs` bodies lowered into one node arena per
//! project.

pub mod ast;
pub mod core;
pub mod lower;

pub use self::core::{Module, Project};
