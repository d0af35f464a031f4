//! Command-line interface.

mod args;
pub mod build;
pub mod dev;

pub use args::{Cli, Commands};
