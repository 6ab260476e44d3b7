//! CLI command implementations for cgroup-exporter.
//!
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `test`: Metrics collection testing

pub mod check;
pub mod config;
pub mod test;

pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
