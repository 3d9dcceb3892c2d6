pub mod cli;
pub mod dispatch;
pub mod load_config;

pub use cli::{run, Cli, Commands};
