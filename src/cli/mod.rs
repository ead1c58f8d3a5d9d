//! CLI module
//!
//! Command-line interface: arguments, configuration file, console input,
//! the selection prompt and progress rendering.

pub mod args;
pub mod config;
pub mod console;
pub mod progress;
pub mod prompt;

pub use args::CliArgs;
pub use config::Config;
pub use console::ConsoleInput;
pub use progress::{spawn_renderer, ProgressDisplay, TransferStats};
