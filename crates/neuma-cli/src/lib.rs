// Library interface for neuma-cli so integration tests can reach the
// command parser and renderer. main.rs declares the same files, hence the
// path attributes.

#[path = "commands.rs"]
pub mod commands;

#[path = "render.rs"]
pub mod render;

pub use commands::{handle_command, CommandResult};
pub use render::{render_artifact, render_outcome};
