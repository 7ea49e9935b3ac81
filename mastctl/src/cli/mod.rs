//! Command-line surface of `mastctl`
//!
//! - [`commands`] - clap definitions; [`Commands::needs_server`] tells the
//!   daemon commands apart from the offline ones
//! - [`handlers`] - one handler per command, printing through [`crate::format`]

mod commands;
mod handlers;

pub use commands::*;
pub use handlers::*;
