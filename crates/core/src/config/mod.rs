//! Configuration loading and schema definitions
//!
//! A single [`Config`] is built at startup and handed to every command.

mod loader;
mod schema;

pub use loader::{env_keys, Config};
pub use schema::*;
