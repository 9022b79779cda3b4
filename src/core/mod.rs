//! Core library components.
//!
//! Secret provisioning, configuration, startup steps, process supervision,
//! and the identity store. Nothing here depends on the CLI.

pub mod assets;
pub mod bootstrap;
pub mod constants;
pub mod env;
pub mod secrets;
pub mod settings;
pub mod store;
pub mod supervisor;
