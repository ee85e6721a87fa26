//! `sctl`: named hosts and multi-step tasks from a layered TOML configuration, run over SSH.
include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod models;
pub mod system;
