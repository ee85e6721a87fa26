// src/cli/handlers/mod.rs

// One module per command.

pub mod check_config;
pub mod commons;
pub mod exec;
pub mod hosts;
pub mod init;
pub mod run;
pub mod tasks;
