// src/core/mod.rs

pub mod config_loader;
pub mod paths;
pub mod task_executor;
pub mod task_validator;
