//! Storage: state store, desired-state file and settings

pub mod desired;
pub mod memory;
pub mod settings;
pub mod state;
