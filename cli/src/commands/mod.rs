//! Command implementations

pub mod add_resource;
pub mod config;
pub mod scan;
pub mod version;
