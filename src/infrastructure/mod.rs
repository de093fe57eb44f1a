//! Infrastructure layer: external integrations and adapters.

pub mod analyst;
pub mod checkpoint;
pub mod config;
