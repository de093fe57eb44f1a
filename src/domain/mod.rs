//! Domain layer: pure data models, ports, and errors.

pub mod errors;
pub mod models;
pub mod ports;
