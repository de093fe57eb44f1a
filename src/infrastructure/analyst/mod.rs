//! Analyst adapters: implementations of the [`Analyst`] port.
//!
//! [`Analyst`]: crate::domain::ports::Analyst

pub mod http;
pub mod mock;
pub mod retry;

pub use http::HttpAnalyst;
pub use mock::{MockAnalyst, ScriptedResponse};
pub use retry::RetryPolicy;
