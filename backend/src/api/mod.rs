//! HTTP API module.
//!
//! The server, its request/response types, and the log broadcaster the
//! fetch pipeline reports to.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
