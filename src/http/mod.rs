//! HTTP protocol layer module
//!
//! Response transport, MIME detection and cache helpers, independent of how
//! the site decides what to serve.

pub mod cache;
pub mod mime;
pub mod response;
pub mod writer;

// Re-export commonly used types
pub use response::{error_page, BufferedResponse};
pub use writer::{Payload, ResponseWriter, WriteError};
