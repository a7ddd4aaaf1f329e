//! CLI command modules.

pub mod http;
pub mod peers;
pub mod request;
pub mod status;
