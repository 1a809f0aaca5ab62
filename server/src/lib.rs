//! logai server — MCP transport (stdio and streamable HTTP) over
//! [`logai_core::Engine`].

pub mod auth;
pub mod mcp;
pub mod mcp_http;
pub mod types;

pub use logai_core::*;
