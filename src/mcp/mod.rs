//! Model Context Protocol (MCP) server implementation.
//!
//! This module exposes the Kalshi tools and `kalshi://` resources to AI
//! assistants. The server communicates over stdio using newline-delimited
//! JSON-RPC 2.0 messages.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Server                          │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │  Transport  │───▶│   Server    │───▶│   Tools     │    │
//! │   │   (stdio)   │    │  (lifecycle)│    │ (registry)  │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │                             │                  ▲            │
//! │                             ▼                  │            │
//! │                      ┌─────────────┐           │            │
//! │                      │  Resources  │───────────┘            │
//! │                      │ (kalshi://) │                        │
//! │                      └─────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! The server echoes the client's requested protocol version and falls back
//! to 2025-06-18 when none is given.

pub mod protocol;
pub mod resources;
pub mod server;
pub mod transport;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION};
pub use resources::ResourceRouter;
pub use server::McpServer;
pub use transport::{LineTransport, StdioTransport};
