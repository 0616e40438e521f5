//! kalshi-mcp: MCP server exposing the Kalshi prediction-market API
//!
//! This library provides the pieces of a stdio MCP server that lets AI
//! assistants browse Kalshi market data and manage an authenticated portfolio.
//!
//! # Architecture
//!
//! - **Kalshi client**: Retrying HTTP transport, RSA-PSS request signing,
//!   cursor pagination and response sanitising
//! - **Tools**: A fixed table of named operations with validated arguments
//! - **Resources**: Read-only `kalshi://` views over the tools
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error types
//! - [`kalshi`] — Kalshi Trade API client
//! - [`tools`] — Tool registry
//! - [`mcp`] — MCP protocol implementation

pub mod config;
pub mod error;
pub mod kalshi;
pub mod mcp;
pub mod tools;
