//! easel - MCP server exposing a ComfyUI backend as generation tools
//!
//! This library provides:
//! - `asset_registry`: in-memory provenance registry with TTL expiry
//! - `workflow`: built-in workflow templates and parameter binding
//! - `comfy`: HTTP client for the ComfyUI REST surface
//! - `defaults`: layered generation defaults (runtime/config/env/baseline)
//! - `api`: MCP tool implementations and handler
//! - `serve`: MCP server over streamable HTTP
//! - `stdio`: MCP stdio transport for Claude Code

pub mod api;
pub mod asset_registry;
pub mod comfy;
pub mod defaults;
pub mod error;
pub mod serve;
pub mod stdio;
pub mod telemetry;
pub mod workflow;
