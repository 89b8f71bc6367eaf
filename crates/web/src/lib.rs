//! Reelcheck Web API
//!
//! HTTP surface over the orchestration engine: run lifecycle endpoints
//! plus single-shot detection and text utilities for script-driven
//! clients.

pub mod config;
pub mod server;
