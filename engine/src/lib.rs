//! CareerFlow Engine Library
//!
//! This library provides the core functionality of the CareerFlow engine.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Database persistence module
pub mod db;

/// Session memory: Context Store and Workspace Log
pub mod memory;

/// Language model client
pub mod llm;

/// Job board and language model tool wiring
pub mod tools;

/// Concrete agents and the capability registry
pub mod agent;

/// Task type to stage plan routing
pub mod router;

/// Stage execution over a session
pub mod orchestrator;

/// Input screening and output sanitization
pub mod guardrails;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
