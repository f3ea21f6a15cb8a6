//! Parley Core
//!
//! Session-scoped conversation analytics for practice conversations: the event store,
//! the scoring rules, the tool calls a conversational agent uses to report what it
//! observes, and the MCP service that exposes those tools.

pub mod analytics;
pub mod persona;
pub mod scoring;
pub mod service;
pub mod tools;
