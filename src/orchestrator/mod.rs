//! Execution orchestration.
//!
//! Covers the subprocess executor, the per-chat execution lock, the agent
//! invocation orchestrator, and direct shell execution.

pub mod agent_runner;
pub mod chat_lock;
pub mod executor;
pub mod shell;
