//! Integration test suite for the ensemble coordination engine.
//!
//! These tests drive the coordinator end to end against a scripted agent
//! runtime and verify that validation, planning, execution and bookkeeping
//! work together.
//!
//! # Test Categories
//!
//! - `workflow_e2e`: Full workflow execution, loading and state publishing
//! - `parallel_agents`: Per-agent concurrency limits and session tracking
//! - `recovery`: Partial failure, timeouts and dropped completions
//! - `conflict_resolution`: Dispatch rejections and response resolution
//! - `validation`: Rejected workflows
//!
//! # CI Compatibility
//!
//! No real agents are involved; timing-sensitive tests run on paused tokio
//! time.

mod fixtures;

mod workflow_e2e;
mod recovery;
mod validation;
